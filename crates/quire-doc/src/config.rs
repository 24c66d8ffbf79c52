use quire_gate::{ConformanceLevel, GateConfig};
use serde::{Deserialize, Serialize};

use crate::error::{DocumentError, DocumentResult};

/// What `close` does with objects that are still in memory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosePolicy {
    /// Run the final gate pass and write every live object.
    #[default]
    ForceFlush,
    /// Write what the catalog, the info dictionary, or already-written
    /// objects reach; free the rest and report it as dropped.
    WriteAsFree,
}

/// Default media box for new pages, in points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub const A4: Self = Self {
        width: 595.0,
        height: 842.0,
    };
    pub const LETTER: Self = Self {
        width: 612.0,
        height: 792.0,
    };
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

/// Document configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Conformance level attached at creation, if any.
    pub conformance: Option<ConformanceLevel>,
    pub gate: GateConfig,
    pub close_policy: ClosePolicy,
    /// Pack small objects into object streams where the level allows it.
    pub object_streams: bool,
    /// Members per object stream.
    pub object_stream_capacity: usize,
    /// Flate-compress streams that have no filter.
    pub compress_streams: bool,
    /// zlib level, 0-9.
    pub compression_level: u32,
    /// Hand out freed object numbers again (with a bumped generation).
    pub reuse_free_numbers: bool,
    /// `/Producer` of the info dictionary.
    pub producer: String,
    pub page_size: PageSize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            conformance: None,
            gate: GateConfig::default(),
            close_policy: ClosePolicy::default(),
            object_streams: false,
            object_stream_capacity: 100,
            compress_streams: false,
            compression_level: 6,
            reuse_free_numbers: true,
            producer: format!("quire {}", env!("CARGO_PKG_VERSION")),
            page_size: PageSize::default(),
        }
    }
}

impl DocumentConfig {
    /// Default configuration with a conformance level attached.
    pub fn with_conformance(level: ConformanceLevel) -> Self {
        Self {
            conformance: Some(level),
            ..Default::default()
        }
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> DocumentResult<Self> {
        let config: Self = toml::from_str(input).map_err(|e| DocumentError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DocumentResult<()> {
        if self.object_stream_capacity == 0 {
            return Err(DocumentError::Config(
                "object_stream_capacity must be at least 1".into(),
            ));
        }
        if self.compression_level > 9 {
            return Err(DocumentError::Config(format!(
                "compression_level {} is above 9",
                self.compression_level
            )));
        }
        if !(self.page_size.width > 0.0 && self.page_size.height > 0.0) {
            return Err(DocumentError::Config("page size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = DocumentConfig::default();
        assert_eq!(c.conformance, None);
        assert_eq!(c.close_policy, ClosePolicy::ForceFlush);
        assert!(c.reuse_free_numbers);
        assert!(c.producer.starts_with("quire "));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn parses_toml() {
        let c = DocumentConfig::from_toml_str(
            r#"
            conformance = "PDF/A-2B"
            close_policy = "write_as_free"
            object_streams = true
            object_stream_capacity = 20

            [gate]
            fail_fast = true

            [page_size]
            width = 612.0
            height = 792.0
            "#,
        )
        .unwrap();
        assert_eq!(c.conformance, Some(ConformanceLevel::PdfA2B));
        assert_eq!(c.close_policy, ClosePolicy::WriteAsFree);
        assert!(c.object_streams);
        assert_eq!(c.object_stream_capacity, 20);
        assert!(c.gate.fail_fast);
        assert!(c.gate.defer_unchecked);
        assert_eq!(c.page_size, PageSize::LETTER);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            DocumentConfig::from_toml_str("object_stream_capacity = 0"),
            Err(DocumentError::Config(_))
        ));
        assert!(DocumentConfig::from_toml_str("compression_level = 12").is_err());
        assert!(DocumentConfig::from_toml_str("conformance = \"PDF/X-4\"").is_err());
    }
}
