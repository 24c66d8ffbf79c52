use quire_gate::ConformanceLevel;
use quire_types::{Dictionary, ObjectId, PdfString, Stream, Value};

use crate::error::{DocumentError, DocumentResult};

const ICC_HEADER_LEN: usize = 128;
const ICC_COLOR_SPACE: std::ops::Range<usize> = 16..20;

/// An output intent: the destination ICC profile plus its identification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputIntent {
    pub output_condition_identifier: String,
    pub output_condition: Option<String>,
    pub registry_name: Option<String>,
    pub info: Option<String>,
    pub icc_profile: Vec<u8>,
}

impl OutputIntent {
    pub fn new(output_condition_identifier: impl Into<String>, icc_profile: Vec<u8>) -> Self {
        Self {
            output_condition_identifier: output_condition_identifier.into(),
            output_condition: None,
            registry_name: Some("http://www.color.org".into()),
            info: None,
            icc_profile,
        }
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    /// Number of colour components of the profile, read from its header.
    pub fn components(&self) -> DocumentResult<u8> {
        icc_components(&self.icc_profile)
    }

    /// The `/DestOutputProfile` stream.
    pub(crate) fn profile_stream(&self, components: u8) -> Stream {
        let mut dict = Dictionary::new();
        dict.insert("N", i64::from(components));
        Stream::new(dict, self.icc_profile.clone())
    }

    /// The `/OutputIntent` dictionary pointing at `profile`.
    pub(crate) fn to_dictionary(&self, level: Option<ConformanceLevel>, profile: ObjectId) -> Dictionary {
        let subtype = level.map_or("GTS_PDFA1", |l| l.output_intent_subtype());
        let mut dict = Dictionary::with_type("OutputIntent");
        dict.insert("S", Value::name(subtype));
        dict.insert(
            "OutputConditionIdentifier",
            PdfString::literal(self.output_condition_identifier.as_bytes()),
        );
        if let Some(condition) = &self.output_condition {
            dict.insert("OutputCondition", PdfString::literal(condition.as_bytes()));
        }
        if let Some(registry) = &self.registry_name {
            dict.insert("RegistryName", PdfString::literal(registry.as_bytes()));
        }
        if let Some(info) = &self.info {
            dict.insert("Info", PdfString::literal(info.as_bytes()));
        }
        dict.insert("DestOutputProfile", profile);
        dict
    }
}

/// Component count from the colour-space signature of an ICC header.
pub fn icc_components(profile: &[u8]) -> DocumentResult<u8> {
    if profile.len() < ICC_HEADER_LEN {
        return Err(DocumentError::InvalidIccProfile(format!(
            "{} bytes is shorter than the 128-byte header",
            profile.len()
        )));
    }
    match &profile[ICC_COLOR_SPACE] {
        b"GRAY" => Ok(1),
        b"RGB " => Ok(3),
        b"CMYK" => Ok(4),
        other => Err(DocumentError::InvalidIccProfile(format!(
            "unsupported colour space signature '{}'",
            String::from_utf8_lossy(other)
        ))),
    }
}

#[cfg(test)]
pub(crate) fn test_profile(signature: &[u8; 4], major_version: u8) -> Vec<u8> {
    let mut data = vec![0u8; ICC_HEADER_LEN + 16];
    data[8] = major_version;
    data[ICC_COLOR_SPACE].copy_from_slice(signature);
    data
}
