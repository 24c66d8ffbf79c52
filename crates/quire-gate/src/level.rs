use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// Conformance profile a document is produced against.
///
/// Every level requires an output intent and a checked flush. The parts
/// differ in which file-format features they admit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConformanceLevel {
    #[serde(rename = "PDF/A-1B")]
    PdfA1B,
    #[serde(rename = "PDF/A-2B")]
    PdfA2B,
    #[serde(rename = "PDF/A-3B")]
    PdfA3B,
}

impl ConformanceLevel {
    /// The part number (1, 2 or 3).
    pub fn part(&self) -> u8 {
        match self {
            Self::PdfA1B => 1,
            Self::PdfA2B => 2,
            Self::PdfA3B => 3,
        }
    }

    /// File header version implied by the level.
    pub fn header_version(&self) -> &'static str {
        match self {
            Self::PdfA1B => "1.4",
            Self::PdfA2B | Self::PdfA3B => "1.7",
        }
    }

    /// Part 1 is based on a format version without object streams.
    pub fn allows_object_streams(&self) -> bool {
        self.part() >= 2
    }

    /// Part 1 forbids transparency groups and soft masks.
    pub fn allows_transparency(&self) -> bool {
        self.part() >= 2
    }

    /// Highest ICC profile major version an embedded profile may declare.
    pub fn max_icc_major_version(&self) -> u8 {
        match self {
            Self::PdfA1B => 2,
            Self::PdfA2B | Self::PdfA3B => 4,
        }
    }

    /// `/S` entry of the output intent dictionary.
    pub fn output_intent_subtype(&self) -> &'static str {
        "GTS_PDFA1"
    }
}

impl fmt::Display for ConformanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PDF/A-{}B", self.part())
    }
}

impl FromStr for ConformanceLevel {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PDF/A-1B" | "PDFA-1B" | "A1B" => Ok(Self::PdfA1B),
            "PDF/A-2B" | "PDFA-2B" | "A2B" => Ok(Self::PdfA2B),
            "PDF/A-3B" | "PDFA-3B" | "A3B" => Ok(Self::PdfA3B),
            other => Err(GateError::Config(format!("unknown conformance level '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_one_is_restricted() {
        let l = ConformanceLevel::PdfA1B;
        assert_eq!(l.header_version(), "1.4");
        assert!(!l.allows_object_streams());
        assert!(!l.allows_transparency());
        assert_eq!(l.max_icc_major_version(), 2);
    }

    #[test]
    fn later_parts_admit_more() {
        for l in [ConformanceLevel::PdfA2B, ConformanceLevel::PdfA3B] {
            assert_eq!(l.header_version(), "1.7");
            assert!(l.allows_object_streams());
            assert_eq!(l.max_icc_major_version(), 4);
        }
    }

    #[test]
    fn parse_and_display() {
        let l: ConformanceLevel = "pdf/a-2b".parse().unwrap();
        assert_eq!(l, ConformanceLevel::PdfA2B);
        assert_eq!(l.to_string(), "PDF/A-2B");
        assert!("PDF/X-4".parse::<ConformanceLevel>().is_err());
    }
}
