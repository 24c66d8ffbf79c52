use thiserror::Error;

/// Errors produced by object model operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// An accessor was called on a value of a different variant.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A dictionary lookup for a required key found nothing.
    #[error("missing key /{0}")]
    MissingKey(String),

    /// An array index was past the end.
    #[error("index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("invalid hex string: {0}")]
    InvalidHex(String),
}

impl TypeError {
    pub(crate) fn mismatch(expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch { expected, found }
    }
}
