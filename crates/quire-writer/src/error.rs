use quire_types::ObjectId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object {0} is still in memory; it must be flushed before the cross-reference is built")]
    UnflushedObject(ObjectId),

    #[error("stream nested inside object {0}; streams must be indirect")]
    NestedStream(ObjectId),

    #[error("compression failed: {0}")]
    CompressionFailed(String),

    #[error("object {0} cannot be stored in an object stream")]
    NotCompressible(ObjectId),

    #[error("object stream is full ({capacity} entries)")]
    ObjectStreamFull { capacity: usize },

    #[error("parse error at offset {offset}: {reason}")]
    Parse { offset: usize, reason: String },

    #[error("cross-reference corrupted: {0}")]
    XrefCorrupted(String),
}

impl WriterError {
    pub(crate) fn parse(offset: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            offset,
            reason: reason.into(),
        }
    }
}

pub type WriterResult<T> = Result<T, WriterError>;
