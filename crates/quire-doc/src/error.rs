use std::fmt;

use quire_gate::{ConformanceLevel, GateError, Violation};
use quire_table::TableError;
use quire_types::{ObjectId, TypeError};
use quire_writer::WriterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("type error: {0}")]
    Type(#[from] TypeError),

    #[error("reference table error: {0}")]
    Table(#[from] TableError),

    #[error("gate error: {0}")]
    Gate(#[from] GateError),

    #[error("writer error: {0}")]
    Writer(#[from] WriterError),

    #[error("{} conformance violation(s){}", .violations.len(), first_violation(.violations))]
    ConformanceViolation { violations: Vec<Violation> },

    #[error("object {from} references {target}, which is not allocated")]
    DanglingReference { from: ObjectId, target: ObjectId },

    #[error("document is poisoned by an earlier I/O failure; discard the output")]
    Poisoned,

    #[error("conformance level cannot change once objects have been flushed")]
    ConformanceLevelLocked,

    #[error("object {0} has already been flushed")]
    ObjectFlushed(ObjectId),

    #[error("unknown object {0}")]
    UnknownObject(ObjectId),

    #[error("invalid ICC profile: {0}")]
    InvalidIccProfile(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("configuration error: {0}")]
    Config(String),
}

fn first_violation(violations: &[Violation]) -> String {
    violations
        .first()
        .map(|v| format!(", first: {v}"))
        .unwrap_or_default()
}

impl DocumentError {
    /// Returns `true` for failures of the underlying output.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Writer(WriterError::Io(_)))
    }
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// Non-fatal conditions collected while building a document and returned
/// with the close report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentWarning {
    /// No source of a font face yielded a usable program.
    FontUnavailable { family: String, sources: usize },
    /// A live object unreachable from the document roots was written as free.
    ObjectDropped(ObjectId),
    /// Object streams were requested but the level forbids them.
    ObjectStreamsDisabled(ConformanceLevel),
}

impl fmt::Display for DocumentWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FontUnavailable { family, sources } => {
                write!(f, "font '{family}' unavailable after trying {sources} source(s)")
            }
            Self::ObjectDropped(id) => write!(f, "unreachable object {id} written as free"),
            Self::ObjectStreamsDisabled(level) => {
                write!(f, "object streams are not allowed by {level}; writing plain objects")
            }
        }
    }
}
