use std::fmt;

use quire_types::{ObjectId, TypeError};

/// A single rule failure, kept until the document closes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// The offending object; `None` for document-level rules.
    pub id: Option<ObjectId>,
    /// Name of the rule that failed.
    pub rule: String,
    pub reason: String,
}

impl Violation {
    pub fn object(id: ObjectId, rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    pub fn document(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: None,
            rule: rule.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "object {id}: [{}] {}", self.rule, self.reason),
            None => write!(f, "document: [{}] {}", self.rule, self.reason),
        }
    }
}

/// Errors that can occur during gate evaluation.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// A rule could not evaluate an object because of its shape.
    #[error("rule '{rule}' could not inspect object {id}: {source}")]
    Inspect {
        rule: String,
        id: ObjectId,
        #[source]
        source: TypeError,
    },

    /// Configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GateError {
    /// Create an inspection error for a rule and object.
    pub fn inspect(rule: impl Into<String>, id: ObjectId, source: TypeError) -> Self {
        Self::Inspect {
            rule: rule.into(),
            id,
            source,
        }
    }
}

impl PartialEq for GateError {
    fn eq(&self, other: &Self) -> bool {
        // Compare by display representation for test convenience.
        self.to_string() == other.to_string()
    }
}

impl Eq for GateError {}
