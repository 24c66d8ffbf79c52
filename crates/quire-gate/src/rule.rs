use quire_table::IndirectTable;
use quire_types::{ObjectId, Value};

use crate::error::GateError;
use crate::kind::ObjectKind;
use crate::level::ConformanceLevel;

// ---------------------------------------------------------------------------
// ObjectResolver
// ---------------------------------------------------------------------------

/// Read access to live payloads, so rules can follow references.
///
/// Objects that were already flushed resolve to `None`; rules treat them as
/// having passed their own check when they were written.
pub trait ObjectResolver {
    fn resolve(&self, id: ObjectId) -> Option<&Value>;
}

impl ObjectResolver for IndirectTable {
    fn resolve(&self, id: ObjectId) -> Option<&Value> {
        IndirectTable::resolve(self, id)
    }
}

// ---------------------------------------------------------------------------
// CheckSubject / ValidationContext
// ---------------------------------------------------------------------------

/// The object under evaluation.
#[derive(Clone, Copy, Debug)]
pub struct CheckSubject<'a> {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub value: &'a Value,
}

impl<'a> CheckSubject<'a> {
    /// Build a subject, classifying the value.
    pub fn new(id: ObjectId, value: &'a Value) -> Self {
        Self {
            id,
            kind: ObjectKind::classify(value),
            value,
        }
    }
}

/// Output intent facts rules need.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputIntentInfo {
    /// Number of colour components of the destination profile.
    pub components: u8,
}

/// What the document knows about itself at check time.
///
/// Built by the document for each check and passed down explicitly; the gate
/// keeps no ambient state of its own beyond its record.
#[derive(Clone, Copy)]
pub struct DocumentFacts<'a> {
    pub output_intent: Option<OutputIntentInfo>,
    pub has_metadata: bool,
    pub resolver: &'a dyn ObjectResolver,
}

/// Context handed to every rule: the document facts plus the active level.
pub struct ValidationContext<'a> {
    pub level: ConformanceLevel,
    pub output_intent: Option<OutputIntentInfo>,
    pub has_metadata: bool,
    pub resolver: &'a dyn ObjectResolver,
}

impl<'a> ValidationContext<'a> {
    pub fn new(level: ConformanceLevel, facts: &DocumentFacts<'a>) -> Self {
        Self {
            level,
            output_intent: facts.output_intent,
            has_metadata: facts.has_metadata,
            resolver: facts.resolver,
        }
    }

    /// Follow one reference hop. Direct values are returned as-is.
    pub fn deref<'v>(&'v self, value: &'v Value) -> Option<&'v Value> {
        match value {
            Value::Reference(id) => self.resolver.resolve(*id),
            other => Some(other),
        }
    }
}

// ---------------------------------------------------------------------------
// RuleDecision
// ---------------------------------------------------------------------------

/// The outcome of a single rule evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleDecision {
    Pass,
    Fail { reason: String },
}

impl RuleDecision {
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::Fail {
            reason: reason.into(),
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail { .. })
    }
}

// ---------------------------------------------------------------------------
// ConformanceRule trait
// ---------------------------------------------------------------------------

/// A single structural rule of a conformance profile.
///
/// Rules are registered per [`ObjectKind`] in a [`crate::RuleTable`] and are
/// only invoked for subjects of that kind. The trait is object-safe and
/// `Send + Sync` so documents built on different threads can share tables.
pub trait ConformanceRule: Send + Sync {
    /// Short identifier reported in violations (e.g. "image").
    fn name(&self) -> &str;

    /// Evaluate the subject.
    fn check(
        &self,
        subject: &CheckSubject<'_>,
        context: &ValidationContext<'_>,
    ) -> Result<RuleDecision, GateError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_types::DocumentId;

    #[test]
    fn deref_follows_one_hop() {
        let mut table = IndirectTable::new(DocumentId::new());
        let target = table.allocate(Value::Integer(7)).unwrap();
        let ctx = ValidationContext {
            level: ConformanceLevel::PdfA1B,
            output_intent: None,
            has_metadata: false,
            resolver: &table,
        };

        let reference = Value::Reference(target);
        assert_eq!(ctx.deref(&reference), Some(&Value::Integer(7)));
        let direct = Value::Bool(true);
        assert_eq!(ctx.deref(&direct), Some(&Value::Bool(true)));
        let dangling = Value::Reference(ObjectId::new(99, 0));
        assert!(ctx.deref(&dangling).is_none());
    }

    #[test]
    fn subject_classifies_its_value() {
        let v = Value::Integer(1);
        let s = CheckSubject::new(ObjectId::new(1, 0), &v);
        assert_eq!(s.kind, ObjectKind::Generic);
    }
}
