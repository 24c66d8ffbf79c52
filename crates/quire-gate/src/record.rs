use std::collections::{BTreeMap, HashMap};

use quire_types::ObjectId;

use crate::error::Violation;

/// Per-object check state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CheckState {
    #[default]
    NotChecked,
    Passed,
    Deferred,
}

/// Document-scoped memory of what the gate has already decided.
///
/// Objects that failed a batch check stay `Deferred` and keep their
/// violations here until the document closes, where they are reported.
#[derive(Clone, Debug, Default)]
pub struct FlushGateRecord {
    states: HashMap<ObjectId, CheckState>,
    violations: BTreeMap<ObjectId, Vec<Violation>>,
    document_violations: Vec<Violation>,
}

impl FlushGateRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, id: ObjectId) -> CheckState {
        self.states.get(&id).copied().unwrap_or_default()
    }

    pub fn set(&mut self, id: ObjectId, state: CheckState) {
        self.states.insert(id, state);
    }

    /// Record a failed check. The object is left deferred.
    pub fn reject(&mut self, id: ObjectId, violation: Violation) {
        self.states.insert(id, CheckState::Deferred);
        self.violations.entry(id).or_default().push(violation);
    }

    /// Clear earlier failures before re-checking an object.
    pub fn clear_violations(&mut self, id: ObjectId) {
        self.violations.remove(&id);
    }

    pub fn is_rejected(&self, id: ObjectId) -> bool {
        self.violations.contains_key(&id)
    }

    pub fn violations_for(&self, id: ObjectId) -> &[Violation] {
        self.violations.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_document_violations(&mut self, violations: Vec<Violation>) {
        self.document_violations = violations;
    }

    /// All recorded violations: document-level first, then per object in
    /// ascending id order.
    pub fn violations(&self) -> Vec<Violation> {
        self.document_violations
            .iter()
            .chain(self.violations.values().flatten())
            .cloned()
            .collect()
    }

    /// Forget everything about `id` (it was freed).
    pub fn forget(&mut self, id: ObjectId) {
        self.states.remove(&id);
        self.violations.remove(&id);
    }

    /// Number of objects with a recorded state.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
