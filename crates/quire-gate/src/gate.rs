use std::time::{Duration, Instant};

use quire_types::ObjectId;
use tracing::debug;

use crate::config::GateConfig;
use crate::error::{GateError, Violation};
use crate::kind::ObjectKind;
use crate::level::ConformanceLevel;
use crate::profile::RuleTable;
use crate::record::{CheckState, FlushGateRecord};
use crate::rule::{CheckSubject, DocumentFacts, RuleDecision, ValidationContext};

// ---------------------------------------------------------------------------
// GateVerdict / BatchReport
// ---------------------------------------------------------------------------

/// Answer to "may this object be flushed now?".
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateVerdict {
    Passed,
    Deferred { reason: String },
}

impl GateVerdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Outcome of a batch check over a subgraph or the whole document.
#[derive(Clone, Debug, Default)]
pub struct BatchReport {
    /// Number of subjects examined.
    pub checked: usize,
    /// Regulated objects that moved to `Passed` in this batch.
    pub passed: Vec<ObjectId>,
    /// Violations found in this batch.
    pub violations: Vec<Violation>,
    /// Wall-clock time for the batch.
    pub elapsed: Duration,
}

impl BatchReport {
    /// Returns `true` if the batch found no violations.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ConformanceGate
// ---------------------------------------------------------------------------

/// The conformance gate consulted before every flush.
///
/// Without a level the gate is a pass-through. With a level, regulated
/// objects start out `Deferred` on their first single check and only move to
/// `Passed` when a batch check (a cascading flush or a document-wide
/// validation pass) has evaluated them with full context. Failures are
/// recorded and surfaced when the document closes.
#[derive(Debug)]
pub struct ConformanceGate {
    level: Option<ConformanceLevel>,
    rules: RuleTable,
    config: GateConfig,
    record: FlushGateRecord,
}

impl ConformanceGate {
    /// A gate that lets everything through.
    pub fn pass_through() -> Self {
        Self {
            level: None,
            rules: RuleTable::empty(),
            config: GateConfig::default(),
            record: FlushGateRecord::new(),
        }
    }

    /// A gate for `level` using the built-in rule table, or a pass-through
    /// gate when `level` is `None`.
    pub fn new(level: Option<ConformanceLevel>, config: GateConfig) -> Self {
        match level {
            Some(level) => Self::with_rules(level, RuleTable::for_level(level), config),
            None => Self {
                config,
                ..Self::pass_through()
            },
        }
    }

    /// A gate for `level` with a caller-supplied rule table.
    pub fn with_rules(level: ConformanceLevel, rules: RuleTable, config: GateConfig) -> Self {
        Self {
            level: Some(level),
            rules,
            config,
            record: FlushGateRecord::new(),
        }
    }

    pub fn level(&self) -> Option<ConformanceLevel> {
        self.level
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn record(&self) -> &FlushGateRecord {
        &self.record
    }

    /// Returns `true` when no profile is attached.
    pub fn is_pass_through(&self) -> bool {
        self.level.is_none()
    }

    /// Returns `true` if objects of `kind` must be checked before flushing.
    pub fn is_regulated(&self, kind: ObjectKind) -> bool {
        self.level.is_some() && self.rules.is_regulated(kind)
    }

    /// Single-object check, run before a non-cascading flush.
    pub fn check(
        &mut self,
        subject: &CheckSubject<'_>,
        facts: &DocumentFacts<'_>,
    ) -> Result<GateVerdict, GateError> {
        let Some(level) = self.level else {
            return Ok(GateVerdict::Passed);
        };
        if !self.rules.is_regulated(subject.kind) {
            self.record.set(subject.id, CheckState::Passed);
            return Ok(GateVerdict::Passed);
        }

        match self.record.state(subject.id) {
            CheckState::Passed => Ok(GateVerdict::Passed),
            _ if self.record.is_rejected(subject.id) => {
                let reason = self
                    .record
                    .violations_for(subject.id)
                    .first()
                    .map_or_else(|| "rejected".to_string(), |v| format!("rejected: {v}"));
                Ok(GateVerdict::Deferred { reason })
            }
            _ if self.config.defer_unchecked => {
                self.record.set(subject.id, CheckState::Deferred);
                debug!(id = %subject.id, kind = %subject.kind, "flush deferred until checked");
                Ok(GateVerdict::Deferred {
                    reason: format!("{} {} has not been checked yet", subject.kind, subject.id),
                })
            }
            _ => {
                let context = ValidationContext::new(level, facts);
                let violations = self.evaluate(subject, &context)?;
                Ok(self.settle(subject.id, violations))
            }
        }
    }

    /// Evaluate every subject with full context. Regulated objects that
    /// satisfy their rules move to `Passed`; failures are recorded.
    pub fn check_batch(
        &mut self,
        subjects: &[CheckSubject<'_>],
        facts: &DocumentFacts<'_>,
    ) -> Result<BatchReport, GateError> {
        let start = Instant::now();
        let mut report = BatchReport {
            checked: subjects.len(),
            ..Default::default()
        };

        let Some(level) = self.level else {
            report.elapsed = start.elapsed();
            return Ok(report);
        };
        let context = ValidationContext::new(level, facts);

        for subject in subjects {
            if !self.rules.is_regulated(subject.kind) {
                self.record.set(subject.id, CheckState::Passed);
                continue;
            }
            if self.record.state(subject.id) == CheckState::Passed {
                continue;
            }
            self.record.clear_violations(subject.id);
            let violations = self.evaluate(subject, &context)?;
            if violations.is_empty() {
                report.passed.push(subject.id);
            } else {
                report.violations.extend(violations.iter().cloned());
            }
            self.settle(subject.id, violations);
        }

        report.elapsed = start.elapsed();
        debug!(
            checked = report.checked,
            passed = report.passed.len(),
            violations = report.violations.len(),
            "batch check complete"
        );
        Ok(report)
    }

    /// Document-level requirements of the level. The result replaces any
    /// earlier document-level findings.
    pub fn check_document(&mut self, facts: &DocumentFacts<'_>) -> Vec<Violation> {
        let Some(level) = self.level else {
            return Vec::new();
        };
        let mut violations = Vec::new();
        if facts.output_intent.is_none() {
            violations.push(Violation::document(
                "output-intent",
                format!("{level} requires an output intent"),
            ));
        }
        if !facts.has_metadata {
            violations.push(Violation::document(
                "metadata",
                format!("{level} requires XMP metadata"),
            ));
        }
        self.record.set_document_violations(violations.clone());
        violations
    }

    /// Every violation recorded so far.
    pub fn violations(&self) -> Vec<Violation> {
        self.record.violations()
    }

    /// Drop the record of a freed object.
    pub fn forget(&mut self, id: ObjectId) {
        self.record.forget(id);
    }

    fn evaluate(
        &self,
        subject: &CheckSubject<'_>,
        context: &ValidationContext<'_>,
    ) -> Result<Vec<Violation>, GateError> {
        let mut violations = Vec::new();
        for rule in self.rules.rules_for(subject.kind) {
            if let RuleDecision::Fail { reason } = rule.check(subject, context)? {
                violations.push(Violation::object(subject.id, rule.name(), reason));
            }
        }
        Ok(violations)
    }

    fn settle(&mut self, id: ObjectId, violations: Vec<Violation>) -> GateVerdict {
        if violations.is_empty() {
            self.record.set(id, CheckState::Passed);
            return GateVerdict::Passed;
        }
        let reason = format!("rejected: {}", violations[0]);
        for violation in violations {
            debug!(%violation, "conformance violation recorded");
            self.record.reject(id, violation);
        }
        GateVerdict::Deferred { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::OutputIntentInfo;
    use quire_table::IndirectTable;
    use quire_types::{Dictionary, DocumentId, Stream, Value};

    fn image(colour_space: &str) -> Value {
        let mut d = Dictionary::with_type("XObject");
        d.insert("Subtype", Value::name("Image"));
        d.insert("BitsPerComponent", 8);
        d.insert("ColorSpace", Value::name(colour_space));
        Value::Stream(Stream::new(d, vec![0; 3]))
    }

    fn facts(table: &IndirectTable, intent: bool) -> DocumentFacts<'_> {
        DocumentFacts {
            output_intent: intent.then_some(OutputIntentInfo { components: 3 }),
            has_metadata: true,
            resolver: table,
        }
    }

    fn pdfa() -> ConformanceGate {
        ConformanceGate::new(Some(ConformanceLevel::PdfA1B), GateConfig::default())
    }

    #[test]
    fn pass_through_never_defers() {
        let table = IndirectTable::new(DocumentId::new());
        let mut gate = ConformanceGate::pass_through();
        let img = image("DeviceRGB");
        let verdict = gate
            .check(&CheckSubject::new(ObjectId::new(1, 0), &img), &facts(&table, false))
            .unwrap();
        assert_eq!(verdict, GateVerdict::Passed);
        assert!(gate.check_document(&facts(&table, false)).is_empty());
    }

    #[test]
    fn unregulated_objects_pass_immediately() {
        let table = IndirectTable::new(DocumentId::new());
        let mut gate = pdfa();
        let n = Value::Integer(42);
        let id = ObjectId::new(1, 0);
        let verdict = gate.check(&CheckSubject::new(id, &n), &facts(&table, true)).unwrap();
        assert!(verdict.is_passed());
        assert_eq!(gate.record().state(id), CheckState::Passed);
    }

    #[test]
    fn regulated_object_is_deferred_then_passes_after_batch() {
        let table = IndirectTable::new(DocumentId::new());
        let mut gate = pdfa();
        let img = image("DeviceRGB");
        let id = ObjectId::new(5, 0);
        let subject = CheckSubject::new(id, &img);

        let first = gate.check(&subject, &facts(&table, true)).unwrap();
        assert!(matches!(first, GateVerdict::Deferred { .. }));
        assert_eq!(gate.record().state(id), CheckState::Deferred);

        // Still deferred on a second single attempt.
        assert!(!gate.check(&subject, &facts(&table, true)).unwrap().is_passed());

        let report = gate.check_batch(&[subject], &facts(&table, true)).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.passed, vec![id]);

        assert!(gate.check(&subject, &facts(&table, true)).unwrap().is_passed());
    }

    #[test]
    fn batch_violation_stays_deferred_and_is_recorded() {
        let table = IndirectTable::new(DocumentId::new());
        let mut gate = pdfa();
        let img = image("DeviceRGB");
        let id = ObjectId::new(6, 0);
        let subject = CheckSubject::new(id, &img);

        let report = gate.check_batch(&[subject], &facts(&table, false)).unwrap();
        assert!(!report.is_clean());
        assert_eq!(report.violations[0].rule, "image");

        let verdict = gate.check(&subject, &facts(&table, false)).unwrap();
        match verdict {
            GateVerdict::Deferred { reason } => assert!(reason.starts_with("rejected")),
            other => panic!("expected deferral, got {other:?}"),
        }
        assert_eq!(gate.violations().len(), 1);
    }

    #[test]
    fn recheck_after_fix_clears_violation() {
        let mut table = IndirectTable::new(DocumentId::new());
        let mut gate = pdfa();
        let id = table.allocate(image("DeviceCMYK")).unwrap();

        let subject = CheckSubject::new(id, table.resolve(id).unwrap());
        let report = gate.check_batch(&[subject], &facts(&table, true)).unwrap();
        assert!(!report.is_clean());

        table
            .resolve_mut(id)
            .unwrap()
            .insert("ColorSpace", Value::name("DeviceRGB"))
            .unwrap();
        let subject = CheckSubject::new(id, table.resolve(id).unwrap());
        let report = gate.check_batch(&[subject], &facts(&table, true)).unwrap();
        assert!(report.is_clean());
        assert!(gate.violations().is_empty());
    }

    #[test]
    fn eager_config_checks_on_first_attempt() {
        let table = IndirectTable::new(DocumentId::new());
        let mut gate = ConformanceGate::new(Some(ConformanceLevel::PdfA2B), GateConfig::eager());
        let img = image("DeviceRGB");
        let verdict = gate
            .check(&CheckSubject::new(ObjectId::new(2, 0), &img), &facts(&table, true))
            .unwrap();
        assert!(verdict.is_passed());
    }

    #[test]
    fn document_check_requires_intent_and_metadata() {
        let table = IndirectTable::new(DocumentId::new());
        let mut gate = pdfa();
        let mut f = facts(&table, false);
        f.has_metadata = false;
        let violations = gate.check_document(&f);
        let rules: Vec<&str> = violations.iter().map(|v| v.rule.as_str()).collect();
        assert_eq!(rules, vec!["output-intent", "metadata"]);
        assert!(gate.check_document(&facts(&table, true)).is_empty());
        assert!(gate.violations().is_empty());
    }

    #[test]
    fn custom_rule_table_is_respected() {
        let table = IndirectTable::new(DocumentId::new());
        let mut gate = ConformanceGate::with_rules(
            ConformanceLevel::PdfA2B,
            RuleTable::empty(),
            GateConfig::default(),
        );
        let img = image("DeviceRGB");
        let verdict = gate
            .check(&CheckSubject::new(ObjectId::new(3, 0), &img), &facts(&table, false))
            .unwrap();
        assert!(verdict.is_passed());
        assert!(!gate.is_regulated(ObjectKind::Image));
    }
}
