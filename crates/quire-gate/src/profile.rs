use std::collections::BTreeMap;
use std::sync::Arc;

use crate::kind::ObjectKind;
use crate::level::ConformanceLevel;
use crate::rule::ConformanceRule;
use crate::rules::{ColorSpaceRule, FontRule, ImageRule, PageRule};

/// Capability table mapping each object kind to the rules that regulate it.
///
/// A kind with no rules is unregulated: objects of that kind always pass.
/// Tables are cheap to clone (rules are shared behind `Arc`).
#[derive(Clone, Default)]
pub struct RuleTable {
    rules: BTreeMap<ObjectKind, Vec<Arc<dyn ConformanceRule>>>,
}

impl RuleTable {
    /// A table with no rules; every kind is unregulated.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in table for a level.
    ///
    /// Every level regulates pages, images, fonts and colour spaces; the
    /// rules themselves read the level from the validation context for
    /// part-specific limits.
    pub fn for_level(_level: ConformanceLevel) -> Self {
        Self::empty()
            .with_rule(ObjectKind::Page, PageRule)
            .with_rule(ObjectKind::Image, ImageRule)
            .with_rule(ObjectKind::Font, FontRule)
            .with_rule(ObjectKind::ColorSpace, ColorSpaceRule)
    }

    /// Append a rule for `kind`.
    pub fn with_rule(mut self, kind: ObjectKind, rule: impl ConformanceRule + 'static) -> Self {
        self.add_rule(kind, Arc::new(rule));
        self
    }

    /// Append a shared rule for `kind`.
    pub fn add_rule(&mut self, kind: ObjectKind, rule: Arc<dyn ConformanceRule>) {
        self.rules.entry(kind).or_default().push(rule);
    }

    /// Drop every rule for `kind`, making it unregulated.
    pub fn clear_kind(&mut self, kind: ObjectKind) {
        self.rules.remove(&kind);
    }

    /// Returns `true` if objects of `kind` need a check before flushing.
    pub fn is_regulated(&self, kind: ObjectKind) -> bool {
        self.rules.get(&kind).is_some_and(|r| !r.is_empty())
    }

    /// Rules for `kind`, in registration order.
    pub fn rules_for(&self, kind: ObjectKind) -> &[Arc<dyn ConformanceRule>] {
        self.rules.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Kinds that have at least one rule.
    pub fn regulated_kinds(&self) -> Vec<ObjectKind> {
        ObjectKind::ALL
            .into_iter()
            .filter(|k| self.is_regulated(*k))
            .collect()
    }
}

impl std::fmt::Debug for RuleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (kind, rules) in &self.rules {
            let names: Vec<&str> = rules.iter().map(|r| r.name()).collect();
            map.entry(kind, &names);
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_regulates_four_kinds() {
        let table = RuleTable::for_level(ConformanceLevel::PdfA1B);
        assert_eq!(
            table.regulated_kinds(),
            vec![
                ObjectKind::Page,
                ObjectKind::Image,
                ObjectKind::Font,
                ObjectKind::ColorSpace
            ]
        );
        assert!(!table.is_regulated(ObjectKind::Generic));
        assert_eq!(table.rules_for(ObjectKind::Image)[0].name(), "image");
    }

    #[test]
    fn kinds_can_be_deregulated() {
        let mut table = RuleTable::for_level(ConformanceLevel::PdfA2B);
        table.clear_kind(ObjectKind::Font);
        assert!(!table.is_regulated(ObjectKind::Font));
        assert!(table.rules_for(ObjectKind::Font).is_empty());
    }

    #[test]
    fn debug_lists_rule_names() {
        let table = RuleTable::empty().with_rule(ObjectKind::Page, PageRule);
        assert_eq!(format!("{table:?}"), r#"{Page: ["page"]}"#);
    }
}
