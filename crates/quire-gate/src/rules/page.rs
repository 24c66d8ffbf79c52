use crate::error::GateError;
use crate::rule::{CheckSubject, ConformanceRule, RuleDecision, ValidationContext};

/// Structural checks on page dictionaries.
///
/// A page must carry a four-number `/MediaBox`, must not declare additional
/// actions, and under part 1 must not open a transparency group.
pub struct PageRule;

impl ConformanceRule for PageRule {
    fn name(&self) -> &str {
        "page"
    }

    fn check(
        &self,
        subject: &CheckSubject<'_>,
        context: &ValidationContext<'_>,
    ) -> Result<RuleDecision, GateError> {
        let dict = subject
            .value
            .as_dict()
            .map_err(|e| GateError::inspect(self.name(), subject.id, e))?;

        match dict.get("MediaBox").and_then(|v| context.deref(v)) {
            Some(media_box) => {
                let ok = media_box
                    .as_array()
                    .map(|items| items.len() == 4 && items.iter().all(|n| n.as_f64().is_ok()))
                    .unwrap_or(false);
                if !ok {
                    return Ok(RuleDecision::fail("/MediaBox must be an array of four numbers"));
                }
            }
            None => return Ok(RuleDecision::fail("page has no /MediaBox")),
        }

        if dict.contains_key("AA") {
            return Ok(RuleDecision::fail("page must not declare additional actions (/AA)"));
        }

        if !context.level.allows_transparency() {
            let transparent = dict
                .get("Group")
                .and_then(|g| context.deref(g))
                .and_then(|g| g.as_dict().ok())
                .and_then(|g| g.name_of("S"))
                .is_some_and(|s| *s == "Transparency");
            if transparent {
                return Ok(RuleDecision::fail(format!(
                    "transparency groups are not allowed in {}",
                    context.level
                )));
            }
        }

        Ok(RuleDecision::Pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::ConformanceLevel;
    use quire_table::IndirectTable;
    use quire_types::{Dictionary, DocumentId, ObjectId, Value};

    fn page() -> Dictionary {
        let mut d = Dictionary::with_type("Page");
        d.insert(
            "MediaBox",
            vec![Value::Integer(0), Value::Integer(0), Value::Real(595.0), Value::Real(842.0)],
        );
        d
    }

    fn run(dict: Dictionary, level: ConformanceLevel) -> RuleDecision {
        let table = IndirectTable::new(DocumentId::new());
        let ctx = ValidationContext {
            level,
            output_intent: None,
            has_metadata: true,
            resolver: &table,
        };
        let value = Value::Dictionary(dict);
        PageRule
            .check(&CheckSubject::new(ObjectId::new(3, 0), &value), &ctx)
            .unwrap()
    }

    #[test]
    fn valid_page_passes() {
        assert!(run(page(), ConformanceLevel::PdfA1B).is_pass());
    }

    #[test]
    fn missing_media_box_fails() {
        let mut d = page();
        d.remove("MediaBox");
        assert!(run(d, ConformanceLevel::PdfA2B).is_fail());
    }

    #[test]
    fn malformed_media_box_fails() {
        let mut d = page();
        d.insert("MediaBox", vec![Value::Integer(0)]);
        assert!(run(d, ConformanceLevel::PdfA2B).is_fail());
    }

    #[test]
    fn additional_actions_fail() {
        let mut d = page();
        d.insert("AA", Dictionary::new());
        assert!(run(d, ConformanceLevel::PdfA3B).is_fail());
    }

    #[test]
    fn transparency_group_depends_on_level() {
        let mut group = Dictionary::with_type("Group");
        group.insert("S", Value::name("Transparency"));
        let mut d = page();
        d.insert("Group", group);
        assert!(run(d.clone(), ConformanceLevel::PdfA1B).is_fail());
        assert!(run(d, ConformanceLevel::PdfA2B).is_pass());
    }
}
