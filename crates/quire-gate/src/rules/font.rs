use quire_types::{Dictionary, Value};

use crate::error::GateError;
use crate::rule::{CheckSubject, ConformanceRule, RuleDecision, ValidationContext};

const FONT_FILE_KEYS: &[&str] = &["FontFile", "FontFile2", "FontFile3"];

/// Every font used for rendering must be embedded.
///
/// Applies to font dictionaries, font descriptors, and font program
/// streams. Type 3 fonts carry their glyphs inline and are exempt; composite
/// (Type 0) fonts are judged through their descendant fonts, which are
/// objects of their own.
pub struct FontRule;

impl FontRule {
    fn check_descriptor(descriptor: &Dictionary) -> RuleDecision {
        if FONT_FILE_KEYS.iter().any(|k| descriptor.contains_key(k)) {
            RuleDecision::Pass
        } else {
            let font = descriptor
                .name_of("FontName")
                .map(|n| n.to_string())
                .unwrap_or_else(|| "(unnamed)".into());
            RuleDecision::fail(format!("font {font} is not embedded"))
        }
    }
}

impl ConformanceRule for FontRule {
    fn name(&self) -> &str {
        "font"
    }

    fn check(
        &self,
        subject: &CheckSubject<'_>,
        context: &ValidationContext<'_>,
    ) -> Result<RuleDecision, GateError> {
        if let Value::Stream(program) = subject.value {
            if program.data.is_empty() {
                return Ok(RuleDecision::fail("embedded font program is empty"));
            }
            return Ok(RuleDecision::Pass);
        }

        let dict = subject
            .value
            .as_dict()
            .map_err(|e| GateError::inspect(self.name(), subject.id, e))?;

        if dict.type_name().is_some_and(|t| *t == "FontDescriptor") {
            return Ok(Self::check_descriptor(dict));
        }

        match dict.subtype().map(|s| s.as_str()) {
            Some("Type3") | Some("Type0") => return Ok(RuleDecision::Pass),
            _ => {}
        }

        let base = dict
            .name_of("BaseFont")
            .map(|n| n.to_string())
            .unwrap_or_else(|| "(unnamed)".into());
        match dict.get("FontDescriptor") {
            None => Ok(RuleDecision::fail(format!(
                "font {base} has no /FontDescriptor and cannot be embedded"
            ))),
            Some(descriptor) => match context.deref(descriptor) {
                Some(Value::Dictionary(d)) => Ok(Self::check_descriptor(d)),
                Some(_) => Ok(RuleDecision::fail(format!(
                    "font {base} has a malformed /FontDescriptor"
                ))),
                // Already flushed, so it passed its own check.
                None => Ok(RuleDecision::Pass),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::ConformanceLevel;
    use quire_table::IndirectTable;
    use quire_types::{DocumentId, ObjectId, Stream};

    fn run_on(table: &IndirectTable, value: &Value) -> RuleDecision {
        let ctx = ValidationContext {
            level: ConformanceLevel::PdfA2B,
            output_intent: None,
            has_metadata: true,
            resolver: table,
        };
        FontRule
            .check(&CheckSubject::new(ObjectId::new(20, 0), value), &ctx)
            .unwrap()
    }

    fn truetype(descriptor: Value) -> Value {
        let mut font = Dictionary::with_type("Font");
        font.insert("Subtype", Value::name("TrueType"));
        font.insert("BaseFont", Value::name("DejaVuSans"));
        font.insert("FontDescriptor", descriptor);
        Value::Dictionary(font)
    }

    #[test]
    fn embedded_font_passes() {
        let mut table = IndirectTable::new(DocumentId::new());
        let program = table
            .allocate(Value::Stream(Stream::from_bytes(vec![0u8; 16])))
            .unwrap();
        let mut descriptor = Dictionary::with_type("FontDescriptor");
        descriptor.insert("FontFile2", program);
        let d = table.allocate(Value::Dictionary(descriptor)).unwrap();
        assert!(run_on(&table, &truetype(Value::Reference(d))).is_pass());
    }

    #[test]
    fn unembedded_font_fails() {
        let table = IndirectTable::new(DocumentId::new());
        let descriptor = Value::Dictionary(Dictionary::with_type("FontDescriptor"));
        assert!(run_on(&table, &truetype(descriptor)).is_fail());
    }

    #[test]
    fn standard_font_without_descriptor_fails() {
        let table = IndirectTable::new(DocumentId::new());
        let mut font = Dictionary::with_type("Font");
        font.insert("Subtype", Value::name("Type1"));
        font.insert("BaseFont", Value::name("Helvetica"));
        assert!(run_on(&table, &Value::Dictionary(font)).is_fail());
    }

    #[test]
    fn type3_is_exempt() {
        let table = IndirectTable::new(DocumentId::new());
        let mut font = Dictionary::with_type("Font");
        font.insert("Subtype", Value::name("Type3"));
        assert!(run_on(&table, &Value::Dictionary(font)).is_pass());
    }

    #[test]
    fn empty_program_fails() {
        let table = IndirectTable::new(DocumentId::new());
        let mut d = Dictionary::new();
        d.insert("Length1", 0);
        assert!(run_on(&table, &Value::Stream(Stream::new(d, Vec::new()))).is_fail());
    }
}
