use crate::error::GateError;
use crate::rule::{CheckSubject, ConformanceRule, RuleDecision, ValidationContext};
use crate::rules::colorspace::check_color_space;

const VALID_BITS_PER_COMPONENT: &[i64] = &[1, 2, 4, 8, 16];

/// Checks on image XObjects.
pub struct ImageRule;

impl ConformanceRule for ImageRule {
    fn name(&self) -> &str {
        "image"
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

        if dict.contains_key("Alternates") {
            return Ok(RuleDecision::fail("image must not declare /Alternates"));
        }
        if dict.contains_key("OPI") {
            return Ok(RuleDecision::fail("image must not carry an /OPI dictionary"));
        }
        if matches!(dict.get("Interpolate"), Some(v) if v.as_bool() == Ok(true)) {
            return Ok(RuleDecision::fail("/Interpolate must not be true"));
        }
        if !context.level.allows_transparency() && dict.contains_key("SMask") {
            return Ok(RuleDecision::fail(format!(
                "soft masks are not allowed in {}",
                context.level
            )));
        }

        let is_mask = matches!(dict.get("ImageMask"), Some(v) if v.as_bool() == Ok(true));
        let is_jpx = dict
            .name_of("Filter")
            .is_some_and(|f| *f == "JPXDecode");
        if is_mask || is_jpx {
            return Ok(RuleDecision::Pass);
        }

        match dict.get("BitsPerComponent").map(|b| b.as_i64()) {
            Some(Ok(bpc)) if VALID_BITS_PER_COMPONENT.contains(&bpc) => {}
            Some(Ok(bpc)) => {
                return Ok(RuleDecision::fail(format!("invalid /BitsPerComponent {bpc}")));
            }
            _ => return Ok(RuleDecision::fail("image has no integer /BitsPerComponent")),
        }

        match dict.get("ColorSpace") {
            Some(cs) => Ok(check_color_space(cs, context)),
            None => Ok(RuleDecision::fail("image has no /ColorSpace")),
        }
    }
}
