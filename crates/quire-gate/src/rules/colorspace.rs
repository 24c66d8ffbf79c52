use quire_types::{Stream, Value};

use crate::error::GateError;
use crate::rule::{CheckSubject, ConformanceRule, RuleDecision, ValidationContext};

/// ICC profile header: the major version byte sits at offset 8.
const ICC_VERSION_OFFSET: usize = 8;
const ICC_HEADER_LEN: usize = 128;

/// Checks on colour space arrays and embedded ICC profiles.
///
/// Device-dependent spaces need an output intent with a matching number of
/// components. ICC profiles must declare 1, 3 or 4 components and must not be
/// newer than the level admits.
pub struct ColorSpaceRule;

impl ConformanceRule for ColorSpaceRule {
    fn name(&self) -> &str {
        "colorspace"
    }

    fn check(
        &self,
        subject: &CheckSubject<'_>,
        context: &ValidationContext<'_>,
    ) -> Result<RuleDecision, GateError> {
        match subject.value {
            Value::Stream(stream) => Ok(check_icc_profile(stream, context)),
            other => Ok(check_color_space(other, context)),
        }
    }
}

/// Component count of a device colour space name.
pub fn device_components(name: &str) -> Option<u8> {
    match name {
        "DeviceGray" => Some(1),
        "DeviceRGB" => Some(3),
        "DeviceCMYK" => Some(4),
        _ => None,
    }
}

/// Validate any colour space value: a name, an array family, or a
/// reference to either. Flushed targets are taken as already checked.
pub fn check_color_space(value: &Value, context: &ValidationContext<'_>) -> RuleDecision {
    match value {
        Value::Reference(_) => match context.deref(value) {
            Some(target) => check_color_space(target, context),
            None => RuleDecision::Pass,
        },
        Value::Name(name) => match device_components(name.as_str()) {
            Some(components) => check_device_space(name.as_str(), components, context),
            None => RuleDecision::Pass,
        },
        Value::Array(items) => {
            let family = items.first().and_then(|f| f.as_name().ok());
            match family.map(|f| f.as_str()) {
                Some("ICCBased") => match items.get(1).and_then(|p| context.deref(p)) {
                    Some(Value::Stream(profile)) => check_icc_profile(profile, context),
                    Some(_) => RuleDecision::fail("/ICCBased colour space must reference a stream"),
                    None => RuleDecision::Pass,
                },
                Some("Indexed") => match items.get(1) {
                    Some(base) => check_color_space(base, context),
                    None => RuleDecision::fail("/Indexed colour space has no base"),
                },
                Some("Separation") | Some("DeviceN") => match items.get(2) {
                    Some(alternate) => check_color_space(alternate, context),
                    None => RuleDecision::fail("special colour space has no alternate space"),
                },
                _ => RuleDecision::Pass,
            }
        }
        _ => RuleDecision::Pass,
    }
}

fn check_device_space(name: &str, components: u8, context: &ValidationContext<'_>) -> RuleDecision {
    let Some(intent) = context.output_intent else {
        return RuleDecision::fail(format!(
            "device-dependent colour space /{name} used without an output intent"
        ));
    };
    // Gray maps onto any destination profile.
    if components != 1 && intent.components != components {
        return RuleDecision::fail(format!(
            "/{name} has {components} components but the output intent profile has {}",
            intent.components
        ));
    }
    RuleDecision::Pass
}

/// Validate an embedded ICC profile stream.
pub fn check_icc_profile(profile: &Stream, context: &ValidationContext<'_>) -> RuleDecision {
    let components = profile.dict.get("N").and_then(|n| n.as_i64().ok());
    if !matches!(components, Some(1) | Some(3) | Some(4)) {
        return RuleDecision::fail("ICC profile must declare /N of 1, 3 or 4");
    }

    // Encoded profiles cannot be inspected without decoding; the header
    // check only applies to raw data.
    if profile.is_encoded() {
        return RuleDecision::Pass;
    }
    if profile.data.len() < ICC_HEADER_LEN {
        return RuleDecision::fail(format!(
            "ICC profile is {} bytes, shorter than its header",
            profile.data.len()
        ));
    }
    let major = profile.data[ICC_VERSION_OFFSET];
    let max = context.level.max_icc_major_version();
    if major > max {
        return RuleDecision::fail(format!(
            "ICC profile version {major} exceeds {max} allowed by {}",
            context.level
        ));
    }
    RuleDecision::Pass
}
