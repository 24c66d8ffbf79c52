use std::fmt;

use quire_types::Value;
use serde::{Deserialize, Serialize};

/// Validation category of an object.
///
/// Classification is a closed match over the value's shape; the rules that
/// apply to each category live in a [`crate::RuleTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    Page,
    Image,
    Font,
    ColorSpace,
    Generic,
}

/// Colour space families written as `[/Family ...]` arrays.
const COLOR_SPACE_FAMILIES: &[&str] = &[
    "ICCBased",
    "CalRGB",
    "CalGray",
    "Lab",
    "Indexed",
    "Separation",
    "DeviceN",
    "Pattern",
];

/// Font file subtypes used on embedded `/FontFile3` streams.
const FONT_FILE_SUBTYPES: &[&str] = &["Type1C", "CIDFontType0C", "OpenType"];

impl ObjectKind {
    pub const ALL: [ObjectKind; 5] = [
        Self::Page,
        Self::Image,
        Self::Font,
        Self::ColorSpace,
        Self::Generic,
    ];

    /// Classify a payload.
    pub fn classify(value: &Value) -> Self {
        match value {
            Value::Dictionary(dict) => match dict.type_name().map(|n| n.as_str()) {
                Some("Page") => Self::Page,
                Some("Font") | Some("FontDescriptor") => Self::Font,
                _ => Self::Generic,
            },
            Value::Stream(stream) => {
                let dict = &stream.dict;
                let subtype = dict.subtype().map(|n| n.as_str());
                if subtype == Some("Image") {
                    Self::Image
                } else if subtype.is_some_and(|s| FONT_FILE_SUBTYPES.contains(&s))
                    || dict.contains_key("Length1")
                {
                    Self::Font
                } else if dict.contains_key("N") && dict.type_name().is_none() && subtype.is_none() {
                    // ICC profile streams carry /N and nothing that names them.
                    Self::ColorSpace
                } else {
                    Self::Generic
                }
            }
            Value::Array(items) => match items.first() {
                Some(Value::Name(family)) if COLOR_SPACE_FAMILIES.contains(&family.as_str()) => {
                    Self::ColorSpace
                }
                _ => Self::Generic,
            },
            _ => Self::Generic,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page => write!(f, "page"),
            Self::Image => write!(f, "image"),
            Self::Font => write!(f, "font"),
            Self::ColorSpace => write!(f, "color space"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_types::{Dictionary, Stream};

    fn image() -> Value {
        let mut d = Dictionary::with_type("XObject");
        d.insert("Subtype", Value::name("Image"));
        Value::Stream(Stream::new(d, vec![0; 4]))
    }

    #[test]
    fn classify_page_and_font() {
        assert_eq!(
            ObjectKind::classify(&Value::Dictionary(Dictionary::with_type("Page"))),
            ObjectKind::Page
        );
        assert_eq!(
            ObjectKind::classify(&Value::Dictionary(Dictionary::with_type("Font"))),
            ObjectKind::Font
        );
        assert_eq!(
            ObjectKind::classify(&Value::Dictionary(Dictionary::with_type("FontDescriptor"))),
            ObjectKind::Font
        );
    }

    #[test]
    fn classify_image_stream() {
        assert_eq!(ObjectKind::classify(&image()), ObjectKind::Image);
    }

    #[test]
    fn classify_icc_stream_and_arrays() {
        let mut d = Dictionary::new();
        d.insert("N", 3);
        let icc = Value::Stream(Stream::new(d, vec![0; 128]));
        assert_eq!(ObjectKind::classify(&icc), ObjectKind::ColorSpace);

        let cs = Value::Array(vec![Value::name("ICCBased"), Value::Integer(1)]);
        assert_eq!(ObjectKind::classify(&cs), ObjectKind::ColorSpace);

        let plain = Value::Array(vec![Value::Integer(42)]);
        assert_eq!(ObjectKind::classify(&plain), ObjectKind::Generic);
    }

    #[test]
    fn classify_font_file_stream() {
        let mut d = Dictionary::new();
        d.insert("Length1", 1024);
        assert_eq!(
            ObjectKind::classify(&Value::Stream(Stream::new(d, vec![0; 8]))),
            ObjectKind::Font
        );
    }

    #[test]
    fn leaves_are_generic() {
        assert_eq!(ObjectKind::classify(&Value::Integer(42)), ObjectKind::Generic);
        assert_eq!(ObjectKind::classify(&Value::Null), ObjectKind::Generic);
        assert_eq!(
            ObjectKind::classify(&Value::Stream(Stream::from_bytes(vec![1, 2, 34, 45]))),
            ObjectKind::Generic
        );
    }
}
