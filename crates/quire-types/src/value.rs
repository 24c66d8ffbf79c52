use std::fmt;

use crate::dictionary::{Dictionary, Stream};
use crate::error::TypeError;
use crate::object::ObjectId;

// ---------------------------------------------------------------------------
// Name
// ---------------------------------------------------------------------------

/// A name object (`/Type`, `/Page`, ...). Stored without the leading slash.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// ---------------------------------------------------------------------------
// PdfString
// ---------------------------------------------------------------------------

/// How a string object is written out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StringFormat {
    /// `(text)` with escapes.
    #[default]
    Literal,
    /// `<48656C6C6F>`.
    Hex,
}

/// A string object: raw bytes plus the preferred output form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PdfString {
    pub bytes: Vec<u8>,
    pub format: StringFormat,
}

impl PdfString {
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            format: StringFormat::Literal,
        }
    }

    pub fn hex(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            format: StringFormat::Hex,
        }
    }

    /// Parse a hex-encoded string body (without the angle brackets).
    pub fn from_hex_str(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Ok(Self::hex(bytes))
    }

    /// Lossy UTF-8 view, for diagnostics.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A value in the document object graph.
///
/// Composite values own their children. A child that has been promoted to
/// an indirect object is represented by a [`Value::Reference`]; the object
/// itself then lives in the indirect reference table.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    String(PdfString),
    Name(Name),
    Array(Vec<Value>),
    Dictionary(Dictionary),
    Stream(Stream),
    Reference(ObjectId),
}

impl Value {
    /// Shorthand for a name value.
    pub fn name(name: impl Into<Name>) -> Self {
        Self::Name(name.into())
    }

    /// Shorthand for a literal string value.
    pub fn string(text: impl Into<Vec<u8>>) -> Self {
        Self::String(PdfString::literal(text))
    }

    /// Variant name, used in type mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::String(_) => "string",
            Self::Name(_) => "name",
            Self::Array(_) => "array",
            Self::Dictionary(_) => "dictionary",
            Self::Stream(_) => "stream",
            Self::Reference(_) => "reference",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Result<bool, TypeError> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(TypeError::mismatch("boolean", other.kind_name())),
        }
    }

    pub fn as_i64(&self) -> Result<i64, TypeError> {
        match self {
            Self::Integer(n) => Ok(*n),
            other => Err(TypeError::mismatch("integer", other.kind_name())),
        }
    }

    /// Numeric value of an integer or real.
    pub fn as_f64(&self) -> Result<f64, TypeError> {
        match self {
            Self::Integer(n) => Ok(*n as f64),
            Self::Real(r) => Ok(*r),
            other => Err(TypeError::mismatch("number", other.kind_name())),
        }
    }

    pub fn as_name(&self) -> Result<&Name, TypeError> {
        match self {
            Self::Name(n) => Ok(n),
            other => Err(TypeError::mismatch("name", other.kind_name())),
        }
    }

    pub fn as_string(&self) -> Result<&PdfString, TypeError> {
        match self {
            Self::String(s) => Ok(s),
            other => Err(TypeError::mismatch("string", other.kind_name())),
        }
    }

    pub fn as_array(&self) -> Result<&Vec<Value>, TypeError> {
        match self {
            Self::Array(items) => Ok(items),
            other => Err(TypeError::mismatch("array", other.kind_name())),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut Vec<Value>, TypeError> {
        match self {
            Self::Array(items) => Ok(items),
            other => Err(TypeError::mismatch("array", other.kind_name())),
        }
    }

    /// The dictionary of a dictionary value, or the stream dictionary of a
    /// stream value.
    pub fn as_dict(&self) -> Result<&Dictionary, TypeError> {
        match self {
            Self::Dictionary(dict) => Ok(dict),
            Self::Stream(stream) => Ok(&stream.dict),
            other => Err(TypeError::mismatch("dictionary", other.kind_name())),
        }
    }

    pub fn as_dict_mut(&mut self) -> Result<&mut Dictionary, TypeError> {
        match self {
            Self::Dictionary(dict) => Ok(dict),
            Self::Stream(stream) => Ok(&mut stream.dict),
            other => Err(TypeError::mismatch("dictionary", other.kind_name())),
        }
    }

    pub fn as_stream(&self) -> Result<&Stream, TypeError> {
        match self {
            Self::Stream(stream) => Ok(stream),
            other => Err(TypeError::mismatch("stream", other.kind_name())),
        }
    }

    pub fn as_stream_mut(&mut self) -> Result<&mut Stream, TypeError> {
        match self {
            Self::Stream(stream) => Ok(stream),
            other => Err(TypeError::mismatch("stream", other.kind_name())),
        }
    }

    pub fn as_reference(&self) -> Result<ObjectId, TypeError> {
        match self {
            Self::Reference(id) => Ok(*id),
            other => Err(TypeError::mismatch("reference", other.kind_name())),
        }
    }

    /// Append to an array value.
    pub fn push(&mut self, item: impl Into<Value>) -> Result<(), TypeError> {
        self.as_array_mut()?.push(item.into());
        Ok(())
    }

    /// Replace the element at `index` of an array value.
    pub fn set_index(&mut self, index: usize, item: impl Into<Value>) -> Result<Value, TypeError> {
        let items = self.as_array_mut()?;
        let len = items.len();
        let slot = items
            .get_mut(index)
            .ok_or(TypeError::IndexOutOfBounds { index, len })?;
        Ok(std::mem::replace(slot, item.into()))
    }

    /// Insert into a dictionary or stream dictionary.
    pub fn insert(
        &mut self,
        key: impl Into<Name>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, TypeError> {
        Ok(self.as_dict_mut()?.insert(key, value))
    }

    /// Every reference reachable without leaving this value.
    pub fn references(&self) -> Vec<ObjectId> {
        let mut out = Vec::new();
        self.visit_references(&[], &mut |id| out.push(id));
        out
    }

    /// Walk direct children and report every [`Value::Reference`] found.
    /// Dictionary entries whose key is listed in `skip_keys` are not entered.
    pub fn visit_references(&self, skip_keys: &[&str], f: &mut impl FnMut(ObjectId)) {
        match self {
            Self::Reference(id) => f(*id),
            Self::Array(items) => {
                for item in items {
                    item.visit_references(skip_keys, f);
                }
            }
            Self::Dictionary(dict) => dict.visit_references(skip_keys, f),
            Self::Stream(stream) => stream.dict.visit_references(skip_keys, f),
            _ => {}
        }
    }

    /// Replace every stream nested inside this value with a reference
    /// produced by `promote`. The value itself is left alone even if it is
    /// a stream; only its descendants are rewritten.
    ///
    /// Returns the number of streams promoted.
    pub fn promote_nested_streams(&mut self, promote: &mut impl FnMut(Stream) -> ObjectId) -> usize {
        match self {
            Self::Array(items) => items
                .iter_mut()
                .map(|item| promote_slot(item, promote))
                .sum(),
            Self::Dictionary(dict) => dict
                .values_mut()
                .map(|item| promote_slot(item, promote))
                .sum(),
            Self::Stream(stream) => stream
                .dict
                .values_mut()
                .map(|item| promote_slot(item, promote))
                .sum(),
            _ => 0,
        }
    }
}

fn promote_slot(slot: &mut Value, promote: &mut impl FnMut(Stream) -> ObjectId) -> usize {
    if matches!(slot, Value::Stream(_)) {
        if let Value::Stream(stream) = std::mem::take(slot) {
            *slot = Value::Reference(promote(stream));
        }
        1
    } else {
        slot.promote_nested_streams(promote)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Integer(n as i64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Integer(n as i64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Integer(n as i64)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Self::Real(r)
    }
}

impl From<Name> for Value {
    fn from(name: Name) -> Self {
        Self::Name(name)
    }
}

impl From<PdfString> for Value {
    fn from(s: PdfString) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<Dictionary> for Value {
    fn from(dict: Dictionary) -> Self {
        Self::Dictionary(dict)
    }
}

impl From<Stream> for Value {
    fn from(stream: Stream) -> Self {
        Self::Stream(stream)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Self::Reference(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessor_mismatch_reports_both_kinds() {
        let v = Value::Integer(42);
        let err = v.as_name().unwrap_err();
        assert_eq!(
            err,
            TypeError::TypeMismatch {
                expected: "name",
                found: "integer"
            }
        );
    }

    #[test]
    fn as_f64_accepts_integers_and_reals() {
        assert_eq!(Value::Integer(3).as_f64().unwrap(), 3.0);
        assert_eq!(Value::Real(1.5).as_f64().unwrap(), 1.5);
        assert!(Value::Null.as_f64().is_err());
    }

    #[test]
    fn push_on_non_array_is_an_error() {
        let mut v = Value::Dictionary(Dictionary::new());
        assert!(v.push(1).is_err());

        let mut arr = Value::Array(Vec::new());
        arr.push(42).unwrap();
        assert_eq!(arr.as_array().unwrap().len(), 1);
    }

    #[test]
    fn set_index_out_of_bounds() {
        let mut arr = Value::Array(vec![Value::Null]);
        let err = arr.set_index(3, true).unwrap_err();
        assert_eq!(err, TypeError::IndexOutOfBounds { index: 3, len: 1 });
        let old = arr.set_index(0, true).unwrap();
        assert!(old.is_null());
    }

    #[test]
    fn references_are_collected_recursively() {
        let mut inner = Dictionary::new();
        inner.insert("Font", ObjectId::new(5, 0));
        let mut outer = Dictionary::new();
        outer.insert("Resources", inner);
        outer.insert("Parent", ObjectId::new(2, 0));
        outer.insert("Kids", vec![Value::Reference(ObjectId::new(7, 1))]);
        let v = Value::Dictionary(outer);

        let mut all = v.references();
        all.sort();
        assert_eq!(
            all,
            vec![ObjectId::new(2, 0), ObjectId::new(5, 0), ObjectId::new(7, 1)]
        );

        let mut without_parent = Vec::new();
        v.visit_references(&["Parent"], &mut |id| without_parent.push(id));
        assert_eq!(without_parent.len(), 2);
        assert!(!without_parent.contains(&ObjectId::new(2, 0)));
    }

    #[test]
    fn nested_streams_are_promoted() {
        let stream = Stream::new(Dictionary::new(), vec![1, 2, 34, 45]);
        let mut arr = Value::Array(vec![Value::Integer(42), Value::Stream(stream.clone())]);

        let mut promoted = Vec::new();
        let count = arr.promote_nested_streams(&mut |s| {
            promoted.push(s);
            ObjectId::new(10, 0)
        });

        assert_eq!(count, 1);
        assert_eq!(promoted, vec![stream]);
        assert_eq!(arr.as_array().unwrap()[1], Value::Reference(ObjectId::new(10, 0)));
    }

    #[test]
    fn top_level_stream_is_not_promoted() {
        let mut v = Value::Stream(Stream::new(Dictionary::new(), b"q Q".to_vec()));
        let count = v.promote_nested_streams(&mut |_| ObjectId::new(1, 0));
        assert_eq!(count, 0);
        assert!(v.as_stream().is_ok());
    }

    #[test]
    fn name_compares_with_str() {
        let n = Name::new("Page");
        assert_eq!(n, "Page");
        assert_eq!(n.to_string(), "/Page");
    }

    #[test]
    fn hex_string_parse() {
        let s = PdfString::from_hex_str("48656c6c6f").unwrap();
        assert_eq!(s.bytes, b"Hello");
        assert_eq!(s.format, StringFormat::Hex);
        assert!(PdfString::from_hex_str("zz").is_err());
    }
}
