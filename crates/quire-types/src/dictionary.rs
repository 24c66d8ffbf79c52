use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::error::TypeError;
use crate::object::ObjectId;
use crate::value::{Name, Value};

/// A dictionary object. Keys are kept sorted so output is deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dictionary {
    entries: BTreeMap<Name, Value>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dictionary with `/Type` already set.
    pub fn with_type(type_name: impl Into<Name>) -> Self {
        let mut dict = Self::new();
        dict.insert("Type", Value::Name(type_name.into()));
        dict
    }

    pub fn insert(&mut self, key: impl Into<Name>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(&Name::from(key))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(&Name::from(key))
    }

    /// Like [`Self::get`] but a missing key is an error.
    pub fn require(&self, key: &str) -> Result<&Value, TypeError> {
        self.get(key)
            .ok_or_else(|| TypeError::MissingKey(key.to_string()))
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(&Name::from(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&Name::from(key))
    }

    /// The name stored under `key`, if present and a name.
    pub fn name_of(&self, key: &str) -> Option<&Name> {
        match self.get(key) {
            Some(Value::Name(n)) => Some(n),
            _ => None,
        }
    }

    /// Shorthand for `name_of("Type")`.
    pub fn type_name(&self) -> Option<&Name> {
        self.name_of("Type")
    }

    /// Shorthand for `name_of("Subtype")`.
    pub fn subtype(&self) -> Option<&Name> {
        self.name_of("Subtype")
    }

    /// Returns the dictionary under `key`, inserting an empty one if absent.
    pub fn entry_dict(&mut self, key: &str) -> Result<&mut Dictionary, TypeError> {
        self.entries
            .entry(Name::from(key))
            .or_insert_with(|| Value::Dictionary(Dictionary::new()))
            .as_dict_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Name, Value> {
        self.entries.iter()
    }

    pub fn values_mut(&mut self) -> btree_map::ValuesMut<'_, Name, Value> {
        self.entries.values_mut()
    }

    pub(crate) fn visit_references(&self, skip_keys: &[&str], f: &mut impl FnMut(ObjectId)) {
        for (key, value) in &self.entries {
            if skip_keys.contains(&key.as_str()) {
                continue;
            }
            value.visit_references(skip_keys, f);
        }
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a Name, &'a Value);
    type IntoIter = btree_map::Iter<'a, Name, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<K: Into<Name>, V: Into<Value>> FromIterator<(K, V)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut dict = Self::new();
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}

/// A stream object: a dictionary plus raw (possibly encoded) bytes.
///
/// `/Length` is not kept in the dictionary; the writer fills it in from the
/// data it actually emits.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stream {
    pub dict: Dictionary,
    pub data: Vec<u8>,
}

impl Stream {
    pub fn new(dict: Dictionary, data: Vec<u8>) -> Self {
        Self { dict, data }
    }

    /// A stream with an empty dictionary.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::new(Dictionary::new(), data.into())
    }

    /// Returns `true` if the stream already declares a `/Filter`.
    pub fn is_encoded(&self) -> bool {
        self.dict.contains_key("Filter")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut d = Dictionary::with_type("Page");
        d.insert("Rotate", 90);
        assert_eq!(d.type_name().unwrap(), "Page");
        assert_eq!(d.get("Rotate").unwrap().as_i64().unwrap(), 90);
        assert!(d.get("Missing").is_none());
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn require_reports_missing_key() {
        let d = Dictionary::new();
        assert_eq!(
            d.require("MediaBox").unwrap_err(),
            TypeError::MissingKey("MediaBox".into())
        );
    }

    #[test]
    fn entry_dict_creates_and_reuses() {
        let mut d = Dictionary::new();
        d.entry_dict("Resources").unwrap().insert("ProcSet", Value::Null);
        d.entry_dict("Resources").unwrap().insert("XObject", Dictionary::new());
        assert_eq!(d.get("Resources").unwrap().as_dict().unwrap().len(), 2);
    }

    #[test]
    fn entry_dict_on_wrong_type_is_mismatch() {
        let mut d = Dictionary::new();
        d.insert("Resources", 1);
        assert!(matches!(
            d.entry_dict("Resources"),
            Err(TypeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn keys_iterate_sorted() {
        let d: Dictionary = [("Zed", 1), ("Alpha", 2), ("Mid", 3)].into_iter().collect();
        let keys: Vec<&str> = d.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["Alpha", "Mid", "Zed"]);
    }

    #[test]
    fn stream_encoded_flag() {
        let mut s = Stream::from_bytes(b"abc".to_vec());
        assert!(!s.is_encoded());
        s.dict.insert("Filter", Value::name("FlateDecode"));
        assert!(s.is_encoded());
    }
}
