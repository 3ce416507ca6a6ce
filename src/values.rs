//! Field name to value mapping shared by synthesis, normalization and filling

use indexmap::IndexMap;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Insertion-ordered mapping from exact field name to string value.
///
/// Order matters: normalization rules that pick "the first" matching entry
/// scan in insertion order. Re-inserting an existing name keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValueMap {
    entries: IndexMap<String, String>,
}

impl FieldValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Set `name` to `value`, returning the previous value if any
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(name.into(), value.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Rewrite every value in place, keeping names and order
    pub fn map_values(mut self, mut f: impl FnMut(&str, String) -> String) -> Self {
        for (k, v) in self.entries.iter_mut() {
            let old = std::mem::take(v);
            *v = f(k, old);
        }
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldValueMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for FieldValueMap {
    type Item = (String, String);
    type IntoIter = indexmap::map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Render a JSON scalar the way it should land in a text field.
///
/// Returns `None` for arrays and objects, which have no single-field form.
pub fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => Some(String::new()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}

impl Serialize for FieldValueMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldValueMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldValueMapVisitor;

        impl<'de> Visitor<'de> for FieldValueMapVisitor {
            type Value = FieldValueMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping field names to scalar values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = FieldValueMap::new();
                while let Some((name, value)) =
                    access.next_entry::<String, serde_json::Value>()?
                {
                    let value = scalar_to_string(&value).ok_or_else(|| {
                        de::Error::custom(format!("value for \"{}\" must be a scalar", name))
                    })?;
                    map.insert(name, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(FieldValueMapVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_position() {
        let mut map = FieldValueMap::new();
        map.insert("b", "1");
        map.insert("a", "2");
        assert_eq!(map.insert("b", "3"), Some("1".to_string()));

        let names: Vec<&str> = map.names().collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(map.get("b"), Some("3"));
    }

    #[test]
    fn test_deserialize_preserves_document_order() {
        let map: FieldValueMap =
            serde_json::from_str(r#"{"Zip": "90210", "Age": 42, "Agree": true, "Note": null}"#)
                .unwrap();
        let pairs: Vec<(&str, &str)> = map.iter().collect();
        assert_eq!(
            pairs,
            vec![("Zip", "90210"), ("Age", "42"), ("Agree", "true"), ("Note", "")]
        );
    }

    #[test]
    fn test_deserialize_rejects_nested_values() {
        let result: Result<FieldValueMap, _> = serde_json::from_str(r#"{"Name": ["a", "b"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_wide_map_lookup_and_order() {
        let map: FieldValueMap = (0..2000)
            .map(|i| (format!("Item {}", i), i.to_string()))
            .chain(std::iter::once(("Item 7".to_string(), "last".to_string())))
            .collect();

        assert_eq!(map.len(), 2000);
        assert_eq!(map.get("Item 7"), Some("last"));
        assert_eq!(map.get("Item 1999"), Some("1999"));
        assert_eq!(map.names().nth(7), Some("Item 7"));
        assert_eq!(map.names().last(), Some("Item 1999"));
    }

    #[test]
    fn test_names_are_exact() {
        let map: FieldValueMap = [("Seller State", "CA")].into_iter().collect();
        assert!(map.contains_key("Seller State"));
        assert!(!map.contains_key("seller state"));
        assert!(!map.contains_key("Seller State "));
    }
}
