//! Immutable state values with structural sharing
//!
//! [`Value`] is the representation of every state tree, scoped slice and
//! payload in the store. Containers (`List`, `Map`) and strings live behind
//! [`Arc`], so cloning a value is cheap and two snapshots can share every
//! subtree that neither of them changed.
//!
//! Values never change in place once they are reachable from a published
//! snapshot. Edits go through [`Draft`](crate::draft::Draft), which copies only
//! the containers along the edited path (`Arc::make_mut`).
//!
//! # Example
//!
//! ```
//! use draft_dispatch_core::Value;
//! use serde_json::json;
//!
//! let state = Value::from(json!({ "todos": { "items": ["a", "b"] } }));
//! assert_eq!(state.get_path(&["todos", "items", "1"]), Some(&Value::from("b")));
//! assert_eq!(state.to_string(), r#"{"todos":{"items":["a","b"]}}"#);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Ordered mapping of named children.
pub type Map = BTreeMap<String, Value>;

/// A node of the state tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Arc<str>),
    List(Arc<Vec<Value>>),
    Map(Arc<Map>),
}

impl Value {
    /// An empty list.
    pub fn list() -> Self {
        Value::List(Arc::new(Vec::new()))
    }

    /// An empty map.
    pub fn map() -> Self {
        Value::Map(Arc::new(Map::new()))
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key of a map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Look up an element of a list value.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.as_list().and_then(|items| items.get(index))
    }

    /// Walk a path from this value. List steps are parsed as indices.
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        let mut current = self;
        for step in path {
            let step = step.as_ref();
            current = match current {
                Value::Map(map) => map.get(step)?,
                Value::List(items) => items.get(step.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Replace the value at `path` with `next`, copying every container on the
    /// way down and sharing everything else.
    ///
    /// Returns `false` (leaving `self` untouched) if the path does not resolve.
    pub fn set_path<S: AsRef<str>>(&mut self, path: &[S], next: Value) -> bool {
        if self.get_path(path).is_none() {
            return false;
        }
        let mut current = self;
        for step in path {
            let step = step.as_ref();
            current = match current {
                Value::Map(map) => match Arc::make_mut(map).get_mut(step) {
                    Some(child) => child,
                    None => return false,
                },
                Value::List(items) => {
                    let Ok(index) = step.parse::<usize>() else {
                        return false;
                    };
                    match Arc::make_mut(items).get_mut(index) {
                        Some(child) => child,
                        None => return false,
                    }
                }
                _ => return false,
            };
        }
        *current = next;
        true
    }

    /// Whether both values are the same allocation.
    ///
    /// Containers and strings compare by pointer; scalars by value. This is
    /// how tests observe structural sharing between snapshots.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            (Value::String(a), Value::String(b)) => Arc::ptr_eq(a, b),
            (a, b) => a == b,
        }
    }

    /// Convert into a `serde_json::Value`. Non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut entries = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map.iter() {
                    entries.serialize_entry(key, value)?;
                }
                entries.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => items.into_iter().map(Value::from).collect(),
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect(),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        value.to_json()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        match i64::try_from(i) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::Float(i as f64),
        }
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(Arc::new(map))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Value::List(Arc::new(iter.into_iter().collect()))
    }
}

impl FromIterator<(String, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Value::Map(Arc::new(iter.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_conversion_keeps_shape() {
        let json = json!({ "n": 1, "f": 1.5, "s": "x", "l": [true, null], "m": {} });
        let value = Value::from(json.clone());

        assert_eq!(value.get("n"), Some(&Value::Int(1)));
        assert_eq!(value.get("f"), Some(&Value::Float(1.5)));
        assert_eq!(value.get("s").and_then(Value::as_str), Some("x"));
        assert_eq!(value.get("l").and_then(Value::as_list).map(|l| l.len()), Some(2));
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn test_get_path_walks_lists_and_maps() {
        let value = Value::from(json!({ "a": { "b": [10, 20, { "c": "deep" }] } }));

        assert_eq!(value.get_path(&["a", "b", "1"]), Some(&Value::Int(20)));
        assert_eq!(
            value.get_path(&["a", "b", "2", "c"]).and_then(Value::as_str),
            Some("deep")
        );
        assert_eq!(value.get_path(&["a", "b", "9"]), None);
        assert_eq!(value.get_path(&["a", "b", "x"]), None);
        assert_eq!(value.get_path::<&str>(&[]), Some(&value));
    }

    #[test]
    fn test_set_path_shares_siblings() {
        let before = Value::from(json!({ "left": { "x": [1, 2] }, "right": { "y": 1 } }));
        let mut after = before.clone();

        assert!(after.set_path(&["right", "y"], Value::Int(2)));

        assert_eq!(before.get_path(&["right", "y"]), Some(&Value::Int(1)));
        assert_eq!(after.get_path(&["right", "y"]), Some(&Value::Int(2)));
        assert!(before.get("left").unwrap().ptr_eq(after.get("left").unwrap()));
        assert!(!before.get("right").unwrap().ptr_eq(after.get("right").unwrap()));
    }

    #[test]
    fn test_set_path_missing_is_noop() {
        let before = Value::from(json!({ "a": 1 }));
        let mut after = before.clone();

        assert!(!after.set_path(&["b", "c"], Value::Null));
        assert!(after.ptr_eq(&before));
    }

    #[test]
    fn test_serde_roundtrip_through_text() {
        let value = Value::from(json!({ "items": ["buy milk"], "count": 1 }));
        let text = serde_json::to_string(&value).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(parsed, value);
        assert_eq!(value.to_string(), text);
    }

    #[test]
    fn test_non_finite_float_serializes_as_null() {
        assert_eq!(Value::Float(f64::NAN).to_json(), serde_json::Value::Null);
    }
}
