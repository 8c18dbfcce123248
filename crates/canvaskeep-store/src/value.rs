//! Storage value model.
//!
//! Mirrors what the document store can hold: scalars, keyed maps and
//! sequences. A sequence may hold maps and scalars but never another
//! sequence; [`Value::check_storable`] enforces that before anything is
//! written.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Keyed map of storage values
pub type Map = BTreeMap<String, Value>;

/// A single storable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Array(Vec<Value>),
    Map(Map),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view of integers and doubles
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key if this is a map
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Verify the value can be written to the store.
    ///
    /// Fails with [`StoreError::NestedSequence`] naming the first offending
    /// field, e.g. `objects[3].path`.
    pub fn check_storable(&self) -> Result<()> {
        check_at(self, &mut String::new())
    }

    /// Convert from a JSON value. Integers that fit `i64` stay integers.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(obj) => Value::Map(
                obj.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to a JSON value. Non-finite doubles become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) => serde_json::Value::from(*n),
            Value::Double(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

fn check_at(value: &Value, path: &mut String) -> Result<()> {
    match value {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let len = path.len();
                path.push_str(&format!("[{}]", i));
                if matches!(item, Value::Array(_)) {
                    return Err(StoreError::NestedSequence { path: path.clone() });
                }
                check_at(item, path)?;
                path.truncate(len);
            }
            Ok(())
        }
        Value::Map(map) => {
            for (key, item) in map {
                let len = path.len();
                if !path.is_empty() {
                    path.push('.');
                }
                path.push_str(key);
                check_at(item, path)?;
                path.truncate(len);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_sequences_and_maps_are_storable() {
        let value = Value::from_json(json!({
            "objects": [
                {"type": "rect", "left": 10, "dash": [1, 2, 3]},
                {"type": "path", "path": "[[\"M\",0,0]]"}
            ],
            "version": 1
        }));
        assert!(value.check_storable().is_ok());
    }

    #[test]
    fn nested_sequence_is_rejected_with_its_path() {
        let value = Value::from_json(json!({
            "objects": [
                {"type": "rect"},
                {"type": "path", "path": [["M", 0, 0], ["L", 10, 10]]}
            ]
        }));
        match value.check_storable() {
            Err(StoreError::NestedSequence { path }) => assert_eq!(path, "objects[1].path[0]"),
            other => panic!("expected nested sequence error, got {:?}", other),
        }
    }

    #[test]
    fn json_conversion_keeps_integer_and_double_apart() {
        let value = Value::from_json(json!({"a": 3, "b": 2.5}));
        assert_eq!(value.get("a"), Some(&Value::Integer(3)));
        assert_eq!(value.get("b"), Some(&Value::Double(2.5)));
        assert_eq!(value.to_json(), json!({"a": 3, "b": 2.5}));
    }

    #[test]
    fn none_becomes_null() {
        let v: Value = Option::<String>::None.into();
        assert!(v.is_null());
    }
}
