//! JSON-representable values with shared containers.
//!
//! Arrays and objects are reference-counted handles, so one container can be
//! reachable from several places, including from inside itself. Cloning a
//! `Value` clones the handle, not the contents.
//!
//! Only serialization checks for cycles; `Debug` and `PartialEq` on a cyclic
//! value may not terminate. A cycle also keeps its containers alive after the
//! last outside handle is dropped: call [`Value::clear`] on one container of
//! the cycle to free it.

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::CompressError;

/// Shared, mutable container handle.
pub type Shared<T> = Arc<RwLock<T>>;

/// Object contents. Keys are kept (and serialized) in sorted order.
pub type Map = BTreeMap<String, Value>;

/// Deepest container nesting accepted for serialization. serde_json's reader
/// rejects the 128th nested container, so nothing deeper is ever written.
pub const MAX_NESTING_DEPTH: usize = 127;

/// A JSON-representable value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Shared<Vec<Value>>),
    Object(Shared<Map>),
}

impl Value {
    /// Create an array from its elements.
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(Arc::new(RwLock::new(items.into_iter().collect())))
    }

    /// Create an object from key/value pairs.
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(Arc::new(RwLock::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )))
    }

    /// Append to an array. Returns false if this is not an array.
    pub fn push(&self, item: Value) -> bool {
        match self {
            Value::Array(items) => {
                items.write().push(item);
                true
            }
            _ => false,
        }
    }

    /// Insert into an object. Returns false if this is not an object.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> bool {
        match self {
            Value::Object(map) => {
                map.write().insert(key.into(), value);
                true
            }
            _ => false,
        }
    }

    /// Remove every element of an array or entry of an object.
    ///
    /// Breaks any reference cycle passing through this container.
    pub fn clear(&self) {
        match self {
            Value::Array(items) => items.write().clear(),
            Value::Object(map) => map.write().clear(),
            _ => {}
        }
    }

    /// Look up a key of an object.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(map) => map.read().get(key).cloned(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert any `Serialize` type into a value.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, CompressError> {
        serde_json::to_value(value)
            .map(Value::from)
            .map_err(|e| CompressError::Serialization(e.to_string()))
    }

    /// Convert this value into any `DeserializeOwned` type.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, CompressError> {
        let json = self.to_json()?;
        serde_json::from_value(json).map_err(|e| CompressError::Deserialization(e.to_string()))
    }

    /// Convert into an owned `serde_json::Value`.
    ///
    /// Fails with [`CompressError::Serialization`] if a container contains
    /// itself through any chain of containers, or if containers nest deeper
    /// than [`MAX_NESTING_DEPTH`].
    pub fn to_json(&self) -> Result<serde_json::Value, CompressError> {
        let mut ancestors = Vec::new();
        let mut path = String::from("$");
        to_json_inner(self, &mut ancestors, &mut path)
    }
}

fn to_json_inner(
    value: &Value,
    ancestors: &mut Vec<usize>,
    path: &mut String,
) -> Result<serde_json::Value, CompressError> {
    match value {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Number(n) => Ok(serde_json::Value::Number(n.clone())),
        Value::String(s) => Ok(serde_json::Value::String(s.clone())),
        Value::Array(items) => {
            let id = Arc::as_ptr(items) as *const () as usize;
            enter(id, ancestors, path)?;
            let items = items.read();
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let len = path.len();
                path.push_str(&format!("[{}]", i));
                out.push(to_json_inner(item, ancestors, path)?);
                path.truncate(len);
            }
            ancestors.pop();
            Ok(serde_json::Value::Array(out))
        }
        Value::Object(map) => {
            let id = Arc::as_ptr(map) as *const () as usize;
            enter(id, ancestors, path)?;
            let map = map.read();
            let mut out = serde_json::Map::new();
            for (key, item) in map.iter() {
                let len = path.len();
                path.push('.');
                path.push_str(key);
                out.insert(key.clone(), to_json_inner(item, ancestors, path)?);
                path.truncate(len);
            }
            ancestors.pop();
            Ok(serde_json::Value::Object(out))
        }
    }
}

fn enter(id: usize, ancestors: &mut Vec<usize>, path: &str) -> Result<(), CompressError> {
    if ancestors.len() >= MAX_NESTING_DEPTH {
        return Err(CompressError::Serialization(format!(
            "nesting deeper than {} at {}",
            MAX_NESTING_DEPTH, path
        )));
    }
    if ancestors.contains(&id) {
        return Err(CompressError::Serialization(format!(
            "circular reference at {}",
            path
        )));
    }
    ancestors.push(id);
    Ok(())
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                Arc::ptr_eq(a, b) || *a.read() == *b.read()
            }
            (Value::Object(a), Value::Object(b)) => {
                Arc::ptr_eq(a, b) || *a.read() == *b.read()
            }
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::array(items.into_iter().map(Value::from)),
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON form and become `Null`.
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
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

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}
