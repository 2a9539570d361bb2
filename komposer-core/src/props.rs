//! Property Bags
//!
//! Containers pass data around as [`Props`]: an ordered map from property
//! name to [`PropValue`]. The interesting part is equality.
//!
//! # Shallow Equality
//!
//! Re-subscription and pure rendering decisions compare property bags one
//! level deep. Two bags are shallow-equal when they have the same keys and
//! every value is *identical*:
//!
//! - Scalars (null, booleans, numbers, strings) are identical when equal.
//! - Arrays, objects and opaque handles are identical only when they are the
//!   same allocation. Mutating-then-reusing is impossible behind an `Arc`, so
//!   a caller that wants "same data" must hand back the same `PropValue`.
//!
//! `PartialEq` on the other hand is deep, which is what tests usually want.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::error::{ComposeError, Result};

/// A single property value.
#[derive(Clone)]
pub enum PropValue {
    /// Plain data.
    Json(Arc<Value>),
    /// An opaque shared object (a store, a service handle, ...).
    Handle(Arc<dyn Any + Send + Sync>),
}

impl PropValue {
    /// Wrap an arbitrary shared object.
    pub fn handle<T: Any + Send + Sync>(value: T) -> Self {
        Self::Handle(Arc::new(value))
    }

    /// Wrap an already shared object, keeping its identity.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self::Handle(value)
    }

    /// The JSON value, if this is plain data.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Handle(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Value::as_str)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_json().and_then(Value::as_i64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_json().and_then(Value::as_bool)
    }

    /// Downcast a handle to its concrete type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Self::Handle(handle) => Arc::clone(handle).downcast::<T>().ok(),
            Self::Json(_) => None,
        }
    }

    /// Identity comparison used by shallow equality.
    pub fn same(&self, other: &PropValue) -> bool {
        match (self, other) {
            (Self::Json(a), Self::Json(b)) => match (a.as_ref(), b.as_ref()) {
                (Value::Array(_), _) | (Value::Object(_), _) => Arc::ptr_eq(a, b),
                (lhs, rhs) => lhs == rhs,
            },
            (Self::Handle(a), Self::Handle(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Json(a), Self::Json(b)) => a == b,
            _ => self.same(other),
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => write!(f, "{value}"),
            Self::Handle(_) => f.write_str("[handle]"),
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => match value.as_ref() {
                Value::String(s) => f.write_str(s),
                other => write!(f, "{other}"),
            },
            Self::Handle(_) => f.write_str("[handle]"),
        }
    }
}

impl Serialize for PropValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Json(value) => value.serialize(serializer),
            Self::Handle(_) => serializer.serialize_str("[handle]"),
        }
    }
}

impl From<Value> for PropValue {
    fn from(value: Value) -> Self {
        Self::Json(Arc::new(value))
    }
}

macro_rules! prop_value_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for PropValue {
                fn from(value: $ty) -> Self {
                    Self::Json(Arc::new(Value::from(value)))
                }
            }
        )*
    };
}

prop_value_from!(&str, String, bool, i32, i64, u32, u64, f64);

/// An ordered bag of properties.
#[derive(Clone, Default, PartialEq)]
pub struct Props(IndexMap<String, PropValue>);

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Option<PropValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropValue::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(PropValue::as_i64)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Project onto the given keys. Keys that are absent stay absent.
    pub fn pick<S: AsRef<str>>(&self, keys: &[S]) -> Props {
        keys.iter()
            .filter_map(|key| {
                let key = key.as_ref();
                self.0.get(key).map(|value| (key.to_owned(), value.clone()))
            })
            .collect()
    }

    /// A copy of `self` with every entry of `overlay` written on top.
    pub fn merged(&self, overlay: &Props) -> Props {
        let mut merged = self.clone();
        for (key, value) in &overlay.0 {
            merged.0.insert(key.clone(), value.clone());
        }
        merged
    }

    /// One-level identity comparison.
    pub fn shallow_eq(&self, other: &Props) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .all(|(key, value)| other.0.get(key).is_some_and(|o| value.same(o)))
    }

    /// Build props from any value that serializes to a JSON object.
    pub fn from_serialize<T: serde::Serialize + ?Sized>(value: &T) -> Result<Props> {
        let value = serde_json::to_value(value)
            .map_err(|err| ComposeError::InvalidReturnType(err.to_string()))?;
        match value {
            Value::Object(map) => Ok(map.into_iter().map(|(k, v)| (k, PropValue::from(v))).collect()),
            other => Err(ComposeError::InvalidReturnType(format!(
                "expected a plain object, got `{other}`"
            ))),
        }
    }

    /// Plain JSON view, handles rendered as `"[handle]"`.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Shallow equality over optional bags; two missing bags are equal.
pub fn shallow_eq_opt(a: Option<&Props>, b: Option<&Props>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.shallow_eq(b),
        _ => false,
    }
}

impl<K: Into<String>, V: Into<PropValue>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<'a> IntoIterator for &'a Props {
    type Item = (&'a String, &'a PropValue);
    type IntoIter = indexmap::map::Iter<'a, String, PropValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl Serialize for Props {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
