//! Stored value model
//!
//! A [`StoredValue`] is the unit persisted in a record file: a scalar, an
//! ordered list, or a string-keyed map of further values. Callables and live
//! resources have no representation; callers hand over a [`Source`] and the
//! store resolves it to a value at the point of a miss.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value that can be persisted in a cache record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StoredValue {
    /// Absence of a value
    Null,
    /// Boolean scalar
    Bool(bool),
    /// Signed integer scalar
    Int(i64),
    /// Floating point scalar (finite values only)
    Float(f64),
    /// UTF-8 string scalar
    String(String),
    /// Ordered sequence of values
    List(Vec<StoredValue>),
    /// String-keyed collection of values
    Map(BTreeMap<String, StoredValue>),
}

impl StoredValue {
    /// Returns true for [`StoredValue::Null`]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow the entries of a map value
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, StoredValue>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up `key` in a map value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&StoredValue> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Borrow the string payload
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer payload
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Boolean payload
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Name of the variant, as written in the record's `type` tag
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Nesting depth; scalars have depth 1
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::List(items) => 1 + items.iter().map(Self::depth).max().unwrap_or(0),
            Self::Map(map) => 1 + map.values().map(Self::depth).max().unwrap_or(0),
            _ => 1,
        }
    }

    /// Convert any serializable value into a stored value
    ///
    /// Fails with [`Error::UnsupportedValue`] when the value has no stored
    /// representation: map keys that are not strings, integers outside the
    /// `i64` range, or non-finite floats.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let json = serde_json::to_value(value)
            .map_err(|e| Error::unsupported(format!("value is not serializable: {e}")))?;
        Self::try_from(json)
    }

    /// Convert this stored value into a typed value
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> std::result::Result<T, String> {
        let json = serde_json::Value::try_from(self).map_err(|e| e.to_string())?;
        serde_json::from_value(json).map_err(|e| e.to_string())
    }
}

impl TryFrom<serde_json::Value> for StoredValue {
    type Error = Error;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        use serde_json::Value;

        Ok(match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if n.is_u64() {
                    return Err(Error::unsupported(format!(
                        "integer {n} is outside the signed 64-bit range"
                    )));
                } else {
                    match n.as_f64() {
                        Some(f) if f.is_finite() => Self::Float(f),
                        _ => return Err(Error::unsupported(format!("number {n} is not finite"))),
                    }
                }
            }
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(
                items
                    .into_iter()
                    .map(Self::try_from)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| Ok((k, Self::try_from(v)?)))
                    .collect::<Result<BTreeMap<_, _>>>()?,
            ),
        })
    }
}

impl TryFrom<&StoredValue> for serde_json::Value {
    type Error = Error;

    fn try_from(value: &StoredValue) -> Result<Self> {
        Ok(match value {
            StoredValue::Null => Self::Null,
            StoredValue::Bool(b) => Self::Bool(*b),
            StoredValue::Int(i) => Self::from(*i),
            StoredValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Self::Number)
                .ok_or_else(|| Error::unsupported(format!("float {f} is not finite")))?,
            StoredValue::String(s) => Self::String(s.clone()),
            StoredValue::List(items) => Self::Array(
                items
                    .iter()
                    .map(Self::try_from)
                    .collect::<Result<Vec<_>>>()?,
            ),
            StoredValue::Map(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), Self::try_from(v)?)))
                    .collect::<Result<serde_json::Map<_, _>>>()?,
            ),
        })
    }
}

impl From<bool> for StoredValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for StoredValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for StoredValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for StoredValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for StoredValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for StoredValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for StoredValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T: Into<StoredValue>> From<Vec<T>> for StoredValue {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<StoredValue>> From<BTreeMap<String, T>> for StoredValue {
    fn from(value: BTreeMap<String, T>) -> Self {
        Self::Map(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<StoredValue>> From<Option<T>> for StoredValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<K: Into<String>, V: Into<StoredValue>> FromIterator<(K, V)> for StoredValue {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Where the value for a cache miss comes from
///
/// A `Factory` is invoked at most once, and only when the store misses.
pub enum Source<F = fn() -> StoredValue> {
    /// A ready value
    Literal(StoredValue),
    /// A producer evaluated on a miss
    Factory(F),
}

impl Source {
    /// Source backed by a ready value
    #[must_use]
    pub fn literal(value: impl Into<StoredValue>) -> Self {
        Self::Literal(value.into())
    }
}

impl<F> Source<F>
where
    F: FnOnce() -> StoredValue,
{
    /// Source backed by a producer
    #[must_use]
    pub fn factory(f: F) -> Self {
        Self::Factory(f)
    }

    /// Produce the value, invoking the factory if there is one
    pub fn resolve(self) -> StoredValue {
        match self {
            Self::Literal(value) => value,
            Self::Factory(f) => f(),
        }
    }
}

impl<F> std::fmt::Debug for Source<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_keeps_number_kinds() {
        let value = StoredValue::try_from(json!({"i": 123, "f": 1.5, "s": "123"})).unwrap();
        assert_eq!(value.get("i"), Some(&StoredValue::Int(123)));
        assert_eq!(value.get("f"), Some(&StoredValue::Float(1.5)));
        assert_eq!(value.get("s"), Some(&StoredValue::String("123".into())));
    }

    #[test]
    fn test_from_json_rejects_large_unsigned() {
        let err = StoredValue::try_from(json!(u64::MAX)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedValue { .. }));
    }

    #[test]
    fn test_from_serialize_rejects_non_string_keys() {
        let mut map = std::collections::HashMap::new();
        map.insert((1, 2), "pair");
        let err = StoredValue::from_serialize(&map).unwrap_err();
        assert!(matches!(err, Error::UnsupportedValue { .. }));
    }

    #[test]
    fn test_deserialize_into_struct() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Point {
            x: i64,
            y: i64,
        }

        let value = StoredValue::from_serialize(&Point { x: 1, y: -2 }).unwrap();
        assert_eq!(value.get("x"), Some(&StoredValue::Int(1)));
        let back: Point = value.deserialize_into().unwrap();
        assert_eq!(back, Point { x: 1, y: -2 });
    }

    #[test]
    fn test_non_finite_float_has_no_json_form() {
        let err = serde_json::Value::try_from(&StoredValue::Float(f64::NAN)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedValue { .. }));
    }

    #[test]
    fn test_from_impls() {
        assert_eq!(StoredValue::from(true), StoredValue::Bool(true));
        assert_eq!(StoredValue::from(7_i32), StoredValue::Int(7));
        assert_eq!(StoredValue::from(None::<i64>), StoredValue::Null);
        assert_eq!(
            StoredValue::from(vec!["a", "b"]),
            StoredValue::List(vec!["a".into(), "b".into()])
        );
        let map: StoredValue = [("k", 1_i64)].into_iter().collect();
        assert_eq!(map.get("k"), Some(&StoredValue::Int(1)));
    }

    #[test]
    fn test_depth() {
        assert_eq!(StoredValue::Null.depth(), 1);
        assert_eq!(StoredValue::List(vec![]).depth(), 1);
        let nested = StoredValue::List(vec![StoredValue::List(vec![StoredValue::Int(1)])]);
        assert_eq!(nested.depth(), 3);
    }

    #[test]
    fn test_source_factory_runs_on_resolve() {
        let mut calls = 0;
        let source = Source::factory(|| {
            calls += 1;
            StoredValue::Int(5)
        });
        assert_eq!(source.resolve(), StoredValue::Int(5));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_source_literal() {
        let source = Source::literal("v");
        assert_eq!(format!("{source:?}"), "Literal(String(\"v\"))");
        assert_eq!(source.resolve(), StoredValue::String("v".into()));
    }
}
