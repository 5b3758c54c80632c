//! Core Database Backend Traits
//!
//! This module defines the value type exchanged with the database, the attribute
//! map models are built from, and the connection trait every backend implements.
//! Backends receive the structured [`QueryBuilder`] and compile it themselves, so
//! the relationship layer never deals with SQL text directly.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::OrmResult;
use crate::query::QueryBuilder;

/// Column name to value map a model is hydrated from
pub type Attributes = BTreeMap<String, DatabaseValue>;

/// Build an attribute map from `(column, value)` pairs
pub fn attributes<I, K, V>(items: I) -> Attributes
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<DatabaseValue>,
{
    items
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// Abstract database connection
///
/// Implementations execute a structured query and hand back plain attribute rows.
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    /// Run a select query and return the result rows
    async fn select(&self, query: &QueryBuilder) -> OrmResult<Vec<Attributes>>;

    /// Run an insert, update or delete query and return the affected rows count
    async fn affecting_statement(&self, query: &QueryBuilder) -> OrmResult<u64>;

    /// Run a single row insert and return the value generated for `key_name`
    async fn insert_get_id(&self, query: &QueryBuilder, key_name: &str) -> OrmResult<DatabaseValue>;

    /// Short backend name used in log records
    fn backend_name(&self) -> &'static str;
}

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    DateTime(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    Json(JsonValue),
    Array(Vec<DatabaseValue>),
}

impl Default for DatabaseValue {
    fn default() -> Self {
        DatabaseValue::Null
    }
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Integer view of the value, if it holds an integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DatabaseValue::Int32(i) => Some(*i as i64),
            DatabaseValue::Int64(i) => Some(*i),
            DatabaseValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Floating point view of the value, if it is numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DatabaseValue::Int32(i) => Some(*i as f64),
            DatabaseValue::Int64(i) => Some(*i as f64),
            DatabaseValue::Float32(f) => Some(*f as f64),
            DatabaseValue::Float64(f) => Some(*f),
            _ => None,
        }
    }

    /// Canonical dictionary key used when matching eager loaded rows to parents
    ///
    /// Integers of any width and their string spelling map to the same key; null
    /// values have no key and never match.
    pub fn as_key(&self) -> Option<String> {
        match self {
            DatabaseValue::Null | DatabaseValue::Array(_) => None,
            DatabaseValue::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            DatabaseValue::Int32(i) => Some(i.to_string()),
            DatabaseValue::Int64(i) => Some(i.to_string()),
            DatabaseValue::Float32(f) => Some(f.to_string()),
            DatabaseValue::Float64(f) => Some(f.to_string()),
            DatabaseValue::String(s) => Some(s.clone()),
            DatabaseValue::Bytes(b) => Some(format!("{:?}", b)),
            DatabaseValue::Uuid(u) => Some(u.to_string()),
            DatabaseValue::DateTime(dt) => Some(dt.to_rfc3339()),
            DatabaseValue::Date(d) => Some(d.to_string()),
            DatabaseValue::Time(t) => Some(t.to_string()),
            DatabaseValue::Json(j) => Some(j.to_string()),
        }
    }

    /// SQL-style comparison, `None` when either side is null or the types are unrelated
    pub fn compare(&self, other: &DatabaseValue) -> Option<Ordering> {
        use DatabaseValue::*;

        match (self, other) {
            (Null, _) | (_, Null) => None,
            (Int32(_) | Int64(_), Int32(_) | Int64(_)) => Some(self.as_i64()?.cmp(&other.as_i64()?)),
            (Int32(_) | Int64(_) | Float32(_) | Float64(_), Int32(_) | Int64(_) | Float32(_) | Float64(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (String(a), String(b)) => Some(a.cmp(b)),
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Uuid(a), Uuid(b)) => Some(a.cmp(b)),
            (DateTime(a), DateTime(b)) => Some(a.cmp(b)),
            (Date(a), Date(b)) => Some(a.cmp(b)),
            (Time(a), Time(b)) => Some(a.cmp(b)),
            _ => match (self.as_key(), other.as_key()) {
                (Some(a), Some(b)) if a == b => Some(Ordering::Equal),
                _ => None,
            },
        }
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            DatabaseValue::Null => JsonValue::Null,
            DatabaseValue::Bool(b) => JsonValue::Bool(*b),
            DatabaseValue::Int32(i) => JsonValue::Number(serde_json::Number::from(*i)),
            DatabaseValue::Int64(i) => JsonValue::Number(serde_json::Number::from(*i)),
            DatabaseValue::Float32(f) => serde_json::Number::from_f64(*f as f64)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::Float64(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::String(s) => JsonValue::String(s.clone()),
            DatabaseValue::Bytes(b) => JsonValue::Array(b.iter().map(|&x| JsonValue::Number(serde_json::Number::from(x))).collect()),
            DatabaseValue::Uuid(u) => JsonValue::String(u.to_string()),
            DatabaseValue::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
            DatabaseValue::Date(d) => JsonValue::String(d.to_string()),
            DatabaseValue::Time(t) => JsonValue::String(t.to_string()),
            DatabaseValue::Json(j) => j.clone(),
            DatabaseValue::Array(arr) => JsonValue::Array(arr.iter().map(|v| v.to_json()).collect()),
        }
    }

    /// Create DatabaseValue from JSON value
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => DatabaseValue::Null,
            JsonValue::Bool(b) => DatabaseValue::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    DatabaseValue::Int64(i)
                } else if let Some(f) = n.as_f64() {
                    DatabaseValue::Float64(f)
                } else {
                    DatabaseValue::Null
                }
            }
            JsonValue::String(s) => DatabaseValue::String(s),
            JsonValue::Array(arr) => DatabaseValue::Array(arr.into_iter().map(DatabaseValue::from_json).collect()),
            JsonValue::Object(_) => DatabaseValue::Json(json),
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int32(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<&String> for DatabaseValue {
    fn from(value: &String) -> Self {
        DatabaseValue::String(value.clone())
    }
}

impl From<Vec<u8>> for DatabaseValue {
    fn from(value: Vec<u8>) -> Self {
        DatabaseValue::Bytes(value)
    }
}

impl From<uuid::Uuid> for DatabaseValue {
    fn from(value: uuid::Uuid) -> Self {
        DatabaseValue::Uuid(value)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for DatabaseValue {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl From<chrono::NaiveDate> for DatabaseValue {
    fn from(value: chrono::NaiveDate) -> Self {
        DatabaseValue::Date(value)
    }
}

impl From<chrono::NaiveTime> for DatabaseValue {
    fn from(value: chrono::NaiveTime) -> Self {
        DatabaseValue::Time(value)
    }
}

impl From<JsonValue> for DatabaseValue {
    fn from(value: JsonValue) -> Self {
        DatabaseValue::Json(value)
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_ignore_integer_width() {
        assert_eq!(DatabaseValue::Int32(7).as_key(), DatabaseValue::Int64(7).as_key());
        assert_eq!(DatabaseValue::Int64(7).as_key(), DatabaseValue::from("7").as_key());
        assert_eq!(DatabaseValue::Null.as_key(), None);
    }

    #[test]
    fn test_compare_follows_sql_semantics() {
        assert_eq!(DatabaseValue::Int32(1).compare(&DatabaseValue::Int64(2)), Some(Ordering::Less));
        assert_eq!(DatabaseValue::Float64(2.5).compare(&DatabaseValue::Int64(2)), Some(Ordering::Greater));
        assert_eq!(DatabaseValue::from("b").compare(&DatabaseValue::from("a")), Some(Ordering::Greater));
        assert_eq!(DatabaseValue::Null.compare(&DatabaseValue::Null), None);
        assert_eq!(DatabaseValue::Bool(true).compare(&DatabaseValue::from("x")), None);
    }

    #[test]
    fn test_attributes_helper() {
        let attrs = attributes([("name", DatabaseValue::from("Ada")), ("age", DatabaseValue::from(36))]);

        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs["age"], DatabaseValue::Int32(36));
    }

    #[test]
    fn test_option_conversion() {
        let none: Option<i64> = None;
        assert!(DatabaseValue::from(none).is_null());
        assert_eq!(DatabaseValue::from(Some(3_i64)), DatabaseValue::Int64(3));
    }
}
