//! Fetched rows and the capabilities used to hydrate them into caller types.

use super::value::Value;
use crate::error::{DbError, DbResult};
use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// One fetched row: column names shared across the result set, plus values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the named column. When several columns share a name the last one
    /// wins, as in an associative fetch.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .rposition(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }

    pub fn get_index(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Decode the named column into `T`.
    pub fn try_get<T: FromValue>(&self, column: &str) -> DbResult<T> {
        let value = self
            .get(column)
            .ok_or_else(|| DbError::decode(column, "no such column"))?;
        T::from_value(value.clone()).map_err(|message| DbError::decode(column, message))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Rebuild the row with every value passed through `f` along with its column name.
    pub fn try_map<F>(self, mut f: F) -> DbResult<Row>
    where
        F: FnMut(&str, Value) -> DbResult<Value>,
    {
        let values = self
            .columns
            .iter()
            .zip(self.values)
            .map(|(name, value)| f(name, value))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(Row::new(self.columns, values))
    }

    /// Column name to JSON value map, for output.
    pub fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
        self.iter()
            .map(|(name, value)| (name.to_string(), value.to_json()))
            .collect()
    }
}

/// Key of an indexed object fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowKey {
    Int(i64),
    Text(String),
}

impl RowKey {
    /// Derive a key from a column value. Null, float and JSON values cannot be keys.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(Self::Int(*v)),
            Value::Bool(v) => Some(Self::Int(i64::from(*v))),
            Value::String(v) => Some(Self::Text(v.clone())),
            Value::Bytes(v) => Some(Self::Text(String::from_utf8_lossy(v).into_owned())),
            Value::DateTime(_) => Some(Self::Text(value.to_string())),
            Value::Null | Value::Float(_) | Value::Json(_) => None,
        }
    }
}

impl From<i64> for RowKey {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for RowKey {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Typed extraction of a single column value.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, String>;
}

fn mismatch(expected: &str, value: &Value) -> String {
    format!("expected {}, found {}", expected, value.type_name())
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, String> {
        Ok(value)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Int(v) => Ok(v),
            Value::Bool(v) => Ok(i64::from(v)),
            Value::String(ref s) => s.trim().parse().map_err(|_| mismatch("int", &value)),
            other => Err(mismatch("int", &other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, String> {
        let v = i64::from_value(value)?;
        i32::try_from(v).map_err(|_| format!("{} out of range for i32", v))
    }
}

impl FromValue for u64 {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            // Values above i64::MAX arrive as text
            Value::String(ref s) => s.trim().parse().map_err(|_| mismatch("unsigned int", &value)),
            other => {
                let v = i64::from_value(other)?;
                u64::try_from(v).map_err(|_| format!("{} out of range for u64", v))
            }
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            Value::String(ref s) => s.trim().parse().map_err(|_| mismatch("float", &value)),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Bool(v) => Ok(v),
            Value::Int(v) => Ok(v != 0),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::String(v) => Ok(v),
            Value::Bytes(v) => String::from_utf8(v).map_err(|e| e.to_string()),
            Value::Null => Err(mismatch("string", &Value::Null)),
            other => Ok(other.to_string()),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Bytes(v) => Ok(v),
            Value::String(v) => Ok(v.into_bytes()),
            other => Err(mismatch("bytes", &other)),
        }
    }
}

impl FromValue for JsonValue {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Json(v) => Ok(v),
            Value::String(ref s) => serde_json::from_str(s).map_err(|e| e.to_string()),
            Value::Null => Err(mismatch("json", &Value::Null)),
            other => Ok(other.to_json()),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::DateTime(v) => Ok(v),
            Value::String(ref s) => NaiveDateTime::parse_from_str(s, super::value::DATETIME_FORMAT)
                .map_err(|e| e.to_string()),
            other => Err(mismatch("datetime", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Hydrate a caller type from a fetched row.
///
/// This is the typed replacement for assigning columns to like-named properties:
/// implementors read the columns they need via [`Row::try_get`].
///
/// ```ignore
/// struct User { id: i64, name: String }
///
/// impl FromRow for User {
///     fn from_row(row: &Row) -> DbResult<Self> {
///         Ok(Self { id: row.try_get("id")?, name: row.try_get("name")? })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> DbResult<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> DbResult<Self> {
        Ok(row.clone())
    }
}

impl FromRow for serde_json::Map<String, JsonValue> {
    fn from_row(row: &Row) -> DbResult<Self> {
        Ok(row.to_json_map())
    }
}
