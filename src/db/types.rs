//! Mappings between sqlx rows/arguments and `Value`.
//!
//! Decoding uses a two-phase approach:
//! 1. `TypeCategory` classifies a column type into a logical category
//! 2. Backend-specific decoders extract the value for that category
//!
//! Binding goes the other way: every `Value` variant maps to one sqlx-encodable type.

use crate::models::Value;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySql, MySqlArguments, MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};

/// SQL dialect a type name comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    MySql,
    SQLite,
}

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    DateTime,
    Date,
    Time,
    Null,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, backend: Backend) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is a storage affinity, not an exact type
        if backend == Backend::SQLite {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower == "json" {
        return TypeCategory::Json;
    }

    if lower.contains("blob") || lower.contains("binary") {
        return TypeCategory::Binary;
    }

    match lower.as_str() {
        "datetime" | "timestamp" => TypeCategory::DateTime,
        "date" => TypeCategory::Date,
        "time" => TypeCategory::Time,
        "null" => TypeCategory::Null,
        // varchar, text, char, enum, set, year, ...
        _ => TypeCategory::Text,
    }
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Row Decoding
// =============================================================================

/// Convert a backend row into values, in column order.
pub trait RowToValues {
    fn to_values(&self) -> Result<Vec<Value>, sqlx::Error>;
}

impl RowToValues for MySqlRow {
    fn to_values(&self) -> Result<Vec<Value>, sqlx::Error> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), Backend::MySql);
                mysql::decode_column(self, idx, category)
            })
            .collect()
    }
}

impl RowToValues for SqliteRow {
    fn to_values(&self) -> Result<Vec<Value>, sqlx::Error> {
        (0..self.len())
            .map(|idx| sqlite::decode_column(self, idx))
            .collect()
    }
}

fn json_from_text(text: &str) -> Value {
    match serde_json::from_str::<JsonValue>(text) {
        Ok(json) => Value::Json(json),
        Err(_) => Value::String(text.to_string()),
    }
}

fn bytes_to_text(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(s) => Value::String(s),
        Err(e) => Value::Bytes(e.into_bytes()),
    }
}

mod mysql {
    use super::*;

    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<Value, sqlx::Error> {
        if row.try_get_raw(idx)?.is_null() {
            return Ok(Value::Null);
        }
        match category {
            TypeCategory::Decimal => Ok(Value::String(row.try_get::<RawDecimal, _>(idx)?.0)),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => Ok(Value::Bool(row.try_get::<bool, _>(idx)?)),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => Ok(Value::Bytes(row.try_get::<Vec<u8>, _>(idx)?)),
            TypeCategory::Json => Ok(Value::Json(row.try_get::<JsonValue, _>(idx)?)),
            TypeCategory::DateTime => Ok(Value::DateTime(row.try_get::<NaiveDateTime, _>(idx)?)),
            TypeCategory::Date => Ok(Value::String(
                row.try_get::<NaiveDate, _>(idx)?.format("%Y-%m-%d").to_string(),
            )),
            TypeCategory::Time => Ok(Value::String(
                row.try_get::<NaiveTime, _>(idx)?.format("%H:%M:%S%.f").to_string(),
            )),
            TypeCategory::Text | TypeCategory::Null => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Result<Value, sqlx::Error> {
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Ok(Value::Int(v));
        }
        // Unsigned columns; values past i64::MAX keep their exact text
        let v = row.try_get::<u64, _>(idx)?;
        Ok(i64::try_from(v)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::String(v.to_string())))
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Result<Value, sqlx::Error> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Ok(Value::Float(v));
        }
        Ok(Value::Float(row.try_get::<f32, _>(idx)?.into()))
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> Result<Value, sqlx::Error> {
        match row.try_get::<String, _>(idx) {
            Ok(v) => Ok(Value::String(v)),
            // Text with a binary collation
            Err(_) => Ok(bytes_to_text(row.try_get::<Vec<u8>, _>(idx)?)),
        }
    }
}

mod sqlite {
    use super::*;

    /// SQLite is dynamically typed: decode by the storage class of the value, then
    /// refine with the declared column type where it matters.
    pub fn decode_column(row: &SqliteRow, idx: usize) -> Result<Value, sqlx::Error> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        let storage = raw.type_info().name().to_string();
        let declared = categorize_type(row.column(idx).type_info().name(), Backend::SQLite);

        match storage.as_str() {
            "INTEGER" => {
                let v = row.try_get::<i64, _>(idx)?;
                Ok(match declared {
                    TypeCategory::Boolean => Value::Bool(v != 0),
                    _ => Value::Int(v),
                })
            }
            "REAL" => Ok(Value::Float(row.try_get::<f64, _>(idx)?)),
            "BLOB" => Ok(Value::Bytes(row.try_get::<Vec<u8>, _>(idx)?)),
            _ => {
                let text = row.try_get::<String, _>(idx)?;
                Ok(match declared {
                    TypeCategory::Json => json_from_text(&text),
                    _ => Value::String(text),
                })
            }
        }
    }
}

// =============================================================================
// Parameter Binding
// =============================================================================

/// Bind a value to a MySQL query.
pub(crate) fn bind_mysql_value<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    value: Value,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(v),
        Value::Int(v) => query.bind(v),
        Value::Float(v) => query.bind(v),
        Value::String(v) => query.bind(v),
        Value::Bytes(v) => query.bind(v),
        Value::Json(v) => query.bind(sqlx::types::Json(v)),
        Value::DateTime(v) => query.bind(v),
    }
}

/// Bind a value to a SQLite query.
pub(crate) fn bind_sqlite_value<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    value: Value,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(v),
        Value::Int(v) => query.bind(v),
        Value::Float(v) => query.bind(v),
        Value::String(v) => query.bind(v),
        Value::Bytes(v) => query.bind(v),
        // SQLite doesn't have native JSON type, store as string
        Value::Json(v) => query.bind(v.to_string()),
        Value::DateTime(v) => query.bind(v.format(crate::models::DATETIME_FORMAT).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(
            categorize_type("INT", Backend::MySql),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("BIGINT UNSIGNED", Backend::MySql),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("TINYINT", Backend::MySql),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("INTEGER", Backend::SQLite),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("DECIMAL", Backend::MySql),
            TypeCategory::Decimal
        );
        // SQLite NUMERIC is a float
        assert_eq!(
            categorize_type("numeric", Backend::SQLite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_temporal_and_misc() {
        assert_eq!(
            categorize_type("DATETIME", Backend::MySql),
            TypeCategory::DateTime
        );
        assert_eq!(
            categorize_type("TIMESTAMP", Backend::MySql),
            TypeCategory::DateTime
        );
        assert_eq!(categorize_type("DATE", Backend::MySql), TypeCategory::Date);
        assert_eq!(categorize_type("BOOLEAN", Backend::MySql), TypeCategory::Boolean);
        assert_eq!(categorize_type("JSON", Backend::MySql), TypeCategory::Json);
        assert_eq!(categorize_type("VARBINARY", Backend::MySql), TypeCategory::Binary);
        assert_eq!(categorize_type("VARCHAR", Backend::MySql), TypeCategory::Text);
        assert_eq!(categorize_type("NULL", Backend::SQLite), TypeCategory::Null);
    }

    #[test]
    fn test_json_from_text() {
        assert_eq!(json_from_text("null"), Value::Json(JsonValue::Null));
        assert_eq!(json_from_text("[1]"), Value::Json(serde_json::json!([1])));
        assert_eq!(json_from_text("not json"), Value::from("not json"));
    }

    #[test]
    fn test_bytes_to_text() {
        assert_eq!(bytes_to_text(b"abc".to_vec()), Value::from("abc"));
        assert_eq!(
            bytes_to_text(vec![0xFF, 0x00]),
            Value::Bytes(vec![0xFF, 0x00])
        );
    }
}
