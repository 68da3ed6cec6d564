//! Type transforms between stored and domain field values.
//!
//! A `FieldTransform` converts one field in two directions: `transform_to_view` turns a
//! value read from the database into its domain form, `transform_to_store` turns a
//! domain value back into what is written. Null passes through both directions
//! untouched, whatever the transform.
//!
//! Transforms are picked by type name from field metadata. The built-in names are
//! listed on [`FieldTransform::from_metadata`]; custom ones go through a
//! [`TransformRegistry`].

mod builtin;
mod registry;

pub use registry::{FieldMap, TransformFactory, TransformRegistry};

use crate::error::{DbError, DbResult};
use crate::models::{DATETIME_FORMAT, Value};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// Options attached to a field's type metadata, e.g. `{"values": ["a", "b"]}`.
pub type TransformConfig = serde_json::Map<String, JsonValue>;

/// A user-supplied conversion. Both directions default to identity.
///
/// Codecs are only ever handed non-null values.
pub trait Codec: Send + Sync + fmt::Debug {
    fn to_view(&self, value: Value) -> DbResult<Value> {
        Ok(value)
    }

    fn to_store(&self, value: Value) -> DbResult<Value> {
        Ok(value)
    }
}

/// How one field is converted.
#[derive(Debug, Clone)]
pub enum FieldTransform {
    Identity,
    /// Integer, stored as an integer or numeric text
    Int,
    Float {
        /// Decimal places kept in both directions
        precision: Option<u32>,
    },
    /// Stored as 0/1
    Bool,
    /// Stored as JSON text
    Json,
    /// Stored as the 0-based index into `values`
    Enum { values: Vec<String> },
    /// Stored as a comma-separated list, exposed as a JSON array of strings
    Set { values: Option<Vec<String>> },
    /// Stored as text in `format`
    Timestamp { format: String },
    Custom(Arc<dyn Codec>),
}

impl FieldTransform {
    /// Build a built-in transform from a type name and its options.
    ///
    /// | type name | options |
    /// |-----------|---------|
    /// | `identity`, `string` | none |
    /// | `int`, `integer` | none |
    /// | `float`, `double` | `precision` (optional) |
    /// | `bool`, `boolean` | none |
    /// | `json` | none |
    /// | `enum` | `values` (required, non-empty) |
    /// | `set` | `values` (optional) |
    /// | `timestamp`, `datetime` | `format` (optional, chrono syntax) |
    pub fn from_metadata(type_name: &str, config: &TransformConfig) -> DbResult<Self> {
        let transform = match type_name.to_ascii_lowercase().as_str() {
            "identity" | "string" => Self::Identity,
            "int" | "integer" => Self::Int,
            "float" | "double" => Self::Float {
                precision: precision_option(config)?,
            },
            "bool" | "boolean" => Self::Bool,
            "json" => Self::Json,
            "enum" => {
                let values = members_option(type_name, config)?.unwrap_or_default();
                if values.is_empty() {
                    return Err(DbError::configuration(
                        "Transform 'enum' requires a non-empty 'values' list",
                    ));
                }
                Self::Enum { values }
            }
            "set" => Self::Set {
                values: members_option(type_name, config)?,
            },
            "timestamp" | "datetime" => Self::Timestamp {
                format: format_option(config)?,
            },
            other => {
                return Err(DbError::configuration(format!(
                    "Unknown transform type '{}'",
                    other
                )));
            }
        };
        Ok(transform)
    }

    /// Name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Int => "int",
            Self::Float { .. } => "float",
            Self::Bool => "bool",
            Self::Json => "json",
            Self::Enum { .. } => "enum",
            Self::Set { .. } => "set",
            Self::Timestamp { .. } => "timestamp",
            Self::Custom(_) => "custom",
        }
    }

    /// Stored value to domain value.
    pub fn transform_to_view(&self, value: Value) -> DbResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let converted = match self {
            Self::Identity => Ok(value),
            Self::Int => builtin::int_to_view(value),
            Self::Float { precision } => builtin::float_to_view(value, *precision),
            Self::Bool => builtin::bool_to_view(value),
            Self::Json => builtin::json_to_view(value),
            Self::Enum { values } => builtin::enum_to_view(value, values),
            Self::Set { values } => builtin::set_to_view(value, values.as_deref()),
            Self::Timestamp { format } => builtin::timestamp_to_view(value, format),
            Self::Custom(codec) => return codec.to_view(value),
        };
        converted.map_err(|message| DbError::transform(self.name(), message))
    }

    /// Domain value to stored value.
    pub fn transform_to_store(&self, value: Value) -> DbResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let converted = match self {
            Self::Identity => Ok(value),
            Self::Int => builtin::int_to_store(value),
            Self::Float { precision } => builtin::float_to_store(value, *precision),
            Self::Bool => builtin::bool_to_store(value),
            Self::Json => builtin::json_to_store(value),
            Self::Enum { values } => builtin::enum_to_store(value, values),
            Self::Set { values } => builtin::set_to_store(value, values.as_deref()),
            Self::Timestamp { format } => builtin::timestamp_to_store(value, format),
            Self::Custom(codec) => return codec.to_store(value),
        };
        converted.map_err(|message| DbError::transform(self.name(), message))
    }
}

impl<C: Codec + 'static> From<Arc<C>> for FieldTransform {
    fn from(codec: Arc<C>) -> Self {
        Self::Custom(codec)
    }
}

fn precision_option(config: &TransformConfig) -> DbResult<Option<u32>> {
    match config.get("precision") {
        None | Some(JsonValue::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|p| u32::try_from(p).ok())
            .filter(|p| *p <= 15)
            .map(Some)
            .ok_or_else(|| {
                DbError::configuration(format!(
                    "Transform 'float' option 'precision' must be an integer in 0..=15, got {}",
                    v
                ))
            }),
    }
}

fn members_option(type_name: &str, config: &TransformConfig) -> DbResult<Option<Vec<String>>> {
    let invalid = || {
        DbError::configuration(format!(
            "Transform '{}' option 'values' must be a list of strings",
            type_name
        ))
    };
    match config.get("values") {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
            .collect::<DbResult<Vec<_>>>()
            .map(Some),
        Some(_) => Err(invalid()),
    }
}

fn format_option(config: &TransformConfig) -> DbResult<String> {
    match config.get("format") {
        None | Some(JsonValue::Null) => Ok(DATETIME_FORMAT.to_string()),
        Some(JsonValue::String(format)) if !format.is_empty() => Ok(format.clone()),
        Some(other) => Err(DbError::configuration(format!(
            "Transform 'timestamp' option 'format' must be a non-empty string, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: JsonValue) -> TransformConfig {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("config must be an object"),
        }
    }

    #[derive(Debug)]
    struct Upper;

    impl Codec for Upper {
        fn to_view(&self, value: Value) -> DbResult<Value> {
            Ok(Value::String(value.to_string().to_uppercase()))
        }
    }

    #[test]
    fn test_from_metadata_builtins() {
        let empty = TransformConfig::new();
        assert!(matches!(
            FieldTransform::from_metadata("INTEGER", &empty),
            Ok(FieldTransform::Int)
        ));
        assert!(matches!(
            FieldTransform::from_metadata("float", &config(json!({"precision": 2}))),
            Ok(FieldTransform::Float { precision: Some(2) })
        ));
        assert!(matches!(
            FieldTransform::from_metadata("timestamp", &empty),
            Ok(FieldTransform::Timestamp { format }) if format == DATETIME_FORMAT
        ));
    }

    #[test]
    fn test_from_metadata_rejects_bad_options() {
        let empty = TransformConfig::new();
        assert!(FieldTransform::from_metadata("enum", &empty).is_err());
        assert!(FieldTransform::from_metadata("set", &config(json!({"values": "a,b"}))).is_err());
        assert!(FieldTransform::from_metadata("float", &config(json!({"precision": -1}))).is_err());
        assert!(matches!(
            FieldTransform::from_metadata("uuid", &empty),
            Err(DbError::Configuration { .. })
        ));
    }

    #[test]
    fn test_null_passes_through_custom_codec() {
        let transform = FieldTransform::from(Arc::new(Upper));
        assert_eq!(transform.transform_to_view(Value::Null).unwrap(), Value::Null);
        assert_eq!(
            transform.transform_to_view(Value::from("abc")).unwrap(),
            Value::from("ABC")
        );
        // Default store direction is identity
        assert_eq!(
            transform.transform_to_store(Value::from("abc")).unwrap(),
            Value::from("abc")
        );
    }

    #[test]
    fn test_errors_name_the_transform() {
        let err = FieldTransform::Int
            .transform_to_view(Value::from("twelve"))
            .unwrap_err();
        assert!(matches!(&err, DbError::Transform { transform, .. } if transform == "int"));
    }
}
