//! Transform lookup by type name, and per-field transform maps.

use super::{Codec, FieldTransform, TransformConfig};
use crate::error::{DbError, DbResult};
use crate::models::{Parameters, Row, Value};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builds a transform from a field's metadata options.
pub type TransformFactory =
    Arc<dyn Fn(&TransformConfig) -> DbResult<FieldTransform> + Send + Sync>;

const BUILTIN_NAMES: &[&str] = &[
    "identity",
    "string",
    "int",
    "integer",
    "float",
    "double",
    "bool",
    "boolean",
    "json",
    "enum",
    "set",
    "timestamp",
    "datetime",
];

/// Maps type names found in field metadata to transform factories.
///
/// Names are case-insensitive. Registering a name that already exists replaces it,
/// so built-ins can be overridden.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    factories: HashMap<String, TransformFactory>,
}

impl TransformRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with every built-in transform.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for name in BUILTIN_NAMES {
            registry.register(name, move |config: &TransformConfig| {
                FieldTransform::from_metadata(name, config)
            });
        }
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(&TransformConfig) -> DbResult<FieldTransform> + Send + Sync + 'static,
    {
        self.factories
            .insert(name.to_ascii_lowercase(), Arc::new(factory));
        self
    }

    /// Register a codec that ignores metadata options.
    pub fn register_codec(&mut self, name: &str, codec: Arc<dyn Codec>) -> &mut Self {
        self.register(name, move |_: &TransformConfig| {
            Ok(FieldTransform::Custom(codec.clone()))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }

    /// Build the transform registered under `name`.
    pub fn build(&self, name: &str, config: &TransformConfig) -> DbResult<FieldTransform> {
        let factory = self
            .factories
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| DbError::configuration(format!("Unknown transform type '{}'", name)))?;
        factory(config)
    }

    /// Build a field map from field metadata.
    ///
    /// Each entry is either a bare type name or an object with a `type` key plus
    /// options:
    ///
    /// ```json
    /// {"age": "int", "status": {"type": "enum", "values": ["draft", "live"]}}
    /// ```
    pub fn field_map(&self, metadata: &serde_json::Map<String, JsonValue>) -> DbResult<FieldMap> {
        let mut fields = FieldMap::new();
        for (field, definition) in metadata {
            let transform = match definition {
                JsonValue::String(name) => self.build(name, &TransformConfig::new())?,
                JsonValue::Object(options) => {
                    let name = options.get("type").and_then(JsonValue::as_str).ok_or_else(|| {
                        DbError::configuration(format!(
                            "Field '{}' has no transform 'type'",
                            field
                        ))
                    })?;
                    let mut config = options.clone();
                    config.remove("type");
                    self.build(name, &config)?
                }
                other => {
                    return Err(DbError::configuration(format!(
                        "Field '{}' has an invalid transform definition: {}",
                        field, other
                    )));
                }
            };
            fields.insert(field, transform);
        }
        Ok(fields)
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("TransformRegistry")
            .field("types", &names)
            .finish()
    }
}

/// Field name to transform, applied to whole rows and parameter sets.
///
/// Fields without an entry pass through unchanged.
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    fields: HashMap<String, FieldTransform>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, transform: FieldTransform) -> Self {
        self.insert(field, transform);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, transform: FieldTransform) {
        self.fields.insert(field.into(), transform);
    }

    pub fn get(&self, field: &str) -> Option<&FieldTransform> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Convert a fetched row to domain values, column by column.
    pub fn to_view_row(&self, row: Row) -> DbResult<Row> {
        row.try_map(|column, value| self.to_view(column, value))
    }

    /// Convert domain parameters to stored values, parameter by parameter.
    pub fn to_store_parameters(&self, parameters: Parameters) -> DbResult<Parameters> {
        parameters
            .into_iter()
            .map(|(name, value)| {
                let value = self.to_store(&name, value)?;
                Ok((name, value))
            })
            .collect()
    }

    pub fn to_view(&self, field: &str, value: Value) -> DbResult<Value> {
        match self.fields.get(field) {
            Some(transform) => transform.transform_to_view(value),
            None => Ok(value),
        }
    }

    pub fn to_store(&self, field: &str, value: Value) -> DbResult<Value> {
        match self.fields.get(field) {
            Some(transform) => transform.transform_to_store(value),
            None => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Reverse;

    impl Codec for Reverse {
        fn to_view(&self, value: Value) -> DbResult<Value> {
            Ok(Value::String(value.to_string().chars().rev().collect()))
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = TransformRegistry::with_builtins();
        for name in BUILTIN_NAMES {
            assert!(registry.contains(name), "missing {}", name);
        }
        assert!(registry.contains("JSON"));
        assert!(registry.build("geometry", &TransformConfig::new()).is_err());
    }

    #[test]
    fn test_register_custom_codec() {
        let mut registry = TransformRegistry::with_builtins();
        registry.register_codec("reverse", Arc::new(Reverse));

        let transform = registry.build("reverse", &TransformConfig::new()).unwrap();
        assert_eq!(
            transform.transform_to_view(Value::from("abc")).unwrap(),
            Value::from("cba")
        );
    }

    #[test]
    fn test_field_map_from_metadata() {
        let registry = TransformRegistry::with_builtins();
        let metadata = json!({
            "age": "int",
            "status": {"type": "enum", "values": ["draft", "live"]}
        });
        let fields = registry
            .field_map(metadata.as_object().unwrap())
            .unwrap();
        assert_eq!(fields.len(), 2);
        assert!(matches!(fields.get("status"), Some(FieldTransform::Enum { .. })));

        let bad = json!({"status": {"values": ["a"]}});
        assert!(registry.field_map(bad.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_field_map_applies_to_rows_and_parameters() {
        let fields = FieldMap::new()
            .with("active", FieldTransform::Bool)
            .with("tags", FieldTransform::Set { values: None });

        let row = Row::new(
            Arc::from(vec!["id".to_string(), "active".to_string(), "tags".to_string()]),
            vec![Value::Int(1), Value::Int(1), Value::from("a,b")],
        );
        let view = fields.to_view_row(row).unwrap();
        assert_eq!(view.get("id"), Some(&Value::Int(1)));
        assert_eq!(view.get("active"), Some(&Value::Bool(true)));
        assert_eq!(view.get("tags"), Some(&Value::Json(json!(["a", "b"]))));

        let params = Parameters::new()
            .with("active", false)
            .with("tags", Value::Json(json!(["x"])))
            .with("other", "kept");
        let stored = fields.to_store_parameters(params).unwrap();
        assert_eq!(stored.get("active"), Some(&Value::Int(0)));
        assert_eq!(stored.get("tags"), Some(&Value::from("x")));
        assert_eq!(stored.get("other"), Some(&Value::from("kept")));
    }
}
