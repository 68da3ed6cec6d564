//! Query-related data models.
//!
//! A `Query` is finished SQL text with named `:placeholders` plus its own default
//! parameters. It is immutable once built; a `Statement` binds it to a connection.

use super::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::sync::Arc;

/// Named parameter set, keyed by placeholder name without the leading colon.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Parameters(BTreeMap<String, Value>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter. A leading `:` on the name is dropped, so `":id"` and `"id"`
    /// address the same placeholder.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(normalize_name(name.as_ref()), value.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(normalize_name(name).as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Overlay `other` onto `self`: keys present in `other` replace ours.
    pub fn overlay(mut self, other: &Parameters) -> Self {
        for (name, value) in other.iter() {
            self.0.insert(name.clone(), value.clone());
        }
        self
    }
}

fn normalize_name(name: &str) -> String {
    name.strip_prefix(':').unwrap_or(name).to_string()
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Parameters::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

impl IntoIterator for Parameters {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Parameters {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Renders as a JSON object, for log fields.
impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

/// Finished SQL text plus the parameters always merged into every execution.
#[derive(Debug, Clone)]
pub struct Query {
    statement: Arc<str>,
    parameters: Parameters,
}

impl Query {
    /// Create a query without default parameters.
    pub fn new(statement: impl Into<Arc<str>>) -> Self {
        Self {
            statement: statement.into(),
            parameters: Parameters::new(),
        }
    }

    /// Create a query whose `parameters` are pinned for every execution.
    pub fn with_parameters(statement: impl Into<Arc<str>>, parameters: Parameters) -> Self {
        Self {
            statement: statement.into(),
            parameters,
        }
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Effective parameters for one execution: the call parameters with the query's own
    /// parameters laid over them, so the query's values win on every shared key.
    pub fn merge(&self, call: Parameters) -> Parameters {
        call.overlay(&self.parameters)
    }
}

/// Two queries are interchangeable when their SQL text is identical.
impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.statement == other.statement
    }
}

impl Eq for Query {}

impl From<&str> for Query {
    fn from(statement: &str) -> Self {
        Self::new(statement)
    }
}

impl From<String> for Query {
    fn from(statement: String) -> Self {
        Self::new(statement)
    }
}
