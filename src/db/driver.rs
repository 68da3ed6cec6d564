//! Driver capability traits.
//!
//! The statement engine depends on nothing but these: a `Connection` that can
//! prepare SQL and quote literals, and a `PreparedHandle` that executes with a
//! parameter set and hands back a buffered `ResultSet`. Any backend providing them
//! can be substituted.

use crate::error::DriverError;
use crate::models::{Parameters, Query, Row, Value};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;

use super::statement::Statement;
use super::types::Backend;

/// An established (or lazily established) session to one physical node.
#[async_trait]
pub trait Connection: Send + Sync {
    type Handle: PreparedHandle;

    /// Credential-free identity of the node, used in diagnostics.
    fn dsn(&self) -> &str;

    /// SQL dialect, which decides how placeholders and literals are scanned.
    fn backend(&self) -> Backend;

    /// Compile SQL text into a reusable handle.
    async fn prepare(&self, sql: &str) -> Result<Self::Handle, DriverError>;

    /// Quote a value as a literal of this driver's dialect.
    fn quote(&self, value: &Value) -> String;

    /// Bind `query` to this connection.
    fn statement(&self, query: Query) -> Statement<'_, Self>
    where
        Self: Sized,
    {
        Statement::new(self, query)
    }
}

/// A driver-level compiled statement.
#[async_trait]
pub trait PreparedHandle: Send {
    /// Execute with the effective parameter set and buffer the result.
    async fn execute(&mut self, parameters: &Parameters) -> Result<ResultSet, DriverError>;
}

/// Buffered result of one execution, consumed front to back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Arc<[String]>,
    rows: VecDeque<Vec<Value>>,
    rows_affected: u64,
}

impl ResultSet {
    /// An empty result set with the given columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: VecDeque::new(),
            rows_affected: 0,
        }
    }

    /// Result of a statement that returns no rows.
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Self::default()
        }
    }

    /// Append a row (builder style).
    pub fn row<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_row(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_rows_affected(mut self, rows_affected: u64) -> Self {
        self.rows_affected = rows_affected;
        self
    }

    pub fn push_row(&mut self, values: Vec<Value>) {
        self.rows.push_back(values);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows not yet fetched.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Width of the next row, if any.
    pub fn peek_width(&self) -> Option<usize> {
        self.rows.front().map(Vec::len)
    }

    /// Take the next row.
    pub fn fetch_row(&mut self) -> Option<Row> {
        self.rows
            .pop_front()
            .map(|values| Row::new(self.columns.clone(), values))
    }

    /// Take every remaining row.
    pub fn fetch_all(&mut self) -> Vec<Row> {
        let columns = self.columns.clone();
        self.rows
            .drain(..)
            .map(|values| Row::new(columns.clone(), values))
            .collect()
    }
}
