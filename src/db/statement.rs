//! Statement execution engine.
//!
//! A `Statement` binds one `Query` to one `Connection` and walks an explicit state
//! machine:
//!
//! ```text
//! Unprepared --execute--> Prepared --(driver ok)--> Executed --execute--> Executed ...
//!                              ^                        |
//!                              +------(driver error)----+
//! ```
//!
//! The handle is prepared on the first `execute` and reused for every later one.
//! Fetch operations read the cursor of the latest successful execution and are
//! rejected in any other state.

use super::driver::{Connection, PreparedHandle, ResultSet};
use super::quote::compile_sql;
use crate::error::{DbError, DbResult, DriverError};
use crate::models::{FromRow, Parameters, Query, Row, RowKey, Value};
use crate::transform::FieldMap;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, error};

enum State<H> {
    Unprepared,
    Prepared(H),
    Executed { handle: H, cursor: ResultSet },
}

impl<H> State<H> {
    fn name(&self) -> &'static str {
        match self {
            Self::Unprepared => "unprepared",
            Self::Prepared(_) => "prepared but not executed",
            Self::Executed { .. } => "executed",
        }
    }
}

/// A query bound to a connection, prepared at most once.
///
/// Not meant to be shared between tasks: every operation takes `&mut self`, and
/// concurrent callers should each build their own statement.
pub struct Statement<'c, C: Connection> {
    connection: &'c C,
    query: Query,
    state: State<C::Handle>,
    parameters: Parameters,
    fields: Option<FieldMap>,
}

impl<'c, C: Connection> Statement<'c, C> {
    pub fn new(connection: &'c C, query: Query) -> Self {
        Self {
            connection,
            query,
            state: State::Unprepared,
            parameters: Parameters::new(),
            fields: None,
        }
    }

    /// Route parameters and fetched rows through per-field transforms.
    pub fn with_fields(mut self, fields: FieldMap) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn connection(&self) -> &'c C {
        self.connection
    }

    /// Effective parameters of the last execute call.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn is_prepared(&self) -> bool {
        !matches!(self.state, State::Unprepared)
    }

    pub fn is_executed(&self) -> bool {
        matches!(self.state, State::Executed { .. })
    }

    /// Execute with `parameters` merged under the query's own parameters.
    ///
    /// Prepares the SQL on first use. Any driver failure is logged with a
    /// reconstructed SQL string and returned as `DbError::Execution`.
    pub async fn execute(&mut self, parameters: Parameters) -> DbResult<&mut Self> {
        let mut effective = self.query.merge(parameters);
        if let Some(fields) = &self.fields {
            effective = fields.to_store_parameters(effective)?;
        }

        let mut handle = match std::mem::replace(&mut self.state, State::Unprepared) {
            State::Unprepared => {
                debug!(
                    statement = %self.query.statement(),
                    dsn = %self.connection.dsn(),
                    parameters = %effective,
                    "Preparing a new SQL statement"
                );
                match self.connection.prepare(self.query.statement()).await {
                    Ok(handle) => handle,
                    Err(err) => return Err(self.fail(err, &effective)),
                }
            }
            State::Prepared(handle) | State::Executed { handle, .. } => {
                debug!(
                    parameters = %effective,
                    "Binding parameters to an existing prepared statement"
                );
                handle
            }
        };

        match handle.execute(&effective).await {
            Ok(cursor) => {
                self.state = State::Executed { handle, cursor };
                self.parameters = effective;
                Ok(self)
            }
            Err(err) => {
                self.state = State::Prepared(handle);
                let err = self.fail(err, &effective);
                self.parameters = effective;
                Err(err)
            }
        }
    }

    /// Log a driver failure with full context and wrap it.
    fn fail(&self, err: DriverError, parameters: &Parameters) -> DbError {
        let sql = compile_sql(
            self.query.statement(),
            self.connection.backend(),
            parameters,
            |v| self.connection.quote(v),
        );
        // `message` is reserved for the event text
        error!(
            code = %err.code,
            error_message = %err.message,
            dsn = %self.connection.dsn(),
            sql = %sql,
            "SQL execution failed"
        );
        DbError::execution(err)
    }

    fn cursor(&mut self, operation: &'static str) -> DbResult<&mut ResultSet> {
        match &mut self.state {
            State::Executed { cursor, .. } => Ok(cursor),
            other => Err(DbError::invalid_state(operation, other.name())),
        }
    }

    fn view(&self, row: Row) -> DbResult<Row> {
        match &self.fields {
            Some(fields) => fields.to_view_row(row),
            None => Ok(row),
        }
    }

    /// Next row as column name to value, or `None` once the cursor is exhausted.
    pub fn fetch_array(&mut self) -> DbResult<Option<Row>> {
        let row = self.cursor("fetch a row")?.fetch_row();
        row.map(|r| self.view(r)).transpose()
    }

    /// Next row hydrated into `T`, or `None` once the cursor is exhausted.
    pub fn fetch_object<T: FromRow>(&mut self) -> DbResult<Option<T>> {
        match self.fetch_array()? {
            Some(row) => T::from_row(&row).map(Some),
            None => Ok(None),
        }
    }

    /// Every remaining row hydrated into `T`.
    pub fn fetch_objects<T: FromRow>(&mut self) -> DbResult<Vec<T>> {
        self.fetch_arrays()?.iter().map(T::from_row).collect()
    }

    /// Every remaining row hydrated into `T`, keyed by the value of column `field`.
    ///
    /// When several rows share a key, the last one wins.
    pub fn fetch_objects_indexed<T: FromRow>(
        &mut self,
        field: &str,
    ) -> DbResult<BTreeMap<RowKey, T>> {
        let mut objects = BTreeMap::new();
        for row in self.fetch_arrays()? {
            let value = row.get(field).ok_or_else(|| {
                DbError::invalid_input(format!("Cannot index by '{}': no such column", field))
            })?;
            let key = RowKey::from_value(value).ok_or_else(|| {
                DbError::invalid_input(format!(
                    "Cannot index by '{}': {} values are not valid keys",
                    field,
                    value.type_name()
                ))
            })?;
            objects.insert(key, T::from_row(&row)?);
        }
        Ok(objects)
    }

    /// Every remaining row.
    pub fn fetch_arrays(&mut self) -> DbResult<Vec<Row>> {
        let rows = self.cursor("fetch rows")?.fetch_all();
        rows.into_iter().map(|r| self.view(r)).collect()
    }

    /// Column `index` of the next row, or `None` once the cursor is exhausted.
    ///
    /// An out-of-range index is rejected without consuming the row.
    pub fn fetch_column(&mut self, index: usize) -> DbResult<Option<Value>> {
        let cursor = self.cursor("fetch a column")?;
        match cursor.peek_width() {
            None => Ok(None),
            Some(width) if index >= width => Err(column_out_of_range(index, width)),
            Some(_) => {
                let row = cursor.fetch_row();
                let row = row.map(|r| self.view(r)).transpose()?;
                Ok(row.and_then(|r| r.into_values().into_iter().nth(index)))
            }
        }
    }

    /// Column `index` of every remaining row.
    pub fn fetch_columns(&mut self, index: usize) -> DbResult<Vec<Value>> {
        let cursor = self.cursor("fetch columns")?;
        if let Some(width) = cursor.peek_width() {
            if index >= width {
                return Err(column_out_of_range(index, width));
            }
        }
        let rows = cursor.fetch_all();
        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            let row = self.view(row)?;
            values.push(row.into_values().into_iter().nth(index).unwrap_or(Value::Null));
        }
        Ok(values)
    }

    /// Rows affected by the last execution.
    pub fn affected_rows(&mut self) -> DbResult<u64> {
        Ok(self.cursor("read the affected row count")?.rows_affected())
    }

    /// Column names of the last execution's result. Empty for statements that return
    /// no rows.
    pub fn columns(&mut self) -> DbResult<&[String]> {
        Ok(self.cursor("read the result columns")?.columns())
    }
}

impl<C: Connection> fmt::Debug for Statement<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("dsn", &self.connection.dsn())
            .field("query", &self.query.statement())
            .field("state", &self.state.name())
            .field("parameters", &self.parameters)
            .finish()
    }
}

fn column_out_of_range(index: usize, width: usize) -> DbError {
    DbError::invalid_input(format!(
        "Column index {} out of range (row has {} columns)",
        index, width
    ))
}
