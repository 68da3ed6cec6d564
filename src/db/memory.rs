//! In-memory scripted connection.
//!
//! Stands in for a real driver in tests: responses are queued up front, and every
//! prepare and execute call is recorded for later assertions.
//!
//! # Example
//! ```
//! use shard_db::db::{Connection, MemoryConnection, ResultSet};
//! use shard_db::models::{Query, Value};
//!
//! # tokio_test_block_on(async {
//! let conn = MemoryConnection::new("memory:users")
//!     .with_result(ResultSet::new(["id"]).row([Value::Int(1)]));
//! let mut stmt = conn.statement(Query::new("SELECT id FROM users"));
//! let ids = stmt.execute(Default::default()).await.unwrap().fetch_columns(0).unwrap();
//! assert_eq!(ids, vec![Value::Int(1)]);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use super::driver::{Connection, PreparedHandle, ResultSet};
use super::placeholder::placeholder_names;
use super::quote::quote_mysql;
use super::types::Backend;
use crate::error::DriverError;
use crate::models::{Parameters, Value};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A recorded execution for verification.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedExecution {
    pub sql: String,
    pub parameters: Parameters,
}

#[derive(Debug, Default)]
struct Script {
    responses: VecDeque<Result<ResultSet, DriverError>>,
    prepare_failures: VecDeque<DriverError>,
    prepared: Vec<String>,
    executions: Vec<RecordedExecution>,
}

/// Scripted connection. Responses are returned in FIFO order; once the queue is
/// empty every execution yields an empty result set.
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    dsn: String,
    script: Arc<Mutex<Script>>,
}

fn lock(script: &Mutex<Script>) -> MutexGuard<'_, Script> {
    script.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryConnection {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            script: Arc::new(Mutex::new(Script::default())),
        }
    }

    /// Queue a successful execution result.
    pub fn with_result(self, result: ResultSet) -> Self {
        lock(&self.script).responses.push_back(Ok(result));
        self
    }

    /// Queue a failing execution.
    pub fn with_failure(self, error: DriverError) -> Self {
        lock(&self.script).responses.push_back(Err(error));
        self
    }

    /// Make the next prepare call fail.
    pub fn with_prepare_failure(self, error: DriverError) -> Self {
        lock(&self.script).prepare_failures.push_back(error);
        self
    }

    /// Number of successful prepare calls.
    pub fn prepare_count(&self) -> usize {
        lock(&self.script).prepared.len()
    }

    /// SQL text of every successful prepare call.
    pub fn prepared(&self) -> Vec<String> {
        lock(&self.script).prepared.clone()
    }

    /// Every execution, including failed ones.
    pub fn executions(&self) -> Vec<RecordedExecution> {
        lock(&self.script).executions.clone()
    }

    pub fn last_execution(&self) -> Option<RecordedExecution> {
        lock(&self.script).executions.last().cloned()
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    type Handle = MemoryHandle;

    fn dsn(&self) -> &str {
        &self.dsn
    }

    fn backend(&self) -> Backend {
        Backend::MySql
    }

    async fn prepare(&self, sql: &str) -> Result<MemoryHandle, DriverError> {
        let mut script = lock(&self.script);
        if let Some(err) = script.prepare_failures.pop_front() {
            return Err(err);
        }
        script.prepared.push(sql.to_string());
        Ok(MemoryHandle {
            sql: sql.to_string(),
            placeholders: placeholder_names(sql, Backend::MySql)
                .into_iter()
                .map(String::from)
                .collect(),
            script: self.script.clone(),
        })
    }

    fn quote(&self, value: &Value) -> String {
        quote_mysql(value)
    }
}

/// Prepared handle of a `MemoryConnection`.
#[derive(Debug)]
pub struct MemoryHandle {
    sql: String,
    placeholders: Vec<String>,
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl PreparedHandle for MemoryHandle {
    async fn execute(&mut self, parameters: &Parameters) -> Result<ResultSet, DriverError> {
        let mut script = lock(&self.script);
        script.executions.push(RecordedExecution {
            sql: self.sql.clone(),
            parameters: parameters.clone(),
        });

        if let Some(name) = self.placeholders.iter().find(|n| !parameters.contains(n)) {
            return Err(DriverError::unbound_parameter(name));
        }
        script
            .responses
            .pop_front()
            .unwrap_or_else(|| Ok(ResultSet::default()))
    }
}
