//! SQLite backend.
//!
//! Same lazy-session model as the MySQL backend, for local files and in-memory
//! databases. Literals are quoted the ANSI way.

use super::driver::{Connection, PreparedHandle, ResultSet};
use super::placeholder::to_positional;
use super::quote::quote_ansi;
use super::types::{Backend, RowToValues, bind_sqlite_value};
use crate::error::{DbError, DbResult, DriverError};
use crate::models::{Parameters, Value};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteStatement};
use sqlx::{Column, ConnectOptions, Executor};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

type Session = Arc<Mutex<Option<sqlx::SqliteConnection>>>;

/// Lazily connected SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteConnection {
    options: SqliteConnectOptions,
    dsn: String,
    session: Session,
}

impl SqliteConnection {
    /// Create a connection from a `sqlite:` URL, e.g. `sqlite::memory:` or
    /// `sqlite://data/app.db`. Missing database files are created on connect.
    pub fn from_url(url: &str) -> DbResult<Self> {
        if !url.starts_with("sqlite:") {
            return Err(DbError::configuration(format!(
                "Invalid SQLite connection string '{}': expected a sqlite: URL",
                url
            )));
        }
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| {
                DbError::configuration(format!("Invalid SQLite connection string: {}", e))
            })?
            .create_if_missing(true);
        let dsn = format!("sqlite:{}", options.get_filename().display());
        Ok(Self {
            options,
            dsn,
            session: Arc::new(Mutex::new(None)),
        })
    }

    /// Whether a session has been opened.
    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Close the session, if any. The next prepare opens a new one.
    pub async fn close(&self) -> Result<(), DriverError> {
        let session = self.session.lock().await.take();
        if let Some(conn) = session {
            info!(dsn = %self.dsn, "Closing database session");
            sqlx::Connection::close(conn).await?;
        }
        Ok(())
    }

    async fn connect(&self) -> Result<sqlx::SqliteConnection, DriverError> {
        info!(dsn = %self.dsn, "Opening database session");
        let conn = self.options.connect().await?;
        info!(dsn = %self.dsn, "Connected successfully");
        Ok(conn)
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    type Handle = SqliteHandle;

    fn dsn(&self) -> &str {
        &self.dsn
    }

    fn backend(&self) -> Backend {
        Backend::SQLite
    }

    async fn prepare(&self, sql: &str) -> Result<SqliteHandle, DriverError> {
        let (positional, names) = to_positional(sql, Backend::SQLite);

        let mut session = self.session.lock().await;
        if session.is_none() {
            *session = Some(self.connect().await?);
        }
        let conn = session.as_mut().ok_or_else(DriverError::connection_closed)?;

        let statement = conn.prepare(positional.as_str()).await?;
        debug!(dsn = %self.dsn, placeholders = names.len(), "Statement prepared");

        Ok(SqliteHandle {
            statement: sqlx::Statement::to_owned(&statement),
            names,
            session: self.session.clone(),
        })
    }

    fn quote(&self, value: &Value) -> String {
        quote_ansi(value)
    }
}

/// Prepared statement on a `SqliteConnection` session.
#[derive(Debug)]
pub struct SqliteHandle {
    statement: SqliteStatement<'static>,
    /// Placeholder name bound to each `?`, in order
    names: Vec<String>,
    session: Session,
}

#[async_trait]
impl PreparedHandle for SqliteHandle {
    async fn execute(&mut self, parameters: &Parameters) -> Result<ResultSet, DriverError> {
        let mut query = sqlx::Statement::query(&self.statement);
        for name in &self.names {
            let value = parameters
                .get(name)
                .ok_or_else(|| DriverError::unbound_parameter(name))?;
            query = bind_sqlite_value(query, value.clone());
        }

        let mut session = self.session.lock().await;
        let conn = session.as_mut().ok_or_else(DriverError::connection_closed)?;

        let columns = sqlx::Statement::columns(&self.statement);
        if columns.is_empty() {
            let done = conn.execute(query).await?;
            return Ok(ResultSet::affected(done.rows_affected()));
        }

        let rows = conn.fetch_all(query).await?;
        let mut result = ResultSet::new(columns.iter().map(|c| c.name().to_string()));
        for row in &rows {
            result.push_row(row.to_values()?);
        }
        Ok(result.with_rows_affected(rows.len() as u64))
    }
}
