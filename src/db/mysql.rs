//! MySQL backend.
//!
//! One `MySqlConnection` owns at most one sqlx session to its node. The session is
//! opened by the first `prepare` and shared by every handle prepared from it; it is
//! never reopened behind the caller's back.

use super::driver::{Connection, PreparedHandle, ResultSet};
use super::placeholder::to_positional;
use super::quote::quote_mysql;
use super::types::{Backend, RowToValues, bind_mysql_value};
use crate::error::DriverError;
use crate::models::{NodeDescriptor, Parameters, Value};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlStatement};
use sqlx::{Column, ConnectOptions, Executor};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Disable sqlx's per-session prepared statement cache.
pub const OPTION_NO_STATEMENT_CACHE: i64 = 1;
/// Do not add `PIPES_AS_CONCAT` to the session `sql_mode`.
pub const OPTION_NO_PIPES_AS_CONCAT: i64 = 2;
/// Do not add `NO_ENGINE_SUBSTITUTION` to the session `sql_mode`.
pub const OPTION_ENGINE_SUBSTITUTION: i64 = 3;
/// Leave the session time zone as configured on the server.
pub const OPTION_SERVER_TIMEZONE: i64 = 4;

type Session = Arc<Mutex<Option<sqlx::MySqlConnection>>>;

/// Lazily connected MySQL node.
#[derive(Debug, Clone)]
pub struct MySqlConnection {
    node: NodeDescriptor,
    dsn: String,
    session: Session,
}

impl MySqlConnection {
    /// Create a connection to `node`. Nothing is opened until the first prepare.
    pub fn new(node: NodeDescriptor) -> Self {
        let dsn = node.dsn();
        Self {
            node,
            dsn,
            session: Arc::new(Mutex::new(None)),
        }
    }

    pub fn node(&self) -> &NodeDescriptor {
        &self.node
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

    fn connect_options(&self) -> MySqlConnectOptions {
        let node = &self.node;
        let mut options = MySqlConnectOptions::new()
            .host(&node.host)
            .port(node.port)
            .database(&node.database)
            .username(&node.username)
            .password(&node.password)
            .charset(&node.charset);

        for flag in &node.options {
            options = match *flag {
                OPTION_NO_STATEMENT_CACHE => options.statement_cache_capacity(0),
                OPTION_NO_PIPES_AS_CONCAT => options.pipes_as_concat(false),
                OPTION_ENGINE_SUBSTITUTION => options.no_engine_substitution(false),
                OPTION_SERVER_TIMEZONE => options.timezone(None::<String>),
                other => {
                    warn!(dsn = %self.dsn, option = other, "Ignoring unknown connection option");
                    options
                }
            };
        }
        options
    }

    async fn connect(&self) -> Result<sqlx::MySqlConnection, DriverError> {
        info!(dsn = %self.dsn, "Opening database session");
        let conn = self.connect_options().connect().await?;
        info!(dsn = %self.dsn, "Connected successfully");
        Ok(conn)
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    type Handle = MySqlHandle;

    fn dsn(&self) -> &str {
        &self.dsn
    }

    fn backend(&self) -> Backend {
        Backend::MySql
    }

    async fn prepare(&self, sql: &str) -> Result<MySqlHandle, DriverError> {
        let (positional, names) = to_positional(sql, Backend::MySql);

        let mut session = self.session.lock().await;
        if session.is_none() {
            *session = Some(self.connect().await?);
        }
        let conn = session.as_mut().ok_or_else(DriverError::connection_closed)?;

        let statement = conn.prepare(positional.as_str()).await?;
        debug!(dsn = %self.dsn, placeholders = names.len(), "Statement prepared");

        Ok(MySqlHandle {
            statement: sqlx::Statement::to_owned(&statement),
            names,
            session: self.session.clone(),
        })
    }

    fn quote(&self, value: &Value) -> String {
        quote_mysql(value)
    }
}

/// Server-side prepared statement on a `MySqlConnection` session.
#[derive(Debug)]
pub struct MySqlHandle {
    statement: MySqlStatement<'static>,
    /// Placeholder name bound to each `?`, in order
    names: Vec<String>,
    session: Session,
}

#[async_trait]
impl PreparedHandle for MySqlHandle {
    async fn execute(&mut self, parameters: &Parameters) -> Result<ResultSet, DriverError> {
        let mut query = sqlx::Statement::query(&self.statement);
        for name in &self.names {
            let value = parameters
                .get(name)
                .ok_or_else(|| DriverError::unbound_parameter(name))?;
            query = bind_mysql_value(query, value.clone());
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

#[cfg(test)]
mod tests {
    use super::*;

    fn node(options: &[i64]) -> NodeDescriptor {
        NodeDescriptor::new("db.internal", 3307, "app", "svc", "secret")
            .unwrap()
            .with_options(options.iter().copied())
    }

    #[test]
    fn test_dsn_has_no_credentials() {
        let conn = MySqlConnection::new(node(&[]));
        assert_eq!(
            conn.dsn(),
            "mysql:host=db.internal;port=3307;dbname=app;charset=utf8mb4"
        );
        assert!(!conn.dsn().contains("secret"));
    }

    #[test]
    fn test_connect_options_accept_known_and_unknown_flags() {
        let conn = MySqlConnection::new(node(&[
            OPTION_NO_STATEMENT_CACHE,
            OPTION_NO_PIPES_AS_CONCAT,
            OPTION_ENGINE_SUBSTITUTION,
            OPTION_SERVER_TIMEZONE,
            1002,
        ]));
        let options = conn.connect_options();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 3307);
        assert_eq!(options.get_database(), Some("app"));
        assert_eq!(options.get_username(), "svc");
        assert_eq!(options.get_charset(), "utf8mb4");
    }

    #[test]
    fn test_quote_uses_backslash_escapes() {
        let conn = MySqlConnection::new(node(&[]));
        assert_eq!(conn.quote(&Value::from("a'b")), r"'a\'b'");
    }

    #[tokio::test]
    async fn test_not_connected_until_prepare() {
        let conn = MySqlConnection::new(node(&[]));
        assert!(!conn.is_connected().await);
        conn.close().await.unwrap();
    }
}
