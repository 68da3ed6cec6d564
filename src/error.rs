//! Error types for shard-db.
//!
//! Two layers: `DriverError` carries exactly what the database driver reported
//! (SQLSTATE-style code plus message), `DbError` is the domain error every public
//! operation returns. Driver failures reach callers only as `DbError::Execution`,
//! which keeps the original `DriverError` as its source.

use thiserror::Error;

/// Failure reported by a database driver while preparing or executing SQL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("SQLSTATE[{code}]: {message}")]
pub struct DriverError {
    /// SQLSTATE-style code, e.g. "23000" for an integrity constraint violation
    pub code: String,
    pub message: String,
}

impl DriverError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Placeholder referenced by the SQL text has no bound value.
    pub fn unbound_parameter(name: &str) -> Self {
        Self::new(
            "HY093",
            format!("Invalid parameter number: parameter :{} was not defined", name),
        )
    }

    /// The session backing a prepared handle is gone.
    pub fn connection_closed() -> Self {
        Self::new("08003", "Connection does not exist")
    }
}

/// Convert sqlx errors to DriverError.
impl From<sqlx::Error> for DriverError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "HY000".to_string());
                DriverError::new(code, db_err.message())
            }
            sqlx::Error::RowNotFound => DriverError::new("02000", "No rows returned"),
            sqlx::Error::PoolTimedOut => DriverError::new("HYT00", "Timed out acquiring a connection"),
            sqlx::Error::PoolClosed => DriverError::connection_closed(),
            sqlx::Error::Io(io_err) => DriverError::new("08S01", format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => DriverError::new("08S01", format!("TLS error: {}", tls_err)),
            sqlx::Error::Protocol(msg) => {
                DriverError::new("08S01", format!("Protocol error: {}", msg))
            }
            sqlx::Error::Configuration(msg) => {
                DriverError::new("HY000", format!("Configuration error: {}", msg))
            }
            sqlx::Error::ColumnNotFound(col) => {
                DriverError::new("42S22", format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DriverError::new("HY000", format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                DriverError::new("HY000", format!("Decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => DriverError::new("HY000", "Database worker crashed"),
            _ => DriverError::new("HY000", format!("Unknown database error: {}", err)),
        }
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    /// Bad connection/shard configuration, or a resolution request it cannot satisfy.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("SQL execution failed: {source}")]
    Execution {
        #[source]
        source: DriverError,
    },

    #[error("Invalid statement state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Cannot decode column '{column}': {message}")]
    Decode { column: String, message: String },

    #[error("Transform '{transform}' failed: {message}")]
    Transform { transform: String, message: String },
}

impl DbError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wrap a driver failure.
    pub fn execution(source: DriverError) -> Self {
        Self::Execution { source }
    }

    pub fn invalid_state(operation: &'static str, state: &'static str) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    pub fn transform(transform: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transform {
            transform: transform.into(),
            message: message.into(),
        }
    }

    /// The wrapped driver error, for execution failures.
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::Execution { source } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::new("23000", "Duplicate entry '1' for key 'PRIMARY'");
        assert_eq!(
            err.to_string(),
            "SQLSTATE[23000]: Duplicate entry '1' for key 'PRIMARY'"
        );
    }

    #[test]
    fn test_execution_error_keeps_source() {
        let err = DbError::execution(DriverError::new("42000", "syntax error"));
        assert!(err.to_string().contains("SQLSTATE[42000]"));
        assert_eq!(err.driver_error().map(|e| e.code.as_str()), Some("42000"));

        let source = err.source().expect("source should be set");
        assert_eq!(source.to_string(), "SQLSTATE[42000]: syntax error");
    }

    #[test]
    fn test_non_execution_errors_have_no_driver_error() {
        assert!(DbError::configuration("missing host").driver_error().is_none());
        assert!(DbError::invalid_input("bad").driver_error().is_none());
    }

    #[test]
    fn test_unbound_parameter_code() {
        let err = DriverError::unbound_parameter("id");
        assert_eq!(err.code, "HY093");
        assert!(err.message.contains(":id"));
    }

    #[test]
    fn test_from_sqlx_row_not_found() {
        let err = DriverError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.code, "02000");
    }

    #[test]
    fn test_from_sqlx_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = DriverError::from(sqlx::Error::Io(io));
        assert_eq!(err.code, "08S01");
        assert!(err.message.contains("reset"));
    }
}
