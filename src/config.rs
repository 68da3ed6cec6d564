//! Configuration handling for shard-db.
//!
//! Two layers live here:
//! - `DbConfig`: the connection/shard/logger schema loaded from a JSON file and turned
//!   into validated `NodeDescriptor`s. All validation happens at load time.
//! - `Config`: CLI arguments and environment variables for the `shard-db` binary.

use crate::error::{DbError, DbResult};
use crate::models::{DEFAULT_CHARSET, DEFAULT_HOST, DEFAULT_PORT, NodeDescriptor, Value};
use clap::{ArgGroup, Parser};
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// A scalar config field: accepts a JSON string or number, stored as text.
fn scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|s| match s {
        Scalar::Text(v) => v,
        Scalar::Int(v) => v.to_string(),
        Scalar::Float(v) => v.to_string(),
        Scalar::Bool(v) => v.to_string(),
    }))
}

/// A logical (non-shard) connection entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionEntry {
    #[serde(default, deserialize_with = "scalar")]
    pub database: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub password: Option<String>,
    /// Default: 127.0.0.1
    #[serde(default, deserialize_with = "scalar")]
    pub host: Option<String>,
    /// Default: 3306
    #[serde(default, deserialize_with = "scalar")]
    pub port: Option<String>,
    /// Default: utf8mb4
    #[serde(default, deserialize_with = "scalar")]
    pub charset: Option<String>,
    #[serde(default)]
    pub options: Vec<i64>,
}

/// One node of a shard. Same shape as a connection entry, but host and port are required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShardNodeEntry {
    #[serde(default, deserialize_with = "scalar")]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub port: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub database: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub charset: Option<String>,
    #[serde(default)]
    pub options: Vec<i64>,
}

/// A key that must be present but may be `null`.
fn nullable<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)
}

/// Which log sink and channel name to attach. Both keys are required, either may be
/// `null`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggerConfig {
    #[serde(deserialize_with = "nullable")]
    pub id: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub channel: Option<String>,
}

/// Destination of CLI log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSink {
    Stdout,
    Stderr,
}

impl LoggerConfig {
    /// Sink named by `id`: `stdout`, otherwise stderr.
    ///
    /// Results are always printed to stdout, so with the `stdout` sink log lines
    /// interleave with the JSON rows. Keep the default when piping results.
    pub fn sink(&self) -> LogSink {
        match self.id.as_deref() {
            Some("stdout") => LogSink::Stdout,
            _ => LogSink::Stderr,
        }
    }
}

/// Root of the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DbConfig {
    #[serde(default)]
    pub connections: HashMap<String, ConnectionEntry>,
    #[serde(default)]
    pub shards: HashMap<String, Vec<ShardNodeEntry>>,
    #[serde(default)]
    pub logger: Option<LoggerConfig>,
}

impl DbConfig {
    /// Parse configuration from JSON text.
    pub fn from_json(json: &str) -> DbResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| DbError::configuration(format!("Invalid configuration: {e}")))
    }

    /// Read and parse a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DbError::configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }
}

impl ConnectionEntry {
    /// Apply defaults and validate into a descriptor.
    pub fn to_descriptor(&self, name: &str) -> DbResult<NodeDescriptor> {
        let context = format!("connection '{}'", name);
        build_descriptor(
            &context,
            Some(self.host.as_deref().unwrap_or(DEFAULT_HOST)),
            self.port.as_deref(),
            true,
            self.database.as_deref(),
            self.username.as_deref(),
            self.password.as_deref(),
            self.charset.as_deref(),
            &self.options,
        )
    }
}

impl ShardNodeEntry {
    pub fn to_descriptor(&self, shard: &str, index: usize) -> DbResult<NodeDescriptor> {
        let context = format!("shard '{}' node {}", shard, index);
        build_descriptor(
            &context,
            self.host.as_deref(),
            self.port.as_deref(),
            false,
            self.database.as_deref(),
            self.username.as_deref(),
            self.password.as_deref(),
            self.charset.as_deref(),
            &self.options,
        )
    }
}

#[allow(clippy::too_many_arguments)]
fn build_descriptor(
    context: &str,
    host: Option<&str>,
    port: Option<&str>,
    default_port: bool,
    database: Option<&str>,
    username: Option<&str>,
    password: Option<&str>,
    charset: Option<&str>,
    options: &[i64],
) -> DbResult<NodeDescriptor> {
    let port = match port {
        Some(p) => p
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                DbError::configuration(format!("{}: invalid port '{}'", context, p))
            })?,
        None if default_port => DEFAULT_PORT,
        None => return Err(missing(context, "port")),
    };

    let descriptor = NodeDescriptor {
        host: required(context, "host", host)?,
        port,
        database: required(context, "database", database)?,
        username: required(context, "username", username)?,
        password: required(context, "password", password)?,
        charset: required(context, "charset", Some(charset.unwrap_or(DEFAULT_CHARSET)))?,
        options: options.iter().copied().collect::<BTreeSet<_>>(),
    };
    Ok(descriptor)
}

fn required(context: &str, field: &str, value: Option<&str>) -> DbResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
        Some(_) => Err(DbError::configuration(format!(
            "{}: field '{}' cannot be empty",
            context, field
        ))),
        None => Err(missing(context, field)),
    }
}

fn missing(context: &str, field: &str) -> DbError {
    DbError::configuration(format!("{}: field '{}' is required", context, field))
}

/// Parse a `name=value` CLI parameter.
///
/// Values are typed loosely: `null`, `true`/`false`, integers and floats map to their
/// variants, anything else is a string. Quote with single quotes to force a string.
pub fn parse_param(s: &str) -> Result<(String, Value), String> {
    let (name, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid parameter '{}', expected name=value", s))?;
    let name = name.trim().trim_start_matches(':');
    if name.is_empty() {
        return Err(format!("Invalid parameter '{}', name is empty", s));
    }

    let value = if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        Value::String(raw[1..raw.len() - 1].to_string())
    } else if raw.eq_ignore_ascii_case("null") {
        Value::Null
    } else if raw.eq_ignore_ascii_case("true") {
        Value::Bool(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Value::Bool(false)
    } else if let Ok(v) = raw.parse::<i64>() {
        Value::Int(v)
    } else if let Ok(v) = raw.parse::<f64>() {
        Value::Float(v)
    } else {
        Value::String(raw.to_string())
    };
    Ok((name.to_string(), value))
}

/// Configuration for the `shard-db` CLI.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "shard-db",
    about = "Run a parameterized SQL statement against a configured connection or shard node",
    version,
    author
)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .args(["connection", "shard", "url"])
))]
pub struct Config {
    /// JSON file with connections, shards and logger settings
    #[arg(short, long, value_name = "FILE", env = "SHARD_DB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logical connection name from the config file
    #[arg(long, requires = "config")]
    pub connection: Option<String>,

    /// Shard name from the config file
    #[arg(long, requires = "config")]
    pub shard: Option<String>,

    /// Node index within the shard
    #[arg(long, default_value_t = 0)]
    pub node: usize,

    /// Run the statement on every node of the shard
    #[arg(long, requires = "shard")]
    pub all_nodes: bool,

    /// Ad-hoc connection URL (mysql://... or sqlite:...)
    #[arg(long, env = "SHARD_DB_URL")]
    pub url: Option<String>,

    /// SQL text with named :placeholders
    #[arg(short, long)]
    pub sql: String,

    /// Parameter as name=value. Can be specified multiple times.
    #[arg(short = 'p', long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, Value)>,

    /// Field transforms as JSON, e.g. '{"status": {"type": "enum", "values": ["a", "b"]}}'
    #[arg(long, value_name = "JSON")]
    pub fields: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "SHARD_DB_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "SHARD_DB_JSON_LOGS")]
    pub json_logs: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_defaults() {
        let config = DbConfig::from_json(
            r#"{"connections": {"main": {"database": "app", "username": "u", "password": "p"}}}"#,
        )
        .unwrap();
        let node = config.connections["main"].to_descriptor("main").unwrap();
        assert_eq!(node.host, "127.0.0.1");
        assert_eq!(node.port, 3306);
        assert_eq!(node.charset, "utf8mb4");
        assert!(node.options.is_empty());
    }

    #[test]
    fn test_numeric_scalars_accepted() {
        let config = DbConfig::from_json(
            r#"{"connections": {"main": {"database": "app", "username": "u", "password": 12345, "port": 3310}}}"#,
        )
        .unwrap();
        let node = config.connections["main"].to_descriptor("main").unwrap();
        assert_eq!(node.password, "12345");
        assert_eq!(node.port, 3310);
    }

    #[test]
    fn test_connection_missing_password() {
        let config = DbConfig::from_json(
            r#"{"connections": {"main": {"database": "app", "username": "u"}}}"#,
        )
        .unwrap();
        let err = config.connections["main"].to_descriptor("main").unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn test_connection_empty_charset_rejected() {
        let config = DbConfig::from_json(
            r#"{"connections": {"main": {"database": "app", "username": "u", "password": "p", "charset": ""}}}"#,
        )
        .unwrap();
        assert!(config.connections["main"].to_descriptor("main").is_err());
    }

    #[test]
    fn test_shard_node_requires_host_and_port() {
        let config = DbConfig::from_json(
            r#"{"shards": {"s1": [{"database": "d", "username": "u", "password": "p", "port": 3306}]}}"#,
        )
        .unwrap();
        let err = config.shards["s1"][0].to_descriptor("s1", 0).unwrap_err();
        assert!(err.to_string().contains("host"));

        let config = DbConfig::from_json(
            r#"{"shards": {"s1": [{"host": "h", "database": "d", "username": "u", "password": "p"}]}}"#,
        )
        .unwrap();
        let err = config.shards["s1"][0].to_descriptor("s1", 0).unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_invalid_port() {
        let config = DbConfig::from_json(
            r#"{"connections": {"main": {"database": "app", "username": "u", "password": "p", "port": "abc"}}}"#,
        )
        .unwrap();
        assert!(config.connections["main"].to_descriptor("main").is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(DbConfig::from_json(r#"{"connections": {"main": {"hostname": "x"}}}"#).is_err());
    }

    #[test]
    fn test_logger_section() {
        let config =
            DbConfig::from_json(r#"{"logger": {"id": "stderr", "channel": null}}"#).unwrap();
        let logger = config.logger.unwrap();
        assert_eq!(logger.id.as_deref(), Some("stderr"));
        assert!(logger.channel.is_none());
        assert_eq!(logger.sink(), LogSink::Stderr);
    }

    #[test]
    fn test_logger_keys_required() {
        for json in [
            r#"{"logger": {}}"#,
            r#"{"logger": {"id": "stdout"}}"#,
            r#"{"logger": {"channel": "db"}}"#,
        ] {
            assert!(
                matches!(DbConfig::from_json(json), Err(DbError::Configuration { .. })),
                "{json}"
            );
        }
        assert!(DbConfig::from_json(r#"{"logger": {"id": null, "channel": null}}"#).is_ok());
    }

    #[test]
    fn test_logger_sink() {
        let stdout = LoggerConfig {
            id: Some("stdout".to_string()),
            channel: None,
        };
        assert_eq!(stdout.sink(), LogSink::Stdout);
        assert_eq!(LoggerConfig::default().sink(), LogSink::Stderr);
    }

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("id=5").unwrap(), ("id".to_string(), Value::Int(5)));
        assert_eq!(parse_param(":x=1.5").unwrap(), ("x".to_string(), Value::Float(1.5)));
        assert_eq!(parse_param("n=null").unwrap().1, Value::Null);
        assert_eq!(parse_param("s='42'").unwrap().1, Value::from("42"));
        assert_eq!(parse_param("s=a=b").unwrap().1, Value::from("a=b"));
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=1").is_err());
    }

    #[test]
    fn test_cli_requires_target() {
        assert!(Config::try_parse_from(["shard-db", "--sql", "SELECT 1"]).is_err());

        let config = Config::try_parse_from([
            "shard-db",
            "--url",
            "sqlite::memory:",
            "--sql",
            "SELECT :a",
            "-p",
            "a=1",
        ])
        .unwrap();
        assert_eq!(config.params, vec![("a".to_string(), Value::Int(1))]);
    }

    #[test]
    fn test_all_nodes_requires_shard() {
        let result = Config::try_parse_from([
            "shard-db",
            "--url",
            "sqlite::memory:",
            "--sql",
            "SELECT 1",
            "--all-nodes",
        ]);
        assert!(result.is_err());
    }
}
