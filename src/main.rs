//! shard-db - Main entry point.
//!
//! Runs one parameterized statement against a configured connection, a shard node,
//! every node of a shard, or an ad-hoc URL, and prints the result as JSON lines.

use clap::Parser;
use futures_util::future::try_join_all;
use shard_db::config::{Config, DbConfig, LogSink, LoggerConfig};
use shard_db::db::{
    Connection, ConnectionRegistry, MySqlConnection, ShardResolver, SqliteConnection,
};
use shard_db::error::{DbError, DbResult};
use shard_db::models::{NodeDescriptor, Parameters, Query, Row};
use shard_db::transform::{FieldMap, TransformRegistry};
use std::io::Write;
use tracing::{Instrument, error, info, info_span};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Channel name attached to log events when the config file names none.
const DEFAULT_CHANNEL: &str = "db";

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config, logger: &LoggerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // Results go to stdout; a stdout sink interleaves with them
    let writer = match logger.sink() {
        LogSink::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogSink::Stderr => BoxMakeWriter::new(std::io::stderr),
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json().with_writer(writer)).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_writer(writer))
            .init();
    }
}

/// Result of running the statement on one node.
enum Output {
    Rows(Vec<Row>),
    Affected(u64),
}

impl Output {
    fn print(&self, out: &mut impl Write) -> std::io::Result<()> {
        match self {
            Output::Rows(rows) => {
                for row in rows {
                    writeln!(out, "{}", serde_json::Value::Object(row.to_json_map()))?;
                }
            }
            Output::Affected(count) => writeln!(out, "{} row(s) affected", count)?,
        }
        Ok(())
    }
}

/// Execute once on `connection` and fetch everything.
async fn run<C: Connection>(
    connection: &C,
    query: Query,
    parameters: Parameters,
    fields: Option<FieldMap>,
) -> DbResult<Output> {
    let mut statement = connection.statement(query);
    if let Some(fields) = fields {
        statement = statement.with_fields(fields);
    }
    statement.execute(parameters).await?;

    if statement.columns()?.is_empty() {
        return Ok(Output::Affected(statement.affected_rows()?));
    }
    Ok(Output::Rows(statement.fetch_arrays()?))
}

async fn run_target(
    config: &Config,
    db_config: Option<&DbConfig>,
    query: Query,
    parameters: Parameters,
    fields: Option<FieldMap>,
) -> DbResult<Vec<Output>> {
    if let Some(url) = &config.url {
        let output = if url.starts_with("sqlite:") {
            let connection = SqliteConnection::from_url(url)?;
            run(&connection, query, parameters, fields).await?
        } else {
            let connection = MySqlConnection::new(NodeDescriptor::from_url(url)?);
            run(&connection, query, parameters, fields).await?
        };
        return Ok(vec![output]);
    }

    let db_config = db_config.ok_or_else(|| {
        DbError::configuration("--config is required with --connection or --shard")
    })?;
    let registry = ConnectionRegistry::mysql(ShardResolver::from_config(db_config)?);

    if let Some(name) = &config.connection {
        let connection = registry.connection(name).await?;
        return Ok(vec![run(&*connection, query, parameters, fields).await?]);
    }

    let shard = config.shard.as_deref().ok_or_else(|| {
        DbError::configuration("One of --connection, --shard or --url is required")
    })?;

    if !config.all_nodes {
        let connection = registry.shard(shard, config.node).await?;
        return Ok(vec![run(&*connection, query, parameters, fields).await?]);
    }

    let node_count = registry.resolver().shard_nodes(shard)?.len();
    info!(shard = %shard, nodes = node_count, "Running on every shard node");
    let connections =
        try_join_all((0..node_count).map(|node| registry.shard(shard, node))).await?;
    try_join_all(connections.iter().map(|connection| {
        run(
            connection.as_ref(),
            query.clone(),
            parameters.clone(),
            fields.clone(),
        )
    }))
    .await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    let db_config = config.config.as_ref().map(DbConfig::from_file).transpose()?;
    let logger = db_config
        .as_ref()
        .and_then(|c| c.logger.clone())
        .unwrap_or_default();

    // Initialize logging
    init_tracing(&config, &logger);

    let fields = match &config.fields {
        Some(json) => {
            let metadata: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)
                .map_err(|e| DbError::invalid_input(format!("Invalid --fields JSON: {}", e)))?;
            Some(TransformRegistry::with_builtins().field_map(&metadata)?)
        }
        None => None,
    };

    let parameters: Parameters = config.params.iter().cloned().collect();
    let query = Query::new(config.sql.as_str());

    let channel = logger.channel.as_deref().unwrap_or(DEFAULT_CHANNEL);
    let span = info_span!("shard_db", channel = %channel);

    let outputs = match run_target(&config, db_config.as_ref(), query, parameters, fields)
        .instrument(span)
        .await
    {
        Ok(outputs) => outputs,
        Err(e) => {
            error!(error = %e, "Statement failed");
            return Err(e.into());
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for output in &outputs {
        output.print(&mut out)?;
    }
    Ok(())
}
