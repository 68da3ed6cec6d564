//! Database access layer.
//!
//! This module provides:
//! - Shard and connection resolution to physical nodes
//! - Lazily built, cached connection objects per node
//! - The statement execution engine and its driver capability traits
//! - sqlx-backed MySQL and SQLite drivers plus an in-memory scripted driver
//! - Placeholder scanning, literal quoting and type mappings

pub mod driver;
#[macro_use]
pub mod macros;
pub mod memory;
pub mod mysql;
pub mod placeholder;
pub mod quote;
pub mod registry;
pub mod resolver;
pub mod sqlite;
pub mod statement;
pub mod types;

pub use driver::{Connection, PreparedHandle, ResultSet};
pub use memory::{MemoryConnection, RecordedExecution};
pub use mysql::{MySqlConnection, MySqlHandle};
pub use registry::{ConnectionFactory, ConnectionRegistry};
pub use resolver::ShardResolver;
pub use sqlite::{SqliteConnection, SqliteHandle};
pub use statement::Statement;
pub use types::Backend;
