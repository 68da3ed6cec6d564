//! shard-db library
//!
//! A data-access layer for sharded SQL databases: logical connection and shard
//! resolution, prepare-once statement execution with merged named parameters, and
//! field-level transforms between stored and domain values.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod transform;

pub use config::{Config, DbConfig};
pub use db::{Connection, ConnectionRegistry, ShardResolver, Statement};
pub use error::{DbError, DbResult, DriverError};
pub use models::{Parameters, Query, Row, Value};
pub use transform::{FieldMap, FieldTransform, TransformRegistry};
