//! Data models for shard-db.
//!
//! This module re-exports all model types used throughout the crate.

pub mod node;
pub mod query;
pub mod row;
pub mod value;

// Re-export commonly used types
pub use node::{DEFAULT_CHARSET, DEFAULT_HOST, DEFAULT_PORT, NodeDescriptor};
pub use query::{Parameters, Query};
pub use row::{FromRow, FromValue, Row, RowKey};
pub use value::{DATETIME_FORMAT, Value};
