//! Logical connection and shard resolution.
//!
//! All descriptors are validated when the resolver is built, so resolution itself
//! only fails for names or node indexes the configuration does not define.

use crate::config::DbConfig;
use crate::error::{DbError, DbResult};
use crate::models::NodeDescriptor;
use std::collections::HashMap;
use tracing::{debug, info};

/// Immutable map from logical names to validated node descriptors.
#[derive(Debug, Clone, Default)]
pub struct ShardResolver {
    connections: HashMap<String, NodeDescriptor>,
    shards: HashMap<String, Vec<NodeDescriptor>>,
}

impl ShardResolver {
    /// Validate every connection and shard node in `config`.
    pub fn from_config(config: &DbConfig) -> DbResult<Self> {
        let mut resolver = Self::default();

        for (name, entry) in &config.connections {
            resolver
                .connections
                .insert(name.clone(), entry.to_descriptor(name)?);
        }

        for (name, entries) in &config.shards {
            if entries.is_empty() {
                return Err(DbError::configuration(format!(
                    "shard '{}' has no nodes",
                    name
                )));
            }
            let nodes = entries
                .iter()
                .enumerate()
                .map(|(index, entry)| entry.to_descriptor(name, index))
                .collect::<DbResult<Vec<_>>>()?;
            resolver.shards.insert(name.clone(), nodes);
        }

        info!(
            connections = resolver.connections.len(),
            shards = resolver.shards.len(),
            "Loaded database configuration"
        );
        Ok(resolver)
    }

    /// Register a connection directly, validating it first.
    pub fn with_connection(
        mut self,
        name: impl Into<String>,
        node: NodeDescriptor,
    ) -> DbResult<Self> {
        node.validate()?;
        self.connections.insert(name.into(), node);
        Ok(self)
    }

    /// Register a shard directly, validating every node first.
    pub fn with_shard(
        mut self,
        name: impl Into<String>,
        nodes: Vec<NodeDescriptor>,
    ) -> DbResult<Self> {
        let name = name.into();
        if nodes.is_empty() {
            return Err(DbError::configuration(format!("shard '{}' has no nodes", name)));
        }
        for node in &nodes {
            node.validate()?;
        }
        self.shards.insert(name, nodes);
        Ok(self)
    }

    /// Descriptor of the logical connection `name`.
    pub fn resolve(&self, name: &str) -> DbResult<&NodeDescriptor> {
        let node = self.connections.get(name).ok_or_else(|| {
            DbError::configuration(format!("Unknown database connection '{}'", name))
        })?;
        debug!(connection = %name, dsn = %node.dsn(), "Resolved connection");
        Ok(node)
    }

    /// Descriptor of node `node` of shard `shard`.
    pub fn resolve_shard(&self, shard: &str, node: usize) -> DbResult<&NodeDescriptor> {
        let nodes = self.shard_nodes(shard)?;
        let descriptor = nodes.get(node).ok_or_else(|| {
            DbError::configuration(format!(
                "Shard '{}' has no node {} (it has {} node{})",
                shard,
                node,
                nodes.len(),
                if nodes.len() == 1 { "" } else { "s" }
            ))
        })?;
        debug!(shard = %shard, node, dsn = %descriptor.dsn(), "Resolved shard node");
        Ok(descriptor)
    }

    /// Every node of `shard`, in configuration order.
    pub fn shard_nodes(&self, shard: &str) -> DbResult<&[NodeDescriptor]> {
        self.shards
            .get(shard)
            .map(Vec::as_slice)
            .ok_or_else(|| DbError::configuration(format!("Unknown shard '{}'", shard)))
    }

    /// Sorted logical connection names.
    pub fn connection_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.connections.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Sorted shard names.
    pub fn shard_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.shards.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
