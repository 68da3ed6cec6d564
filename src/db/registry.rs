//! Lazily built, cached connection objects per logical connection and shard node.
//!
//! The registry never opens sessions itself: it only builds connection objects
//! through its factory, and those connect on first use.

use super::mysql::MySqlConnection;
use super::resolver::ShardResolver;
use crate::error::DbResult;
use crate::models::NodeDescriptor;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Builds a connection object for one node.
pub type ConnectionFactory<C> = Arc<dyn Fn(&NodeDescriptor) -> DbResult<C> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    Connection(String),
    Shard(String, usize),
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Connection(name) => write!(f, "{}", name),
            NodeKey::Shard(shard, node) => write!(f, "{}[{}]", shard, node),
        }
    }
}

/// One shared connection object per logical connection or shard node.
pub struct ConnectionRegistry<C> {
    resolver: Arc<ShardResolver>,
    factory: ConnectionFactory<C>,
    connections: Arc<RwLock<HashMap<NodeKey, Arc<C>>>>,
}

impl<C> Clone for ConnectionRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
            factory: Arc::clone(&self.factory),
            connections: Arc::clone(&self.connections),
        }
    }
}

impl<C> fmt::Debug for ConnectionRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl ConnectionRegistry<MySqlConnection> {
    /// Registry of lazily connected MySQL nodes.
    pub fn mysql(resolver: ShardResolver) -> Self {
        Self::new(resolver, |node| Ok(MySqlConnection::new(node.clone())))
    }
}

impl<C> ConnectionRegistry<C> {
    pub fn new<F>(resolver: ShardResolver, factory: F) -> Self
    where
        F: Fn(&NodeDescriptor) -> DbResult<C> + Send + Sync + 'static,
    {
        Self {
            resolver: Arc::new(resolver),
            factory: Arc::new(factory),
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn resolver(&self) -> &ShardResolver {
        &self.resolver
    }

    /// Connection object for the logical connection `name`.
    pub async fn connection(&self, name: &str) -> DbResult<Arc<C>> {
        let node = self.resolver.resolve(name)?;
        self.get_or_create(NodeKey::Connection(name.to_string()), node)
            .await
    }

    /// Connection object for node `node` of shard `shard`.
    pub async fn shard(&self, shard: &str, node: usize) -> DbResult<Arc<C>> {
        let descriptor = self.resolver.resolve_shard(shard, node)?;
        self.get_or_create(NodeKey::Shard(shard.to_string(), node), descriptor)
            .await
    }

    /// Number of connection objects built so far.
    pub async fn cached_count(&self) -> usize {
        self.connections.read().await.len()
    }

    async fn get_or_create(&self, key: NodeKey, node: &NodeDescriptor) -> DbResult<Arc<C>> {
        // Early check under the read lock
        if let Some(conn) = self.connections.read().await.get(&key) {
            return Ok(Arc::clone(conn));
        }

        let mut connections = self.connections.write().await;
        // Re-check: another task may have built it while we waited
        if let Some(conn) = connections.get(&key) {
            return Ok(Arc::clone(conn));
        }

        debug!(node = %key, dsn = %node.dsn(), "Creating connection object");
        let conn = Arc::new((self.factory)(node)?);
        connections.insert(key, Arc::clone(&conn));
        Ok(conn)
    }
}
