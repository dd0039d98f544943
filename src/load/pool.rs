use parking_lot::RwLock;
use std::sync::Arc;

use super::connection::ClientConnection;

/// Append-only set of every connection opened during a run.
///
/// Only used for counting and holding ownership; closed connections stay in
/// the pool until the run is dropped.
#[derive(Clone, Default)]
pub struct ConnectionPool {
    connections: Arc<RwLock<Vec<Arc<ClientConnection>>>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, connection: Arc<ClientConnection>) {
        self.connections.write().push(connection);
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<Arc<ClientConnection>> {
        self.connections.read().clone()
    }

    /// Connections whose transport still reports live
    pub fn live_count(&self) -> usize {
        self.connections
            .read()
            .iter()
            .filter(|c| c.is_live())
            .count()
    }
}
