//! Registry of live WebSocket connections.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A connected client.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub peer: SocketAddr,
    pub connected_at: DateTime<Utc>,
}

/// Owned set of live connections, shared through server state.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connections: Mutex<HashMap<Uuid, ConnectionInfo>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, ConnectionInfo>> {
        // The map stays consistent even if a holder panicked.
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a connection and return its id.
    pub fn connect(&self, peer: SocketAddr) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().insert(
            id,
            ConnectionInfo {
                peer,
                connected_at: Utc::now(),
            },
        );
        id
    }

    /// Remove a connection; returns its info if it was registered.
    pub fn disconnect(&self, id: Uuid) -> Option<ConnectionInfo> {
        self.lock().remove(&id)
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn get(&self, id: Uuid) -> Option<ConnectionInfo> {
        self.lock().get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn connect_and_disconnect() {
        let mgr = ConnectionManager::new();
        let a = mgr.connect(addr(1000));
        let b = mgr.connect(addr(1001));
        assert_ne!(a, b);
        assert_eq!(mgr.count(), 2);
        assert_eq!(mgr.get(a).unwrap().peer, addr(1000));

        assert_eq!(mgr.disconnect(a).unwrap().peer, addr(1000));
        assert_eq!(mgr.count(), 1);
        assert!(mgr.disconnect(a).is_none());
        assert!(mgr.get(a).is_none());
    }
}
