use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::metrics::ConnectionMetrics;

use super::types::ConnectionHandle;

/// Maps each user identity to its single live connection.
///
/// Every operation takes the same lock for the duration of a map access
/// only; the lock is never held across I/O.
pub struct ConnectionRegistry {
    /// user_id -> ConnectionHandle
    connections: Mutex<HashMap<String, Arc<ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Register a connection under its user identity.
    ///
    /// Last write wins: a previous connection for the same user is closed
    /// and returned.
    pub fn admit(&self, handle: Arc<ConnectionHandle>) -> Option<Arc<ConnectionHandle>> {
        let (displaced, live) = {
            let mut connections = self.connections.lock();
            let displaced = connections.insert(handle.user_id.clone(), handle.clone());
            (displaced, connections.len())
        };

        ConnectionMetrics::record_admitted(live);
        tracing::info!(
            connection_id = %handle.id,
            user_id = %handle.user_id,
            "Connection registered"
        );

        if let Some(ref old) = displaced {
            old.close();
            ConnectionMetrics::record_displaced();
            tracing::info!(
                connection_id = %old.id,
                user_id = %old.user_id,
                replaced_by = %handle.id,
                "Closed displaced connection"
            );
        }

        displaced
    }

    pub fn lookup(&self, user_id: &str) -> Option<Arc<ConnectionHandle>> {
        self.connections.lock().get(user_id).cloned()
    }

    /// Remove whatever connection is registered for `user_id`.
    pub fn revoke(&self, user_id: &str) -> Option<Arc<ConnectionHandle>> {
        let (removed, live) = {
            let mut connections = self.connections.lock();
            let removed = connections.remove(user_id);
            (removed, connections.len())
        };

        if let Some(ref handle) = removed {
            ConnectionMetrics::record_live(live);
            tracing::info!(
                connection_id = %handle.id,
                user_id = %user_id,
                "Connection unregistered"
            );
        }

        removed
    }

    /// Remove the entry for `user_id` only if it still holds `connection_id`.
    ///
    /// A connection that was displaced must not evict its successor.
    pub fn revoke_connection(&self, user_id: &str, connection_id: Uuid) -> bool {
        let live = {
            let mut connections = self.connections.lock();
            match connections.get(user_id) {
                Some(current) if current.id == connection_id => {
                    connections.remove(user_id);
                    connections.len()
                }
                _ => return false,
            }
        };

        ConnectionMetrics::record_live(live);
        tracing::info!(
            connection_id = %connection_id,
            user_id = %user_id,
            "Connection unregistered"
        );
        true
    }

    /// Point-in-time copy of every live handle.
    pub fn snapshot(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections.lock().values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Close every live connection and empty the registry.
    pub fn shutdown_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut connections = self.connections.lock();
            connections.drain().map(|(_, handle)| handle).collect()
        };

        for handle in &drained {
            handle.close();
        }

        ConnectionMetrics::record_live(0);
        tracing::info!(closed = drained.len(), "Closed all live connections");
        drained.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn handle(user_id: &str) -> Arc<ConnectionHandle> {
        ConnectionHandle::channel(user_id, 4).0
    }

    #[test]
    fn test_admit_then_lookup() {
        let registry = ConnectionRegistry::new();
        let h = handle("alice");
        assert!(registry.admit(h.clone()).is_none());

        let found = registry.lookup("alice").unwrap();
        assert_eq!(found.id, h.id);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_lookup_absent() {
        let registry = ConnectionRegistry::new();
        assert!(registry.lookup("nobody").is_none());
        assert!(registry.revoke("nobody").is_none());
    }

    #[test]
    fn test_revoke_removes_entry() {
        let registry = ConnectionRegistry::new();
        let h = handle("alice");
        registry.admit(h.clone());

        let removed = registry.revoke("alice").unwrap();
        assert_eq!(removed.id, h.id);
        assert!(registry.lookup("alice").is_none());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_last_write_wins_and_closes_displaced() {
        let registry = ConnectionRegistry::new();
        let (h1, _rx1) = ConnectionHandle::channel("alice", 4);
        let (h2, _rx2) = ConnectionHandle::channel("alice", 4);

        registry.admit(h1.clone());
        let displaced = registry.admit(h2.clone()).unwrap();

        assert_eq!(displaced.id, h1.id);
        assert!(h1.is_closed());
        assert!(!h2.is_closed());
        assert_eq!(registry.lookup("alice").unwrap().id, h2.id);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_displaced_connection_cannot_revoke_successor() {
        let registry = ConnectionRegistry::new();
        let h1 = handle("alice");
        let h2 = handle("alice");
        registry.admit(h1.clone());
        registry.admit(h2.clone());

        assert!(!registry.revoke_connection("alice", h1.id));
        assert_eq!(registry.lookup("alice").unwrap().id, h2.id);

        assert!(registry.revoke_connection("alice", h2.id));
        assert!(registry.lookup("alice").is_none());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let registry = ConnectionRegistry::new();
        registry.admit(handle("alice"));
        registry.admit(handle("bob"));

        let snapshot = registry.snapshot();
        registry.revoke("alice");

        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn test_snapshot_excludes_revoked() {
        let registry = ConnectionRegistry::new();
        registry.admit(handle("alice"));
        registry.admit(handle("bob"));
        registry.revoke("bob");

        let users: Vec<_> = registry
            .snapshot()
            .iter()
            .map(|h| h.user_id.clone())
            .collect();
        assert_eq!(users, vec!["alice".to_string()]);
    }

    #[test]
    fn test_concurrent_admit_revoke_snapshot() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut workers = Vec::new();

        for t in 0..4 {
            let registry = registry.clone();
            workers.push(thread::spawn(move || {
                for i in 0..200 {
                    let user = format!("user-{}-{}", t, i % 10);
                    registry.admit(handle(&user));
                    if i % 3 == 0 {
                        registry.revoke(&user);
                    }
                }
            }));
        }

        let reader = {
            let registry = registry.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let snapshot = registry.snapshot();
                    assert!(snapshot.len() <= 40);
                }
            })
        };

        for worker in workers {
            worker.join().unwrap();
        }
        reader.join().unwrap();

        // Every surviving handle is the one registered for its user
        for h in registry.snapshot() {
            assert_eq!(registry.lookup(&h.user_id).unwrap().id, h.id);
        }
    }

    #[test]
    fn test_shutdown_all_closes_everything() {
        let registry = ConnectionRegistry::new();
        let a = handle("alice");
        let b = handle("bob");
        registry.admit(a.clone());
        registry.admit(b.clone());

        assert_eq!(registry.shutdown_all(), 2);
        assert_eq!(registry.count(), 0);
        assert!(a.is_closed());
        assert!(b.is_closed());
    }
}
