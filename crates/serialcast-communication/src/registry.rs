//! Connected client tracking
//!
//! The registry is the only state shared between the accept loop, the
//! per-client tasks, and the broadcaster. Sends never happen under its
//! lock: the broadcaster works on a [`ClientRegistry::snapshot`].

use async_trait::async_trait;
use parking_lot::RwLock;
use serialcast_core::{ClientId, ConnectionError};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

/// Outbound half of one client connection
#[async_trait]
pub trait ClientSink: Send + Sync {
    /// Deliver one line as a single message
    async fn send_line(&self, line: &str) -> Result<(), ConnectionError>;
}

/// One connected broadcast target
#[derive(Clone)]
pub struct ClientHandle {
    id: ClientId,
    peer: Option<SocketAddr>,
    sink: Arc<dyn ClientSink>,
}

impl ClientHandle {
    /// Create a handle with a fresh id
    pub fn new(peer: Option<SocketAddr>, sink: Arc<dyn ClientSink>) -> Self {
        Self {
            id: ClientId::new(),
            peer,
            sink,
        }
    }

    /// Client identity
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Remote address, when known
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Send one line to this client
    pub async fn send_line(&self, line: &str) -> Result<(), ConnectionError> {
        self.sink.send_line(line).await
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

/// Set of currently connected clients
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<ClientId, ClientHandle>>,
}

impl ClientRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client
    pub fn add(&self, handle: ClientHandle) {
        let id = handle.id();
        if self.clients.write().insert(id, handle).is_some() {
            tracing::warn!("Client {} registered twice", id);
        }
    }

    /// Deregister a client; absent ids are ignored.
    ///
    /// Returns whether a client was actually removed.
    pub fn remove(&self, id: ClientId) -> bool {
        self.clients.write().remove(&id).is_some()
    }

    /// Copy of the current client set
    pub fn snapshot(&self) -> Vec<ClientHandle> {
        self.clients.read().values().cloned().collect()
    }

    /// Whether `id` is registered
    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.read().contains_key(&id)
    }

    /// Number of connected clients
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    /// True when no clients are connected
    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}

/// Keeps a client registered for as long as it is alive.
///
/// Dropping the guard deregisters the client, so cleanup runs on every exit
/// path of the owning task, including cancellation.
pub struct Registration {
    id: ClientId,
    registry: Arc<ClientRegistry>,
}

impl Registration {
    /// Add `handle` to `registry` and return the guard
    pub fn new(registry: Arc<ClientRegistry>, handle: ClientHandle) -> Self {
        let id = handle.id();
        registry.add(handle);
        Self { id, registry }
    }

    /// The registered client's id
    pub fn id(&self) -> ClientId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSink;

    #[async_trait]
    impl ClientSink for NullSink {
        async fn send_line(&self, _line: &str) -> Result<(), ConnectionError> {
            Ok(())
        }
    }

    fn handle() -> ClientHandle {
        ClientHandle::new(None, Arc::new(NullSink))
    }

    #[test]
    fn test_add_and_remove() {
        let registry = ClientRegistry::new();
        let a = handle();
        let b = handle();
        let a_id = a.id();

        registry.add(a);
        registry.add(b);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(a_id));

        assert!(registry.remove(a_id));
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains(a_id));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let registry = ClientRegistry::new();
        registry.add(handle());

        assert!(!registry.remove(ClientId::new()));
        assert_eq!(registry.len(), 1);

        let id = registry.snapshot()[0].id();
        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_changes() {
        let registry = ClientRegistry::new();
        registry.add(handle());
        registry.add(handle());

        let snapshot = registry.snapshot();
        for client in &snapshot {
            registry.remove(client.id());
        }
        registry.add(handle());

        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registration_guard_deregisters_on_drop() {
        let registry = Arc::new(ClientRegistry::new());
        let guard = Registration::new(Arc::clone(&registry), handle());
        let id = guard.id();
        assert!(registry.contains(id));

        drop(guard);
        assert!(!registry.contains(id));
    }

    #[test]
    fn test_guard_after_manual_removal() {
        let registry = Arc::new(ClientRegistry::new());
        let guard = Registration::new(Arc::clone(&registry), handle());
        registry.remove(guard.id());
        drop(guard);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_add_remove() {
        let registry = Arc::new(ClientRegistry::new());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let h = handle();
                        let id = h.id();
                        registry.add(h);
                        let _ = registry.snapshot();
                        registry.remove(id);
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}
