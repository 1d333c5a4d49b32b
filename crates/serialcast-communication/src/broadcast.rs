//! Line fan-out to connected clients.

use crate::registry::ClientRegistry;
use futures::future::join_all;
use serialcast_core::constants::DEFAULT_SEND_TIMEOUT_MS;
use serialcast_core::{BridgeEvent, ClientId, ConnectionError, EventDispatcher};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients in the snapshot
    pub recipients: usize,
    /// Clients that accepted the line
    pub delivered: usize,
    /// Clients removed because their send failed
    pub evicted: Vec<ClientId>,
}

/// Sends each line to every registered client.
///
/// Sends run concurrently and each is bounded by a timeout. A failing client
/// is evicted from the registry; the others still receive the line.
pub struct Broadcaster {
    registry: Arc<ClientRegistry>,
    send_timeout: Duration,
    events: EventDispatcher,
}

impl Broadcaster {
    /// Create a broadcaster over `registry`
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self {
            registry,
            send_timeout: Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS),
            events: EventDispatcher::default(),
        }
    }

    /// Bound each client send by `timeout`
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Publish evictions on `events`
    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    /// The registry this broadcaster reads from
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Deliver `line` to every client.
    ///
    /// Empty lines are never sent. With no clients connected this is a no-op.
    pub async fn broadcast(&self, line: &str) -> BroadcastReport {
        if line.is_empty() {
            tracing::trace!("Skipping empty line");
            return BroadcastReport::default();
        }

        let clients = self.registry.snapshot();
        if clients.is_empty() {
            tracing::trace!("No clients connected, line not sent");
            return BroadcastReport::default();
        }

        let sends = clients.iter().map(|client| async move {
            let result = match tokio::time::timeout(self.send_timeout, client.send_line(line)).await
            {
                Ok(result) => result,
                Err(_) => Err(ConnectionError::SendFailure {
                    client: client.id().to_string(),
                    reason: format!("timed out after {:?}", self.send_timeout),
                }),
            };
            (client.id(), result)
        });

        let mut report = BroadcastReport {
            recipients: clients.len(),
            ..BroadcastReport::default()
        };

        for (id, result) in join_all(sends).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!("Dropping client {}: {}", id, e);
                    if self.registry.remove(id) {
                        self.events.publish(BridgeEvent::ClientEvicted {
                            id,
                            reason: e.to_string(),
                        });
                    }
                    report.evicted.push(id);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ClientHandle, ClientSink};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        lines: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ClientSink for RecordingSink {
        async fn send_line(&self, line: &str) -> Result<(), ConnectionError> {
            self.lines.lock().push(line.to_string());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl ClientSink for FailingSink {
        async fn send_line(&self, _line: &str) -> Result<(), ConnectionError> {
            Err(ConnectionError::SendFailure {
                client: "failing".to_string(),
                reason: "connection reset".to_string(),
            })
        }
    }

    struct StalledSink;

    #[async_trait]
    impl ClientSink for StalledSink {
        async fn send_line(&self, _line: &str) -> Result<(), ConnectionError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn register(registry: &ClientRegistry, sink: Arc<dyn ClientSink>) -> ClientId {
        let handle = ClientHandle::new(None, sink);
        let id = handle.id();
        registry.add(handle);
        id
    }

    #[tokio::test]
    async fn test_delivers_to_all_clients() {
        let registry = Arc::new(ClientRegistry::new());
        let sinks: Vec<Arc<RecordingSink>> = (0..3).map(|_| Arc::default()).collect();
        for sink in &sinks {
            register(&registry, sink.clone());
        }

        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let report = broadcaster.broadcast("X=1").await;

        assert_eq!(report.recipients, 3);
        assert_eq!(report.delivered, 3);
        assert!(report.evicted.is_empty());
        for sink in &sinks {
            assert_eq!(*sink.lines.lock(), vec!["X=1"]);
        }
    }

    #[tokio::test]
    async fn test_failing_client_is_evicted_others_still_delivered() {
        let registry = Arc::new(ClientRegistry::new());
        let good_a = Arc::new(RecordingSink::default());
        let good_b = Arc::new(RecordingSink::default());
        register(&registry, good_a.clone());
        let bad = register(&registry, Arc::new(FailingSink));
        register(&registry, good_b.clone());

        let events = EventDispatcher::default();
        let mut rx = events.subscribe();
        let broadcaster = Broadcaster::new(Arc::clone(&registry)).with_events(events);
        let report = broadcaster.broadcast("line").await;

        assert_eq!(report.delivered, 2);
        assert_eq!(report.evicted, vec![bad]);
        assert_eq!(registry.len(), 2);
        assert!(!registry.contains(bad));
        assert_eq!(*good_a.lines.lock(), vec!["line"]);
        assert_eq!(*good_b.lines.lock(), vec!["line"]);

        match rx.recv().await.unwrap() {
            BridgeEvent::ClientEvicted { id, .. } => assert_eq!(id, bad),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_client_times_out() {
        let registry = Arc::new(ClientRegistry::new());
        let good = Arc::new(RecordingSink::default());
        register(&registry, good.clone());
        let stalled = register(&registry, Arc::new(StalledSink));

        let broadcaster =
            Broadcaster::new(Arc::clone(&registry)).with_send_timeout(Duration::from_secs(2));
        let report = broadcaster.broadcast("tick").await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.evicted, vec![stalled]);
        assert_eq!(*good.lines.lock(), vec!["tick"]);
    }

    #[tokio::test]
    async fn test_empty_line_not_sent() {
        let registry = Arc::new(ClientRegistry::new());
        let sink = Arc::new(RecordingSink::default());
        register(&registry, sink.clone());

        let report = Broadcaster::new(Arc::clone(&registry)).broadcast("").await;
        assert_eq!(report, BroadcastReport::default());
        assert!(sink.lines.lock().is_empty());
    }

    #[tokio::test]
    async fn test_no_clients_is_noop() {
        let registry = Arc::new(ClientRegistry::new());
        let report = Broadcaster::new(registry).broadcast("X=1").await;
        assert_eq!(report.recipients, 0);
        assert_eq!(report.delivered, 0);
    }
}
