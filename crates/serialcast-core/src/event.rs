//! Event system for bridge observation
//!
//! Provides:
//! - Event types for supervisor transitions and client churn
//! - Event dispatcher for publishing events to subscribers

use crate::state::{ClientId, ConnectionState};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::broadcast;

/// Bridge event types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Supervisor moved between states
    StateChanged {
        /// Previous state.
        from: ConnectionState,
        /// New state.
        to: ConnectionState,
    },
    /// A reconnect attempt failed and the next one is scheduled
    ReconnectScheduled {
        /// Number of consecutive failed attempts so far.
        attempt: u32,
        /// Delay before the next attempt.
        delay: Duration,
    },
    /// A client completed the handshake and was registered
    ClientConnected {
        /// Client identifier.
        id: ClientId,
        /// Remote address.
        peer: SocketAddr,
    },
    /// A client closed its connection
    ClientDisconnected {
        /// Client identifier.
        id: ClientId,
    },
    /// A client was dropped after a failed send
    ClientEvicted {
        /// Client identifier.
        id: ClientId,
        /// Why the send failed.
        reason: String,
    },
}

impl std::fmt::Display for BridgeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeEvent::StateChanged { from, to } => write!(f, "State: {} -> {}", from, to),
            BridgeEvent::ReconnectScheduled { attempt, delay } => {
                write!(f, "Reconnect attempt {} in {:?}", attempt, delay)
            }
            BridgeEvent::ClientConnected { id, peer } => {
                write!(f, "Client {} connected from {}", id, peer)
            }
            BridgeEvent::ClientDisconnected { id } => write!(f, "Client {} disconnected", id),
            BridgeEvent::ClientEvicted { id, reason } => {
                write!(f, "Client {} evicted: {}", id, reason)
            }
        }
    }
}

/// Event dispatcher for publishing events to subscribers
#[derive(Clone)]
pub struct EventDispatcher {
    tx: broadcast::Sender<BridgeEvent>,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    ///
    /// # Arguments
    /// * `buffer_size` - Size of the broadcast buffer (default 100)
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size);
        Self { tx }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of subscribers reached; zero when nobody listens.
    pub fn publish(&self, event: BridgeEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let dispatcher = EventDispatcher::default();
        let delivered = dispatcher.publish(BridgeEvent::ClientDisconnected {
            id: ClientId::new(),
        });
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_subscribe_receives_events() {
        let dispatcher = EventDispatcher::default();
        let mut rx = dispatcher.subscribe();
        assert_eq!(dispatcher.subscriber_count(), 1);

        let event = BridgeEvent::StateChanged {
            from: ConnectionState::Disconnected,
            to: ConnectionState::Connecting,
        };
        assert_eq!(dispatcher.publish(event.clone()), 1);
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn test_event_display() {
        let event = BridgeEvent::ReconnectScheduled {
            attempt: 3,
            delay: Duration::from_secs(8),
        };
        assert_eq!(event.to_string(), "Reconnect attempt 3 in 8s");
    }
}
