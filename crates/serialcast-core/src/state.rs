//! Connection states and identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Reconnect supervisor state
///
/// Tracks which device link, if any, is feeding the line pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No link yet; initial state at process start
    Disconnected,
    /// First attempt to open the real device
    Connecting,
    /// The real device is feeding the pipeline
    Live,
    /// The dummy link is feeding the pipeline while reconnects are attempted
    DummyFallback,
}

impl ConnectionState {
    /// Check if a transition from this state to `target` is valid.
    ///
    /// Returns `true` for valid transitions:
    /// - Disconnected → Connecting
    /// - Connecting → Live, DummyFallback
    /// - Live → DummyFallback
    /// - DummyFallback → Live
    pub fn can_transition_to(&self, target: ConnectionState) -> bool {
        use ConnectionState::*;
        if *self == target {
            return true;
        }
        matches!(
            (self, target),
            (Disconnected, Connecting)
                | (Connecting, Live | DummyFallback)
                | (Live, DummyFallback)
                | (DummyFallback, Live)
        )
    }

    /// Which link variant is active in this state, if any
    pub fn link_kind(&self) -> Option<LinkKind> {
        match self {
            ConnectionState::Live => Some(LinkKind::Live),
            ConnectionState::DummyFallback => Some(LinkKind::Dummy),
            ConnectionState::Disconnected | ConnectionState::Connecting => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Live => write!(f, "Live"),
            ConnectionState::DummyFallback => write!(f, "DummyFallback"),
        }
    }
}

/// Device link variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkKind {
    /// Real serial device
    Live,
    /// Synthetic heartbeat generator
    Dummy,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Live => write!(f, "live"),
            LinkKind::Dummy => write!(f, "dummy"),
        }
    }
}

/// Identity of one connected broadcast target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Create a new unique client ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        use ConnectionState::*;
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Live));
        assert!(Connecting.can_transition_to(DummyFallback));
        assert!(Live.can_transition_to(DummyFallback));
        assert!(DummyFallback.can_transition_to(Live));
        assert!(DummyFallback.can_transition_to(DummyFallback));
    }

    #[test]
    fn test_invalid_transitions() {
        use ConnectionState::*;
        assert!(!Disconnected.can_transition_to(Live));
        assert!(!Live.can_transition_to(Disconnected));
        assert!(!DummyFallback.can_transition_to(Connecting));
        assert!(!Live.can_transition_to(Connecting));
    }

    #[test]
    fn test_link_kind() {
        assert_eq!(ConnectionState::Live.link_kind(), Some(LinkKind::Live));
        assert_eq!(
            ConnectionState::DummyFallback.link_kind(),
            Some(LinkKind::Dummy)
        );
        assert_eq!(ConnectionState::Connecting.link_kind(), None);
    }

    #[test]
    fn test_client_ids_are_unique() {
        let a = ClientId::new();
        let b = ClientId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 8);
    }
}
