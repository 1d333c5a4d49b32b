//! Error handling for serialcast
//!
//! Every failure in the bridge is recoverable except a bad configuration or
//! a listen socket that cannot be bound at startup:
//! - Device failures (open, read, init write) trigger fallback and backoff
//! - Client failures (handshake, send) are isolated to that client
//!
//! Invalid bytes from the device are never an error; they are decoded lossily.

use thiserror::Error;

/// Connection error type
///
/// Represents failures on either side of the bridge: the serial device
/// and the network clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The device could not be opened (missing, busy, permission denied)
    #[error("Failed to open {port}: {reason}")]
    ConnectFailure {
        /// The device path.
        port: String,
        /// Driver-reported reason.
        reason: String,
    },

    /// The device failed mid-session
    #[error("Read from {port} failed: {reason}")]
    TransportReadFailure {
        /// The device path.
        port: String,
        /// Driver-reported reason.
        reason: String,
    },

    /// The post-connect initialization command could not be written
    #[error("Failed to initialize {port}: {reason}")]
    InitializationFailure {
        /// The device path.
        port: String,
        /// Driver-reported reason.
        reason: String,
    },

    /// A line could not be delivered to one client
    #[error("Send to client {client} failed: {reason}")]
    SendFailure {
        /// Client identifier.
        client: String,
        /// Transport-reported reason.
        reason: String,
    },

    /// The listen socket could not be bound
    #[error("Failed to bind {addr}: {reason}")]
    BindFailure {
        /// The requested listen address.
        addr: String,
        /// OS-reported reason.
        reason: String,
    },

    /// A client connected but the WebSocket upgrade failed
    #[error("Handshake with {peer} failed: {reason}")]
    HandshakeFailure {
        /// Remote peer address.
        peer: String,
        /// Protocol-reported reason.
        reason: String,
    },
}

impl ConnectionError {
    /// True for failures that originate at the serial device
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            ConnectionError::ConnectFailure { .. }
                | ConnectionError::TransportReadFailure { .. }
                | ConnectionError::InitializationFailure { .. }
        )
    }

    /// True for failures that affect a single client
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ConnectionError::SendFailure { .. } | ConnectionError::HandshakeFailure { .. }
        )
    }
}

/// Main error type for serialcast
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
