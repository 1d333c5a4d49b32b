//! # Serialcast Core
//!
//! Core types shared by every serialcast crate: the error taxonomy,
//! connection state machine states, fixed protocol constants, and the
//! bridge event dispatcher.

pub mod constants;
pub mod error;
pub mod event;
pub mod state;

pub use error::{ConnectionError, Error, Result};
pub use event::{BridgeEvent, EventDispatcher};
pub use state::{ClientId, ConnectionState, LinkKind};
