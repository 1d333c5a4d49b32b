//! Serialcast Settings Crate
//!
//! Loads, validates, and saves the bridge configuration.

pub mod config;
pub mod error;

pub use config::{Config, DummySettings, ReconnectSettings, SerialSettings, ServerSettings};
pub use error::{SettingsError, SettingsResult};
