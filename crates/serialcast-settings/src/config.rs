//! Configuration for the serial broadcast bridge
//!
//! Supports JSON and TOML files. Every field has a default, so a file only
//! needs to name the values it changes.
//!
//! Configuration is organized into logical sections:
//! - Serial device (path, baud rate, read tuning, init command)
//! - WebSocket server (listen address, send and handshake timeouts)
//! - Reconnect policy (backoff base and ceiling)
//! - Dummy fallback (synthetic line and interval)

use crate::error::{SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use serialcast_core::constants::*;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serial device settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Device path (e.g., "/dev/ttyUSB0", "COM6")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Maximum bytes per read
    pub read_chunk_size: usize,
    /// Driver read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Idle pause between empty reads in milliseconds
    pub poll_interval_ms: u64,
    /// Command written after each successful connect, without terminator
    pub init_command: String,
    /// Delay before the init command is written, in milliseconds
    pub settle_delay_ms: u64,
    /// Unterminated fragments longer than this are flushed as a line
    pub max_line_length: usize,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_DEVICE_PATH.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            init_command: INIT_COMMAND.to_string(),
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl SerialSettings {
    /// Driver read timeout
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Idle pause between empty reads
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Delay before the init command
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// WebSocket server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Listen host
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Per-client send timeout in milliseconds
    pub send_timeout_ms: u64,
    /// WebSocket handshake timeout in milliseconds
    pub handshake_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_LISTEN_HOST.to_string(),
            port: DEFAULT_LISTEN_PORT,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
        }
    }
}

impl ServerSettings {
    /// `host:port` string suitable for binding
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-client send timeout
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Time a new client gets to finish the WebSocket handshake
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

/// Reconnect backoff settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    /// First delay, restored after every successful connect
    pub base_backoff_ms: u64,
    /// Ceiling for the doubling delay
    pub max_backoff_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_backoff_ms: DEFAULT_BASE_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

impl ReconnectSettings {
    /// First delay
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    /// Delay ceiling
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Dummy fallback settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DummySettings {
    /// Synthetic line sent while no device is connected
    pub line: String,
    /// Interval between synthetic lines in milliseconds
    pub interval_ms: u64,
}

impl Default for DummySettings {
    fn default() -> Self {
        Self {
            line: DUMMY_LINE.to_string(),
            interval_ms: DEFAULT_DUMMY_INTERVAL_MS,
        }
    }
}

impl DummySettings {
    /// Interval between synthetic lines
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Complete bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial device settings
    pub serial: SerialSettings,
    /// WebSocket server settings
    pub server: ServerSettings,
    /// Reconnect backoff settings
    pub reconnect: ReconnectSettings,
    /// Dummy fallback settings
    pub dummy: DummySettings,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform config file location, e.g. `~/.config/serialcast/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("serialcast").join("config.toml"))
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;

        let config: Self = match format {
            ConfigFormat::Json => serde_json::from_str(&content)?,
            ConfigFormat::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match ConfigFormat::from_path(path)? {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        if self.serial.port.trim().is_empty() {
            return Err(SettingsError::invalid("serial.port", "must not be empty"));
        }

        if self.serial.baud_rate == 0 {
            return Err(SettingsError::invalid("serial.baud_rate", "must be > 0"));
        }

        if self.serial.read_chunk_size == 0 {
            return Err(SettingsError::invalid(
                "serial.read_chunk_size",
                "must be > 0",
            ));
        }

        if self.serial.max_line_length == 0 {
            return Err(SettingsError::invalid(
                "serial.max_line_length",
                "must be > 0",
            ));
        }

        if self.serial.init_command.contains(&['\n', '\r'][..]) {
            return Err(SettingsError::invalid(
                "serial.init_command",
                "must not contain line terminators",
            ));
        }

        if self.server.host.trim().is_empty() {
            return Err(SettingsError::invalid("server.host", "must not be empty"));
        }

        if self.server.send_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "server.send_timeout_ms",
                "must be > 0",
            ));
        }

        if self.server.handshake_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "server.handshake_timeout_ms",
                "must be > 0",
            ));
        }

        if self.reconnect.base_backoff_ms == 0 {
            return Err(SettingsError::invalid(
                "reconnect.base_backoff_ms",
                "must be > 0",
            ));
        }

        if self.reconnect.max_backoff_ms < self.reconnect.base_backoff_ms {
            return Err(SettingsError::invalid(
                "reconnect.max_backoff_ms",
                "must be >= base_backoff_ms",
            ));
        }

        if self.dummy.interval_ms == 0 {
            return Err(SettingsError::invalid("dummy.interval_ms", "must be > 0"));
        }

        if self.dummy.line.contains(&['\n', '\r'][..]) {
            return Err(SettingsError::invalid(
                "dummy.line",
                "must not contain line terminators",
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(ConfigFormat::Json),
            Some("toml") => Ok(ConfigFormat::Toml),
            other => Err(SettingsError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}
