//! # Serialcast
//!
//! Reads newline-terminated lines from a serial device and broadcasts each
//! one to every connected WebSocket client. When the device is missing or
//! drops out, a dummy heartbeat line keeps clients fed while reconnects are
//! retried with capped exponential backoff.
//!
//! ## Architecture
//!
//! 1. **serialcast-core** - Errors, connection states, constants, events
//! 2. **serialcast-settings** - Configuration file handling
//! 3. **serialcast-communication** - Device links, framing, supervisor, WebSocket fan-out
//! 4. **serialcast** - Binary wiring it together

use anyhow::Context;
use serialcast_communication::{
    Broadcaster, ClientRegistry, ConnectionAcceptor, ReconnectSupervisor, SerialLinkFactory,
};
use serialcast_core::EventDispatcher;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

pub use serialcast_communication::{list_ports, SerialPortInfo};
pub use serialcast_core::{BridgeEvent, ConnectionError, ConnectionState, Error, Result};
pub use serialcast_settings::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Honors `RUST_LOG` and falls back to `info`. With `json` set, each event is
/// written as one JSON object per line.
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stdout)
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stdout)
                    .with_target(true)
                    .with_level(true)
                    .with_thread_names(true)
                    .with_line_number(true),
            )
            .try_init()
    };

    result.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}

/// Resolve the configuration to run with.
///
/// An explicit `path` must exist. Without one, the per-user config file is
/// used when present; otherwise built-in defaults apply.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = path {
        return Config::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()));
    }

    match Config::default_config_path() {
        Some(default_path) if default_path.exists() => {
            tracing::info!("Using config file {}", default_path.display());
            Config::load_from_file(&default_path)
                .with_context(|| format!("loading config from {}", default_path.display()))
        }
        _ => Ok(Config::default()),
    }
}

/// A bound, ready-to-run bridge
pub struct Bridge {
    config: Config,
    registry: Arc<ClientRegistry>,
    events: EventDispatcher,
    acceptor: ConnectionAcceptor,
}

impl Bridge {
    /// Validate `config` and bind the listen socket.
    ///
    /// This is the only place the bridge can fail.
    pub async fn bind(config: Config) -> anyhow::Result<Self> {
        config.validate().context("invalid configuration")?;

        let registry = Arc::new(ClientRegistry::new());
        let events = EventDispatcher::default();
        let acceptor = ConnectionAcceptor::bind(&config.server.listen_addr(), Arc::clone(&registry))
            .await?
            .with_handshake_timeout(config.server.handshake_timeout())
            .with_events(events.clone());

        Ok(Self {
            config,
            registry,
            events,
            acceptor,
        })
    }

    /// Address the WebSocket listener is bound to
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.acceptor.local_addr()
    }

    /// Bridge event stream
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Connected clients
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Run until `shutdown` resolves, then disconnect every client and close
    /// the active device link.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let Self {
            config,
            registry,
            events,
            acceptor,
        } = self;

        let factory = Arc::new(SerialLinkFactory::new(
            config.serial.clone(),
            config.dummy.clone(),
        ));
        let broadcaster = Broadcaster::new(registry)
            .with_send_timeout(config.server.send_timeout())
            .with_events(events.clone());
        let mut supervisor = ReconnectSupervisor::new(factory, broadcaster)
            .with_settings(&config.serial, &config.reconnect)
            .with_events(events);

        let accept_task = tokio::spawn(acceptor.run());

        tokio::select! {
            _ = supervisor.run() => {}
            _ = shutdown => tracing::info!("Shutting down"),
        }

        accept_task.abort();
        let _ = accept_task.await;
        supervisor.shutdown().await;
    }
}
