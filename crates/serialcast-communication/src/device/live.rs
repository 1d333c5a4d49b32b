//! Live link to a real serial device
//!
//! Serial reads block at the driver level, so every transport call runs on
//! tokio's blocking pool. The driver timeout keeps each read short; an
//! expired read is reported as an empty chunk and the caller polls again.

use super::{DeviceLink, SerialTransport};
use async_trait::async_trait;
use parking_lot::Mutex;
use serialcast_core::{ConnectionError, LinkKind};
use std::io;
use std::sync::Arc;
use std::time::Duration;

type SharedTransport = Arc<Mutex<Option<Box<dyn SerialTransport>>>>;

/// Link to a physical device through a [`SerialTransport`]
pub struct LiveLink {
    name: String,
    transport: SharedTransport,
    init_command: String,
    settle_delay: Duration,
}

impl LiveLink {
    /// Wrap an already opened transport
    pub fn new(
        transport: Box<dyn SerialTransport>,
        init_command: impl Into<String>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            name: transport.name().to_string(),
            transport: Arc::new(Mutex::new(Some(transport))),
            init_command: init_command.into(),
            settle_delay,
        }
    }

    /// Device path
    pub fn name(&self) -> &str {
        &self.name
    }

    /// False once `close` has run
    pub fn is_open(&self) -> bool {
        self.transport.lock().is_some()
    }

    async fn write_all(&self, data: Vec<u8>) -> io::Result<()> {
        let transport = Arc::clone(&self.transport);
        tokio::task::spawn_blocking(move || -> io::Result<()> {
            let mut guard = transport.lock();
            let port = guard.as_mut().ok_or_else(port_closed)?;
            let mut written = 0;
            while written < data.len() {
                match port.write(&data[written..])? {
                    0 => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                    n => written += n,
                }
            }
            Ok(())
        })
        .await
        .map_err(io::Error::other)?
    }
}

fn port_closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "port closed")
}

fn is_idle(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

#[async_trait]
impl DeviceLink for LiveLink {
    fn kind(&self) -> LinkKind {
        LinkKind::Live
    }

    fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    async fn initialize(&mut self) -> Result<(), ConnectionError> {
        if !self.is_open() {
            tracing::debug!("{} closed before init command", self.name);
            return Ok(());
        }

        let mut payload = self.init_command.clone().into_bytes();
        payload.push(b'\n');
        self.write_all(payload)
            .await
            .map_err(|e| ConnectionError::InitializationFailure {
                port: self.name.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!("Sent init command to {}: {}", self.name, self.init_command);
        Ok(())
    }

    async fn read_chunk(&mut self, max_bytes: usize) -> Result<Vec<u8>, ConnectionError> {
        let transport = Arc::clone(&self.transport);
        let outcome = tokio::task::spawn_blocking(move || -> io::Result<Vec<u8>> {
            let mut guard = transport.lock();
            let port = guard.as_mut().ok_or_else(port_closed)?;
            let mut buf = vec![0u8; max_bytes];
            match port.read(&mut buf) {
                Ok(n) => {
                    buf.truncate(n);
                    Ok(buf)
                }
                Err(e) if is_idle(&e) => Ok(Vec::new()),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(io::Error::other)
        .and_then(|inner| inner);

        outcome.map_err(|e| ConnectionError::TransportReadFailure {
            port: self.name.clone(),
            reason: e.to_string(),
        })
    }

    // A cancelled read may still hold the lock on the blocking pool.
    async fn close(&mut self) {
        let transport = Arc::clone(&self.transport);
        let outcome = tokio::task::spawn_blocking(move || {
            let taken = transport.lock().take();
            taken.map(|mut port| port.close())
        })
        .await;

        match outcome {
            Ok(None) => {}
            Ok(Some(Ok(()))) => tracing::info!("Serial port {} closed.", self.name),
            Ok(Some(Err(e))) => tracing::warn!("Error closing {}: {}", self.name, e),
            Err(e) => tracing::warn!("Close task for {} failed: {}", self.name, e),
        }
    }
}
