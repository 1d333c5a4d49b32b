//! Device links
//!
//! A [`DeviceLink`] is one connection to a byte source. Two variants exist:
//! [`LiveLink`] reads a real serial device, [`DummyLink`] emits a synthetic
//! line on a fixed interval while no device is reachable. The supervisor
//! owns exactly one link at a time and obtains new ones from a
//! [`LinkFactory`].

pub mod dummy;
pub mod live;
pub mod serial;

pub use dummy::DummyLink;
pub use live::LiveLink;
pub use serial::{list_ports, RealSerialPort, SerialPortInfo, SerialTransport};

use async_trait::async_trait;
use serialcast_core::{ConnectionError, LinkKind};
use serialcast_settings::{DummySettings, SerialSettings};
use std::time::Duration;

/// One connection to a byte source
#[async_trait]
pub trait DeviceLink: Send {
    /// Which variant this is
    fn kind(&self) -> LinkKind;

    /// How long after opening the link `initialize` should run.
    ///
    /// The supervisor keeps reading while this elapses.
    fn settle_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Post-connect setup, called at most once per opened link
    async fn initialize(&mut self) -> Result<(), ConnectionError> {
        Ok(())
    }

    /// Read up to `max_bytes`; an empty vector means nothing arrived yet.
    ///
    /// A quiet device yields an empty vector rather than waiting indefinitely.
    /// An error means the link is dead and must be replaced.
    async fn read_chunk(&mut self, max_bytes: usize) -> Result<Vec<u8>, ConnectionError>;

    /// Release the link; safe to call more than once
    async fn close(&mut self);
}

/// Produces device links for the supervisor
#[async_trait]
pub trait LinkFactory: Send + Sync {
    /// Try to open the real device
    async fn open_live(&self) -> Result<Box<dyn DeviceLink>, ConnectionError>;

    /// Build the fallback link; never fails
    fn dummy(&self) -> Box<dyn DeviceLink>;
}

/// Link factory backed by a real serial port
#[derive(Debug, Clone)]
pub struct SerialLinkFactory {
    serial: SerialSettings,
    dummy: DummySettings,
}

impl SerialLinkFactory {
    /// Create a factory from the serial and dummy settings
    pub fn new(serial: SerialSettings, dummy: DummySettings) -> Self {
        Self { serial, dummy }
    }
}

#[async_trait]
impl LinkFactory for SerialLinkFactory {
    async fn open_live(&self) -> Result<Box<dyn DeviceLink>, ConnectionError> {
        let settings = self.serial.clone();
        let port = settings.port.clone();
        // Opening a tty can block on some drivers
        let transport = tokio::task::spawn_blocking(move || {
            RealSerialPort::open(&settings.port, settings.baud_rate, settings.read_timeout())
        })
        .await
        .map_err(|e| ConnectionError::ConnectFailure {
            port,
            reason: e.to_string(),
        })??;

        tracing::info!(
            "Connected to {} at {} baud.",
            self.serial.port,
            self.serial.baud_rate
        );
        Ok(Box::new(LiveLink::new(
            Box::new(transport),
            self.serial.init_command.clone(),
            self.serial.settle_delay(),
        )))
    }

    fn dummy(&self) -> Box<dyn DeviceLink> {
        Box::new(DummyLink::new(self.dummy.line.clone(), self.dummy.interval()))
    }
}
