//! Serial port access
//!
//! Wraps the `serialport` crate behind the small [`SerialTransport`] trait so
//! the live link can be exercised against an in-memory port in tests.
//!
//! Supports:
//! - Port enumeration and discovery
//! - Opening a port with a short driver timeout for polled reads
//! - Blocking read/write operations

use serialcast_core::ConnectionError;
use std::io::{self, Read, Write};
use std::time::Duration;

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            manufacturer: None,
            vid: None,
            pid: None,
        }
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }
}

/// List serial ports present on the system
pub fn list_ports() -> Result<Vec<SerialPortInfo>, serialport::Error> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        e
    })?;

    Ok(ports
        .iter()
        .map(|port| {
            let info = SerialPortInfo::new(&port.port_name, describe(&port.port_type));
            match &port.port_type {
                serialport::SerialPortType::UsbPort(usb) => {
                    let info = info.with_usb_ids(usb.vid, usb.pid);
                    match &usb.manufacturer {
                        Some(mfg) => info.with_manufacturer(mfg),
                        None => info,
                    }
                }
                _ => info,
            }
        })
        .collect())
}

fn describe(port_type: &serialport::SerialPortType) -> String {
    match port_type {
        serialport::SerialPortType::UsbPort(usb) => format!(
            "USB {} {}",
            usb.manufacturer.as_deref().unwrap_or("Device"),
            usb.product.as_deref().unwrap_or("Serial Port")
        ),
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Low-level serial port interface
///
/// Calls block; the live link runs them on the blocking pool.
pub trait SerialTransport: Send {
    /// Write data to the port
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Read available data; `TimedOut`/`WouldBlock` mean "nothing yet"
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Device path this transport was opened on
    fn name(&self) -> &str;

    /// Release the underlying device
    fn close(&mut self) -> io::Result<()>;
}

/// Real serial port implementation using the serialport crate
pub struct RealSerialPort {
    name: String,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl RealSerialPort {
    /// Open `path` at `baud_rate` with 8N1 framing and no flow control
    pub fn open(
        path: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let port = serialport::new(path, baud_rate)
            .timeout(read_timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| ConnectionError::ConnectFailure {
                port: path.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            name: path.to_string(),
            port: Some(port),
        })
    }

    fn port_mut(&mut self) -> io::Result<&mut Box<dyn serialport::SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "port closed"))
    }
}

impl SerialTransport for RealSerialPort {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let port = self.port_mut()?;
        let written = port.write(data)?;
        port.flush()?;
        Ok(written)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port_mut()?.read(buf)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) -> io::Result<()> {
        // Dropping the handle closes the file descriptor
        self.port = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_info_builder() {
        let info = SerialPortInfo::new("/dev/ttyACM0", "USB Arduino Serial Port")
            .with_manufacturer("Arduino")
            .with_usb_ids(0x2341, 0x0043);
        assert_eq!(info.manufacturer.as_deref(), Some("Arduino"));
        assert_eq!(info.vid, Some(0x2341));
        assert_eq!(info.pid, Some(0x0043));
    }

    #[test]
    fn test_describe_non_usb() {
        assert_eq!(
            describe(&serialport::SerialPortType::BluetoothPort),
            "Bluetooth Serial"
        );
        assert_eq!(describe(&serialport::SerialPortType::Unknown), "Serial Port");
    }

    #[test]
    fn test_open_missing_device_is_connect_failure() {
        let result = RealSerialPort::open(
            "/dev/serialcast-does-not-exist",
            115_200,
            Duration::from_millis(10),
        );
        assert!(matches!(
            result,
            Err(ConnectionError::ConnectFailure { port, .. }) if port == "/dev/serialcast-does-not-exist"
        ));
    }
}
