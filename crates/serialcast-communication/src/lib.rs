//! # Serialcast Communication
//!
//! Device links (serial and dummy), line framing, reconnect supervision,
//! and WebSocket fan-out to connected clients.

pub mod acceptor;
pub mod backoff;
pub mod broadcast;
pub mod device;
pub mod framer;
pub mod registry;
pub mod supervisor;

pub use acceptor::{ConnectionAcceptor, WsClientSink};
pub use backoff::Backoff;
pub use broadcast::{BroadcastReport, Broadcaster};
pub use device::{
    list_ports, DeviceLink, DummyLink, LinkFactory, LiveLink, RealSerialPort, SerialLinkFactory,
    SerialPortInfo, SerialTransport,
};
pub use framer::LineFramer;
pub use registry::{ClientHandle, ClientRegistry, ClientSink, Registration};
pub use supervisor::ReconnectSupervisor;
