//! Fixed protocol values and configuration defaults.

/// Command written to the device once per successful live connection.
pub const INIT_COMMAND: &str = "M1000 O-1 P5 Q10000";

/// Line emitted by the dummy link while no device is reachable.
pub const DUMMY_LINE: &str = "DUMMY";

/// Default serial device path.
#[cfg(target_os = "windows")]
pub const DEFAULT_DEVICE_PATH: &str = "COM6";

/// Default serial device path.
#[cfg(not(target_os = "windows"))]
pub const DEFAULT_DEVICE_PATH: &str = "/dev/ttyUSB0";

/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default listen host for WebSocket clients.
pub const DEFAULT_LISTEN_HOST: &str = "localhost";

/// Default listen port for WebSocket clients.
pub const DEFAULT_LISTEN_PORT: u16 = 2567;

/// Maximum bytes requested from the device per read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 128;

/// Driver-level read timeout; an expired read counts as "no data".
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 50;

/// Pause between polls when the device had nothing to say.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Delay between opening the port and writing the init command.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1_000;

/// Interval between synthetic dummy lines.
pub const DEFAULT_DUMMY_INTERVAL_MS: u64 = 1_000;

/// First reconnect delay, and the value restored after every successful connect.
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 2_000;

/// Ceiling for the doubling reconnect delay.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;

/// Upper bound for a single client send before the client is evicted.
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 5_000;

/// Upper bound for the WebSocket opening handshake of a new client.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;

/// Longest unterminated fragment kept before it is flushed as a line.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4_096;
