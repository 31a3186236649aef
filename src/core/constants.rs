//! Fixed message and default settings

/// Text transmitted on every send
pub const HELLO_MESSAGE: &str = "Hello Xbee";

/// Serial endpoint used when none is configured
pub const DEFAULT_PORT: &str = "/dev/pts/8";

pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Remote module addressed when none is configured
pub const DEFAULT_REMOTE_ADDRESS: &str = "0013A20041723B63";

/// Seconds between two sends
pub const DEFAULT_PERIOD_S: u64 = 2;

/// Milliseconds to wait for a transmit status
pub const DEFAULT_SYNC_TIMEOUT_MS: u64 = 4000;
