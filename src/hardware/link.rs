//! Serial link trait and port settings

use crate::hardware::CommResult;
use std::time::Duration;

/// Byte-level access to the local radio adapter.
///
/// Implementations own the underlying port. `close` must be safe to call
/// on a link that is already closed.
pub trait SerialLink {
    /// Open the port. Opening an already open link is a no-op.
    fn open(&mut self) -> CommResult<()>;

    /// Release the port
    fn close(&mut self);

    /// Check whether the port is currently open
    fn is_open(&self) -> bool;

    /// Write the whole buffer to the port
    fn write_all(&mut self, data: &[u8]) -> CommResult<()>;

    /// Read whatever bytes are pending into `buf`.
    /// Returns Ok(0) when the read timeout expires without data.
    fn read_available(&mut self, buf: &mut [u8]) -> CommResult<usize>;

    /// Endpoint identifier, used in logs and errors
    fn port_name(&self) -> &str;
}

/// Parameters for opening a serial endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    /// Device path or COM port name
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Timeout of a single read call
    pub read_timeout: Duration,
}

impl LinkSettings {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            read_timeout: Duration::from_millis(100),
        }
    }
}
