//! Serial/UART link backed by the `serialport` crate

use crate::hardware::{CommError, CommResult, LinkSettings, SerialLink};
use log::debug;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};

/// Serial port link to a locally attached XBee
pub struct SerialPortLink {
    settings: LinkSettings,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialPortLink {
    /// Create a closed link for the given settings
    pub fn new(settings: LinkSettings) -> Self {
        Self {
            settings,
            port: None,
        }
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    fn port_mut(&mut self) -> CommResult<&mut Box<dyn SerialPort>> {
        match self.port.as_mut() {
            Some(port) => Ok(port),
            None => Err(CommError::not_open(&self.settings.port)),
        }
    }
}

impl SerialLink for SerialPortLink {
    fn open(&mut self) -> CommResult<()> {
        if self.port.is_some() {
            return Ok(());
        }

        // XBee modules ship configured for 8N1 without flow control
        let port = serialport::new(&self.settings.port, self.settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.settings.read_timeout)
            .open()
            .map_err(|e| CommError::open(&self.settings.port, e))?;

        debug!(
            "opened {} at {} baud",
            self.settings.port, self.settings.baud_rate
        );
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut port) = self.port.take() {
            let _ = port.flush();
            debug!("closed {}", self.settings.port);
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write_all(&mut self, data: &[u8]) -> CommResult<()> {
        let name = self.settings.port.clone();
        let port = self.port_mut()?;
        port.write_all(data).map_err(|e| CommError::io(&name, e))?;
        port.flush().map_err(|e| CommError::io(name, e))
    }

    fn read_available(&mut self, buf: &mut [u8]) -> CommResult<usize> {
        let name = self.settings.port.clone();
        let port = self.port_mut()?;
        match port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(CommError::io(name, e)),
        }
    }

    fn port_name(&self) -> &str {
        &self.settings.port
    }
}

impl Drop for SerialPortLink {
    fn drop(&mut self) {
        self.close();
    }
}
