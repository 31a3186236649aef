//! Reporting hooks for the send loop

use crate::xbee::{TransmitStatus, XBee64BitAddress, XBeeError};
use log::{debug, error, info};
use std::error::Error as _;

/// Receives the sender's progress events.
///
/// The sender never logs directly, so callers decide where events go.
pub trait SendObserver {
    /// The device on `port` is about to be opened
    fn starting(&mut self, _port: &str) {}

    /// A payload is about to be transmitted
    fn sending(&mut self, remote: &XBee64BitAddress, payload: &[u8]);

    /// The remote module acknowledged the payload
    fn delivered(&mut self, _remote: &XBee64BitAddress, _status: &TransmitStatus) {}

    /// An attempt failed, the loop carries on
    fn send_failed(&mut self, error: &XBeeError);
}

/// Line logged before each transmission, payload shown as byte values
pub fn sending_message(remote: &XBee64BitAddress, payload: &[u8]) -> String {
    format!("Sending data to {} >> {:?}", remote, payload)
}

/// Forwards sender events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl SendObserver for LogObserver {
    fn starting(&mut self, port: &str) {
        info!("Starting Xbee device on {}...", port);
    }

    fn sending(&mut self, remote: &XBee64BitAddress, payload: &[u8]) {
        info!("{}", sending_message(remote, payload));
    }

    fn delivered(&mut self, remote: &XBee64BitAddress, status: &TransmitStatus) {
        debug!(
            "{} acknowledged frame {} ({} retries)",
            remote,
            status.frame_id,
            status.retries
        );
    }

    fn send_failed(&mut self, err: &XBeeError) {
        match err.source() {
            Some(cause) => error!("{}: {}", err, cause),
            None => error!("{}", err),
        }
    }
}
