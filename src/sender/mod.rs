//! Periodic sender
//!
//! Transmits the fixed message to one remote module every period until
//! cancelled. The local module is closed after each period and reopened
//! before the next send. Transport faults are reported and the next period
//! is the only retry.

pub mod countdown;
pub mod observer;

pub use countdown::{wait_with_countdown, CancelToken};
pub use observer::{sending_message, LogObserver, SendObserver};

use crate::core::MessagePayload;
use crate::hardware::SerialLink;
use crate::utils::SenderConfig;
use crate::xbee::{RemoteXBeeDevice, TransmitStatus, XBeeDevice, XBeeError, XBeeResult};
use log::debug;
use std::io::{self, Write};
use std::time::Duration;

/// Counters for one run of the send loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendStats {
    pub attempts: u64,
    pub delivered: u64,
    pub failed: u64,
}

pub struct PeriodicSender<L: SerialLink> {
    device: XBeeDevice<L>,
    remote: RemoteXBeeDevice,
    period_s: u64,
    tick: Duration,
    observer: Box<dyn SendObserver>,
    countdown: Box<dyn Write>,
}

impl<L: SerialLink> PeriodicSender<L> {
    /// Open the local module and resolve the remote peer.
    ///
    /// Both failures are fatal: an [`XBeeError::Open`] means no send was
    /// attempted, and a malformed address yields [`XBeeError::InvalidAddress`].
    /// The device is closed again on either error.
    pub fn initialize(
        config: &SenderConfig,
        link: L,
        mut observer: Box<dyn SendObserver>,
    ) -> XBeeResult<Self> {
        let mut device = XBeeDevice::new(link, config.api_mode, config.sync_timeout());

        observer.starting(device.port_name());
        device.open()?;

        let remote = RemoteXBeeDevice::from_hex_string(&config.remote_address)?;
        if config.broadcast {
            debug!("broadcast flag set, sending to {} anyway", remote.get_64bit_addr());
        }

        Ok(Self {
            device,
            remote,
            period_s: config.period_s,
            tick: Duration::from_secs(1),
            observer,
            countdown: Box::new(io::stdout()),
        })
    }

    /// Length of one countdown step, one second unless overridden
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Where the countdown is printed, stdout by default
    pub fn with_countdown_output(mut self, out: Box<dyn Write>) -> Self {
        self.countdown = out;
        self
    }

    pub fn remote(&self) -> &RemoteXBeeDevice {
        &self.remote
    }

    pub fn device(&self) -> &XBeeDevice<L> {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut XBeeDevice<L> {
        &mut self.device
    }

    /// Transmit the message once, reopening the device if needed.
    ///
    /// Every error returned here is recoverable.
    pub fn send_once(&mut self) -> XBeeResult<TransmitStatus> {
        let payload = MessagePayload::new();
        let address = self.remote.get_64bit_addr();
        self.observer.sending(&address, payload.as_bytes());

        if !self.device.is_open() {
            self.device.open().map_err(|e| match e {
                XBeeError::Open(cause) => XBeeError::link(cause),
                other => other,
            })?;
        }

        let status = self.device.send_data(&self.remote, payload.as_bytes())?;
        self.observer.delivered(&address, &status);
        Ok(status)
    }

    /// Send, wait and close until `cancel` fires
    pub fn run(&mut self, cancel: &CancelToken) -> SendStats {
        let mut stats = SendStats::default();

        while !cancel.is_cancelled() {
            stats.attempts += 1;
            match self.send_once() {
                Ok(_) => stats.delivered += 1,
                Err(e) => {
                    stats.failed += 1;
                    self.observer.send_failed(&e);
                }
            }

            wait_with_countdown(self.period_s, self.tick, cancel, self.countdown.as_mut());
            self.device.close();
        }

        self.device.close();
        debug!(
            "sender stopped after {} attempts, {} delivered",
            stats.attempts, stats.delivered
        );
        stats
    }
}
