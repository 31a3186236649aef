//! Error taxonomy for device operations
//!
//! Errors are either fatal (the adapter cannot be opened, the peer address
//! cannot be parsed) or a recoverable [`TransportFault`] raised by a single
//! send attempt. The sender keeps running through recoverable faults.

use crate::hardware::CommError;
use crate::xbee::frame::{DeliveryStatus, FrameError};
use crate::xbee::AddressError;
use std::fmt;
use thiserror::Error;

/// Source of a recoverable transport fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// No transmit status arrived in time
    Timeout,
    /// The module reported a failed delivery
    Transmit,
    /// The module is not in an API operating mode
    InvalidOperatingMode,
    /// Any other device or link failure
    Device,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::Timeout => "timeout",
            FaultKind::Transmit => "transmit",
            FaultKind::InvalidOperatingMode => "invalid operating mode",
            FaultKind::Device => "device",
        };
        f.write_str(name)
    }
}

/// Failure of one transmit attempt
#[derive(Error, Debug)]
#[error("{kind} fault: {message}")]
pub struct TransportFault {
    pub kind: FaultKind,
    pub message: String,
    /// Delivery status for [`FaultKind::Transmit`] faults
    pub delivery: Option<DeliveryStatus>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            delivery: None,
            source: None,
        }
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }
}

#[derive(Error, Debug)]
pub enum XBeeError {
    /// The local adapter could not be opened
    #[error("failed to open XBee device: {0}")]
    Open(#[source] CommError),

    /// The remote address string is malformed
    #[error("invalid 64-bit address {input:?}: {source}")]
    InvalidAddress {
        input: String,
        #[source]
        source: AddressError,
    },

    #[error(transparent)]
    Transport(#[from] TransportFault),
}

impl XBeeError {
    pub fn timeout(timeout_ms: u128) -> Self {
        TransportFault::new(
            FaultKind::Timeout,
            format!("no transmit status within {}ms", timeout_ms),
        )
        .into()
    }

    pub fn transmit(delivery: DeliveryStatus) -> Self {
        let mut fault = TransportFault::new(
            FaultKind::Transmit,
            format!("delivery failed with status {}", delivery),
        );
        fault.delivery = Some(delivery);
        fault.into()
    }

    pub fn invalid_operating_mode(mode: impl fmt::Display) -> Self {
        TransportFault::new(
            FaultKind::InvalidOperatingMode,
            format!("operating mode {} does not accept API frames", mode),
        )
        .into()
    }

    pub fn device(message: impl Into<String>) -> Self {
        TransportFault::new(FaultKind::Device, message).into()
    }

    pub fn link(err: CommError) -> Self {
        TransportFault::new(FaultKind::Device, "serial link failure")
            .with_source(err)
            .into()
    }

    pub fn frame(err: FrameError) -> Self {
        TransportFault::new(FaultKind::Device, "undecodable frame from module")
            .with_source(err)
            .into()
    }

    /// Kind of the transport fault, if this is one
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            XBeeError::Transport(fault) => Some(fault.kind),
            _ => None,
        }
    }

    /// Recoverable errors leave the sender loop running
    pub fn is_recoverable(&self) -> bool {
        matches!(self, XBeeError::Transport(_))
    }
}

pub type XBeeResult<T> = Result<T, XBeeError>;
