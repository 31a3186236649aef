//! XBee periodic sender
//!
//! Sends a fixed text message from a serial-attached XBee module to a
//! remote module on a fixed period, logging every attempt and transport
//! fault.

pub mod core;
pub mod hardware;
pub mod sender;
pub mod utils;
pub mod xbee;

// Re-export commonly used types
pub use crate::core::{MessagePayload, HELLO_MESSAGE};
pub use hardware::{CommError, CommResult, LinkSettings, MockLink, SerialLink, SerialPortLink};
pub use sender::{CancelToken, LogObserver, PeriodicSender, SendObserver, SendStats};
pub use utils::{ConfigError, SenderConfig};
pub use xbee::{
    ApiMode, FaultKind, RemoteXBeeDevice, XBee64BitAddress, XBeeDevice, XBeeError, XBeeResult,
};
