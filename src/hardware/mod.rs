//! Hardware abstraction layer for the local radio adapter
//!
//! This module provides byte-level access to the serial port the XBee is
//! attached to, with a real `serialport` backend and a scripted mock.

pub mod error;
pub mod link;
pub mod mock;
pub mod serial;

pub use error::{CommError, CommResult};
pub use link::{LinkSettings, SerialLink};
pub use mock::{MockLink, MockReply};
pub use serial::SerialPortLink;
