//! Minimal XBee API layer: addressing, frame codec and device handle

pub mod address;
pub mod device;
pub mod error;
pub mod frame;

pub use address::{AddressError, XBee64BitAddress};
pub use device::{OperatingMode, RemoteXBeeDevice, XBeeDevice};
pub use error::{FaultKind, TransportFault, XBeeError, XBeeResult};
pub use frame::{ApiMode, ApiPacket, DeliveryStatus, FrameError, TransmitStatus};
