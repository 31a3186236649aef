//! Core types and constants for the sender

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
