//! 64-bit hardware addresses

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reasons a hex string is not a valid 64-bit address
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,
    #[error("address has {digits} hex digits, at most 16 allowed")]
    TooLong { digits: usize },
    #[error("invalid hex character {character:?} at position {position}")]
    InvalidCharacter { character: char, position: usize },
}

/// 64-bit IEEE address of an XBee module, most significant byte first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct XBee64BitAddress([u8; 8]);

impl XBee64BitAddress {
    /// Address every node on the network receives
    pub const BROADCAST: Self = Self([0, 0, 0, 0, 0, 0, 0xFF, 0xFF]);
    /// Placeholder used when the address is not known
    pub const UNKNOWN: Self = Self([0xFF; 8]);
    /// Address of the network coordinator
    pub const COORDINATOR: Self = Self([0; 8]);

    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    pub const fn from_u64(value: u64) -> Self {
        Self(value.to_be_bytes())
    }

    /// Parse an address from 1 to 16 hex digits with an optional `0x` prefix.
    ///
    /// Shorter inputs are left padded with zeros, so `"FFFF"` is the broadcast
    /// address. Parsing is case-insensitive.
    pub fn from_hex_string(input: &str) -> Result<Self, AddressError> {
        let digits = input
            .strip_prefix("0x")
            .or_else(|| input.strip_prefix("0X"))
            .unwrap_or(input);

        if digits.is_empty() {
            return Err(AddressError::Empty);
        }
        if digits.len() > 16 {
            return Err(AddressError::TooLong {
                digits: digits.len(),
            });
        }

        let mut value: u64 = 0;
        for (position, character) in digits.chars().enumerate() {
            let nibble = character
                .to_digit(16)
                .ok_or(AddressError::InvalidCharacter {
                    character,
                    position,
                })?;
            value = (value << 4) | u64::from(nibble);
        }

        Ok(Self::from_u64(value))
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    pub fn to_u64(self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for XBee64BitAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for XBee64BitAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex_string(s)
    }
}

impl TryFrom<String> for XBee64BitAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex_string(&value)
    }
}

impl From<XBee64BitAddress> for String {
    fn from(address: XBee64BitAddress) -> Self {
        address.to_string()
    }
}
