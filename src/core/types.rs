//! Core data types for the sender

use crate::core::HELLO_MESSAGE;

/// Bytes of the fixed text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePayload(Vec<u8>);

impl MessagePayload {
    pub fn new() -> Self {
        Self(HELLO_MESSAGE.as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for MessagePayload {
    fn default() -> Self {
        Self::new()
    }
}
