//! XBee API frame codec
//!
//! Every API frame travels as
//!
//! ```text
//! 0x7E | length (u16, big endian) | frame data | checksum
//! ```
//!
//! where the checksum is `0xFF` minus the low byte of the sum of the frame
//! data. In escaped mode (API mode 2) every byte after the start delimiter
//! that collides with a control character is sent as `0x7D, byte ^ 0x20`.

use crate::xbee::XBee64BitAddress;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

pub const START_DELIMITER: u8 = 0x7E;
const ESCAPE: u8 = 0x7D;
const XON: u8 = 0x11;
const XOFF: u8 = 0x13;
const ESCAPE_XOR: u8 = 0x20;

/// API frame type identifiers
pub mod api_id {
    pub const AT_COMMAND: u8 = 0x08;
    pub const TRANSMIT_REQUEST: u8 = 0x10;
    pub const AT_COMMAND_RESPONSE: u8 = 0x88;
    pub const TRANSMIT_STATUS: u8 = 0x8B;
}

/// 16-bit destination meaning "resolve by 64-bit address"
pub const UNKNOWN_16BIT_ADDRESS: u16 = 0xFFFE;

/// Framing variant used on the serial line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiMode {
    /// API mode 1, no escaping
    #[default]
    Api,
    /// API mode 2, control characters escaped
    ApiEscaped,
}

impl fmt::Display for ApiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiMode::Api => write!(f, "API"),
            ApiMode::ApiEscaped => write!(f, "API escaped"),
        }
    }
}

/// Errors decoding a frame or its payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("checksum mismatch: expected 0x{expected:02X}, received 0x{received:02X}")]
    Checksum { expected: u8, received: u8 },
    #[error("frame carries no data")]
    Empty,
    #[error("frame 0x{api_id:02X} too short: {len} bytes, need {min}")]
    TooShort { api_id: u8, len: usize, min: usize },
    #[error("payload of {len} bytes does not fit in one frame")]
    TooLong { len: usize },
}

pub type FrameResult<T> = Result<T, FrameError>;

pub fn checksum(frame_data: &[u8]) -> u8 {
    0xFF - frame_data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

fn needs_escape(byte: u8) -> bool {
    matches!(byte, START_DELIMITER | ESCAPE | XON | XOFF)
}

/// Wrap frame data with delimiter, length and checksum
pub fn encode_frame(frame_data: &[u8], mode: ApiMode) -> FrameResult<Vec<u8>> {
    let len = u16::try_from(frame_data.len()).map_err(|_| FrameError::TooLong {
        len: frame_data.len(),
    })?;

    let mut body = Vec::with_capacity(frame_data.len() + 3);
    body.extend_from_slice(&len.to_be_bytes());
    body.extend_from_slice(frame_data);
    body.push(checksum(frame_data));

    let mut encoded = Vec::with_capacity(body.len() + 1);
    encoded.push(START_DELIMITER);
    match mode {
        ApiMode::Api => encoded.extend_from_slice(&body),
        ApiMode::ApiEscaped => {
            for byte in body {
                if needs_escape(byte) {
                    encoded.push(ESCAPE);
                    encoded.push(byte ^ ESCAPE_XOR);
                } else {
                    encoded.push(byte);
                }
            }
        }
    }
    Ok(encoded)
}

/// Incremental frame decoder for bytes read off the serial line.
///
/// Bytes outside a frame are dropped until the next start delimiter.
/// In escaped mode an unescaped `0x7E` always starts a new frame, which
/// discards any frame cut short by line noise.
#[derive(Debug)]
pub struct FrameReader {
    mode: ApiMode,
    in_frame: bool,
    escape_next: bool,
    current: Vec<u8>,
    ready: VecDeque<FrameResult<Vec<u8>>>,
}

impl FrameReader {
    pub fn new(mode: ApiMode) -> Self {
        Self {
            mode,
            in_frame: false,
            escape_next: false,
            current: Vec::with_capacity(128),
            ready: VecDeque::new(),
        }
    }

    /// Switch framing mode, dropping any partial state
    pub fn set_mode(&mut self, mode: ApiMode) {
        self.mode = mode;
        self.clear();
    }

    pub fn clear(&mut self) {
        self.in_frame = false;
        self.escape_next = false;
        self.current.clear();
        self.ready.clear();
    }

    pub fn push(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push_byte(byte);
        }
    }

    /// Next complete frame, as its frame data, in arrival order
    pub fn next_frame(&mut self) -> Option<FrameResult<Vec<u8>>> {
        self.ready.pop_front()
    }

    fn start_frame(&mut self) {
        self.in_frame = true;
        self.escape_next = false;
        self.current.clear();
    }

    fn push_byte(&mut self, mut byte: u8) {
        let escaped = self.mode == ApiMode::ApiEscaped;

        if escaped && byte == START_DELIMITER {
            self.start_frame();
            return;
        }
        if !self.in_frame {
            if byte == START_DELIMITER {
                self.start_frame();
            }
            return;
        }
        if escaped {
            if byte == ESCAPE {
                self.escape_next = true;
                return;
            }
            if self.escape_next {
                byte ^= ESCAPE_XOR;
                self.escape_next = false;
            }
        }

        self.current.push(byte);
        if self.current.len() < 2 {
            return;
        }

        let len = usize::from(u16::from_be_bytes([self.current[0], self.current[1]]));
        if self.current.len() == len + 3 {
            self.finish_frame(len);
        }
    }

    fn finish_frame(&mut self, len: usize) {
        self.in_frame = false;
        let data = self.current[2..2 + len].to_vec();
        let received = self.current[2 + len];
        self.current.clear();

        let expected = checksum(&data);
        let result = if len == 0 {
            Err(FrameError::Empty)
        } else if expected != received {
            Err(FrameError::Checksum { expected, received })
        } else {
            Ok(data)
        };
        self.ready.push_back(result);
    }
}

/// Rolling frame identifier. Zero is skipped because a frame ID of zero
/// tells the module not to answer with a status frame.
#[derive(Debug, Clone)]
pub struct FrameIdCounter {
    last: u8,
}

impl FrameIdCounter {
    pub fn new() -> Self {
        Self { last: 0 }
    }

    pub fn next_id(&mut self) -> u8 {
        self.last = if self.last == u8::MAX { 1 } else { self.last + 1 };
        self.last
    }
}

impl Default for FrameIdCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Delivery result reported in a transmit status frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Success,
    MacAckFailure,
    CcaFailure,
    InvalidDestinationEndpoint,
    NetworkAckFailure,
    NotJoinedToNetwork,
    SelfAddressed,
    AddressNotFound,
    RouteNotFound,
    BroadcastSourceFailed,
    ResourceError,
    PayloadTooLarge,
    Other(u8),
}

impl DeliveryStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::Success,
            0x01 => Self::MacAckFailure,
            0x02 => Self::CcaFailure,
            0x15 => Self::InvalidDestinationEndpoint,
            0x21 => Self::NetworkAckFailure,
            0x22 => Self::NotJoinedToNetwork,
            0x23 => Self::SelfAddressed,
            0x24 => Self::AddressNotFound,
            0x25 => Self::RouteNotFound,
            0x26 => Self::BroadcastSourceFailed,
            0x2C => Self::ResourceError,
            0x74 => Self::PayloadTooLarge,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Success => 0x00,
            Self::MacAckFailure => 0x01,
            Self::CcaFailure => 0x02,
            Self::InvalidDestinationEndpoint => 0x15,
            Self::NetworkAckFailure => 0x21,
            Self::NotJoinedToNetwork => 0x22,
            Self::SelfAddressed => 0x23,
            Self::AddressNotFound => 0x24,
            Self::RouteNotFound => 0x25,
            Self::BroadcastSourceFailed => 0x26,
            Self::ResourceError => 0x2C,
            Self::PayloadTooLarge => 0x74,
            Self::Other(code) => *code,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == Self::Success
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::MacAckFailure => "MAC ACK failure",
            Self::CcaFailure => "CCA failure",
            Self::InvalidDestinationEndpoint => "invalid destination endpoint",
            Self::NetworkAckFailure => "network ACK failure",
            Self::NotJoinedToNetwork => "not joined to network",
            Self::SelfAddressed => "self-addressed",
            Self::AddressNotFound => "address not found",
            Self::RouteNotFound => "route not found",
            Self::BroadcastSourceFailed => "broadcast source failed to hear a neighbor relay",
            Self::ResourceError => "resource error",
            Self::PayloadTooLarge => "payload too large",
            Self::Other(_) => "unknown status",
        };
        write!(f, "{} (0x{:02X})", name, self.code())
    }
}

/// Status byte of a local AT command response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtCommandStatus {
    Ok,
    Error,
    InvalidCommand,
    InvalidParameter,
    TxFailure,
    Other(u8),
}

impl AtCommandStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::Error,
            2 => Self::InvalidCommand,
            3 => Self::InvalidParameter,
            4 => Self::TxFailure,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Error => 1,
            Self::InvalidCommand => 2,
            Self::InvalidParameter => 3,
            Self::TxFailure => 4,
            Self::Other(code) => *code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitRequest {
    pub frame_id: u8,
    pub dest64: XBee64BitAddress,
    pub dest16: u16,
    pub broadcast_radius: u8,
    pub options: u8,
    pub data: Vec<u8>,
}

impl TransmitRequest {
    /// Unicast to a 64-bit address with default radius and options
    pub fn new(frame_id: u8, dest64: XBee64BitAddress, data: Vec<u8>) -> Self {
        Self {
            frame_id,
            dest64,
            dest16: UNKNOWN_16BIT_ADDRESS,
            broadcast_radius: 0,
            options: 0,
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitStatus {
    pub frame_id: u8,
    pub dest16: u16,
    pub retries: u8,
    pub delivery: DeliveryStatus,
    pub discovery: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtCommand {
    pub frame_id: u8,
    pub command: [u8; 2],
    pub parameter: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtCommandResponse {
    pub frame_id: u8,
    pub command: [u8; 2],
    pub status: AtCommandStatus,
    pub data: Vec<u8>,
}

/// Typed view of the frame data of one API frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiPacket {
    TransmitRequest(TransmitRequest),
    TransmitStatus(TransmitStatus),
    AtCommand(AtCommand),
    AtCommandResponse(AtCommandResponse),
    /// Any frame type the sender does not interpret
    Unsupported { api_id: u8, data: Vec<u8> },
}

fn require(frame_data: &[u8], min: usize) -> FrameResult<()> {
    if frame_data.len() < min {
        return Err(FrameError::TooShort {
            api_id: frame_data[0],
            len: frame_data.len(),
            min,
        });
    }
    Ok(())
}

impl ApiPacket {
    /// Decode frame data as produced by [`FrameReader`]
    pub fn parse(frame_data: &[u8]) -> FrameResult<Self> {
        let Some(&id) = frame_data.first() else {
            return Err(FrameError::Empty);
        };

        let packet = match id {
            api_id::TRANSMIT_REQUEST => {
                require(frame_data, 14)?;
                let mut dest64 = [0u8; 8];
                dest64.copy_from_slice(&frame_data[2..10]);
                ApiPacket::TransmitRequest(TransmitRequest {
                    frame_id: frame_data[1],
                    dest64: XBee64BitAddress::new(dest64),
                    dest16: u16::from_be_bytes([frame_data[10], frame_data[11]]),
                    broadcast_radius: frame_data[12],
                    options: frame_data[13],
                    data: frame_data[14..].to_vec(),
                })
            }
            api_id::TRANSMIT_STATUS => {
                require(frame_data, 7)?;
                ApiPacket::TransmitStatus(TransmitStatus {
                    frame_id: frame_data[1],
                    dest16: u16::from_be_bytes([frame_data[2], frame_data[3]]),
                    retries: frame_data[4],
                    delivery: DeliveryStatus::from_code(frame_data[5]),
                    discovery: frame_data[6],
                })
            }
            api_id::AT_COMMAND => {
                require(frame_data, 4)?;
                ApiPacket::AtCommand(AtCommand {
                    frame_id: frame_data[1],
                    command: [frame_data[2], frame_data[3]],
                    parameter: frame_data[4..].to_vec(),
                })
            }
            api_id::AT_COMMAND_RESPONSE => {
                require(frame_data, 5)?;
                ApiPacket::AtCommandResponse(AtCommandResponse {
                    frame_id: frame_data[1],
                    command: [frame_data[2], frame_data[3]],
                    status: AtCommandStatus::from_code(frame_data[4]),
                    data: frame_data[5..].to_vec(),
                })
            }
            other => ApiPacket::Unsupported {
                api_id: other,
                data: frame_data[1..].to_vec(),
            },
        };
        Ok(packet)
    }

    pub fn api_id(&self) -> u8 {
        match self {
            ApiPacket::TransmitRequest(_) => api_id::TRANSMIT_REQUEST,
            ApiPacket::TransmitStatus(_) => api_id::TRANSMIT_STATUS,
            ApiPacket::AtCommand(_) => api_id::AT_COMMAND,
            ApiPacket::AtCommandResponse(_) => api_id::AT_COMMAND_RESPONSE,
            ApiPacket::Unsupported { api_id, .. } => *api_id,
        }
    }

    pub fn frame_id(&self) -> Option<u8> {
        match self {
            ApiPacket::TransmitRequest(p) => Some(p.frame_id),
            ApiPacket::TransmitStatus(p) => Some(p.frame_id),
            ApiPacket::AtCommand(p) => Some(p.frame_id),
            ApiPacket::AtCommandResponse(p) => Some(p.frame_id),
            ApiPacket::Unsupported { .. } => None,
        }
    }

    /// Serialize to frame data, API identifier first
    pub fn frame_data(&self) -> Vec<u8> {
        let mut out = vec![self.api_id()];
        match self {
            ApiPacket::TransmitRequest(p) => {
                out.push(p.frame_id);
                out.extend_from_slice(p.dest64.as_bytes());
                out.extend_from_slice(&p.dest16.to_be_bytes());
                out.push(p.broadcast_radius);
                out.push(p.options);
                out.extend_from_slice(&p.data);
            }
            ApiPacket::TransmitStatus(p) => {
                out.push(p.frame_id);
                out.extend_from_slice(&p.dest16.to_be_bytes());
                out.push(p.retries);
                out.push(p.delivery.code());
                out.push(p.discovery);
            }
            ApiPacket::AtCommand(p) => {
                out.push(p.frame_id);
                out.extend_from_slice(&p.command);
                out.extend_from_slice(&p.parameter);
            }
            ApiPacket::AtCommandResponse(p) => {
                out.push(p.frame_id);
                out.extend_from_slice(&p.command);
                out.push(p.status.code());
                out.extend_from_slice(&p.data);
            }
            ApiPacket::Unsupported { data, .. } => out.extend_from_slice(data),
        }
        out
    }

    /// Full wire encoding including delimiter and checksum
    pub fn encode(&self, mode: ApiMode) -> FrameResult<Vec<u8>> {
        encode_frame(&self.frame_data(), mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote() -> XBee64BitAddress {
        XBee64BitAddress::from_u64(0x0013_A200_4172_3B63)
    }

    #[test]
    fn test_checksum_matches_datasheet_example() {
        // AT command "NJ" with frame ID 0x52, from the module reference manual
        let frame_data = [0x08, 0x52, 0x4E, 0x4A];
        assert_eq!(checksum(&frame_data), 0x0D);

        let encoded = encode_frame(&frame_data, ApiMode::Api).unwrap();
        assert_eq!(encoded, vec![0x7E, 0x00, 0x04, 0x08, 0x52, 0x4E, 0x4A, 0x0D]);
    }

    #[test]
    fn test_transmit_request_layout() {
        let packet = ApiPacket::TransmitRequest(TransmitRequest::new(1, remote(), b"Hi".to_vec()));
        let encoded = packet.encode(ApiMode::Api).unwrap();

        assert_eq!(encoded[0], START_DELIMITER);
        assert_eq!(u16::from_be_bytes([encoded[1], encoded[2]]), 16);
        assert_eq!(encoded[3], api_id::TRANSMIT_REQUEST);
        assert_eq!(encoded[4], 1);
        assert_eq!(&encoded[5..13], remote().as_bytes());
        assert_eq!(&encoded[13..15], &[0xFF, 0xFE]);
        assert_eq!(&encoded[17..19], b"Hi");
        assert_eq!(*encoded.last().unwrap(), checksum(&encoded[3..encoded.len() - 1]));
    }

    #[test]
    fn test_escaped_encoding_escapes_control_bytes() {
        let frame_data = [0x10, 0x7E, 0x7D, 0x11, 0x13, 0x20];
        let encoded = encode_frame(&frame_data, ApiMode::ApiEscaped).unwrap();

        // only the start delimiter may appear unescaped
        assert_eq!(encoded.iter().filter(|&&b| b == START_DELIMITER).count(), 1);
        assert!(encoded[1..].windows(2).any(|w| w == [0x7D, 0x5E]));
        assert!(encoded[1..].windows(2).any(|w| w == [0x7D, 0x5D]));
        assert!(encoded[1..].windows(2).any(|w| w == [0x7D, 0x31]));
        assert!(encoded[1..].windows(2).any(|w| w == [0x7D, 0x33]));
    }

    #[test]
    fn test_reader_handles_split_input_and_garbage() {
        let frame = encode_frame(&[0x8B, 0x01, 0xFF, 0xFE, 0x00, 0x00, 0x00], ApiMode::Api).unwrap();
        let mut reader = FrameReader::new(ApiMode::Api);

        reader.push(&[0x00, 0x42]);
        reader.push(&frame[..4]);
        assert!(reader.next_frame().is_none());

        reader.push(&frame[4..]);
        let data = reader.next_frame().unwrap().unwrap();
        assert_eq!(data, vec![0x8B, 0x01, 0xFF, 0xFE, 0x00, 0x00, 0x00]);
        assert!(reader.next_frame().is_none());
    }

    #[test]
    fn test_reader_yields_back_to_back_frames_in_order() {
        let mut stream = encode_frame(&[0x88, 0x01, b'A', b'P', 0x00, 0x01], ApiMode::ApiEscaped).unwrap();
        stream.extend(encode_frame(&[0x8B, 0x02, 0xFF, 0xFE, 0x00, 0x00, 0x00], ApiMode::ApiEscaped).unwrap());

        let mut reader = FrameReader::new(ApiMode::ApiEscaped);
        reader.push(&stream);

        let first = ApiPacket::parse(&reader.next_frame().unwrap().unwrap()).unwrap();
        let second = ApiPacket::parse(&reader.next_frame().unwrap().unwrap()).unwrap();
        assert_eq!(first.api_id(), api_id::AT_COMMAND_RESPONSE);
        assert_eq!(second.frame_id(), Some(2));
    }

    #[test]
    fn test_reader_unescapes_control_bytes() {
        let frame_data = vec![0x10, 0x7E, 0x7D, 0x11, 0x13];
        let encoded = encode_frame(&frame_data, ApiMode::ApiEscaped).unwrap();

        let mut reader = FrameReader::new(ApiMode::ApiEscaped);
        reader.push(&encoded);
        assert_eq!(reader.next_frame().unwrap().unwrap(), frame_data);
    }

    #[test]
    fn test_reader_reports_checksum_error_and_recovers() {
        let mut bad = encode_frame(&[0x8B, 0x01, 0xFF, 0xFE, 0x00, 0x00, 0x00], ApiMode::Api).unwrap();
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;
        let good = encode_frame(&[0x8B, 0x02, 0xFF, 0xFE, 0x00, 0x00, 0x00], ApiMode::Api).unwrap();

        let mut reader = FrameReader::new(ApiMode::Api);
        reader.push(&bad);
        reader.push(&good);

        assert!(matches!(reader.next_frame(), Some(Err(FrameError::Checksum { .. }))));
        let recovered = ApiPacket::parse(&reader.next_frame().unwrap().unwrap()).unwrap();
        assert_eq!(recovered.frame_id(), Some(2));
    }

    #[test]
    fn test_parse_transmit_status() {
        let packet = ApiPacket::parse(&[0x8B, 0x07, 0x12, 0x34, 0x02, 0x21, 0x00]).unwrap();
        match packet {
            ApiPacket::TransmitStatus(status) => {
                assert_eq!(status.frame_id, 7);
                assert_eq!(status.dest16, 0x1234);
                assert_eq!(status.retries, 2);
                assert_eq!(status.delivery, DeliveryStatus::NetworkAckFailure);
                assert!(!status.delivery.is_success());
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_truncated_packets() {
        assert_eq!(
            ApiPacket::parse(&[0x8B, 0x01, 0x00]),
            Err(FrameError::TooShort {
                api_id: 0x8B,
                len: 3,
                min: 7
            })
        );
        assert_eq!(ApiPacket::parse(&[]), Err(FrameError::Empty));
    }

    #[test]
    fn test_unknown_frame_type_is_kept() {
        let packet = ApiPacket::parse(&[0x8A, 0x06]).unwrap();
        assert_eq!(
            packet,
            ApiPacket::Unsupported {
                api_id: 0x8A,
                data: vec![0x06]
            }
        );
        assert_eq!(packet.frame_id(), None);
    }

    #[test]
    fn test_frame_id_counter_skips_zero() {
        let mut counter = FrameIdCounter::new();
        assert_eq!(counter.next_id(), 1);
        for _ in 0..253 {
            counter.next_id();
        }
        assert_eq!(counter.next_id(), 255);
        assert_eq!(counter.next_id(), 1);
    }

    #[test]
    fn test_delivery_status_codes() {
        assert_eq!(DeliveryStatus::from_code(0x00), DeliveryStatus::Success);
        assert_eq!(DeliveryStatus::from_code(0x99), DeliveryStatus::Other(0x99));
        assert_eq!(DeliveryStatus::RouteNotFound.code(), 0x25);
        assert!(DeliveryStatus::MacAckFailure.to_string().contains("0x01"));
    }
}
