//! Mock serial link simulating a locally attached XBee module

use crate::hardware::{CommError, CommResult, SerialLink};
use crate::xbee::frame::{
    ApiMode, ApiPacket, AtCommandResponse, AtCommandStatus, DeliveryStatus, FrameReader,
    TransmitStatus, UNKNOWN_16BIT_ADDRESS,
};
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

/// Scripted outcome of the next transmit request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockReply {
    /// Answer with a successful transmit status
    Ack,
    /// Answer with the given delivery status
    Status(DeliveryStatus),
    /// Never answer
    Silent,
    /// Fail the write itself
    IoError,
}

/// In-memory XBee module for tests.
///
/// The mock decodes every frame written to it. It answers `AP` queries
/// with the configured operating mode and acknowledges transmit requests
/// according to the queued replies, defaulting to [`MockReply::Ack`].
pub struct MockLink {
    port: String,
    open: bool,
    fail_open: bool,
    open_count: u32,
    close_count: u32,
    api_mode: ApiMode,
    reported_mode: Option<u8>,
    replies: VecDeque<MockReply>,
    reader: FrameReader,
    written: Vec<ApiPacket>,
    rx: VecDeque<u8>,
}

impl MockLink {
    /// Create a mock module running in API mode 1
    pub fn new(port: impl Into<String>) -> Self {
        Self::with_mode(port, ApiMode::Api)
    }

    pub fn with_mode(port: impl Into<String>, api_mode: ApiMode) -> Self {
        let reported_mode = match api_mode {
            ApiMode::Api => 1,
            ApiMode::ApiEscaped => 2,
        };
        Self {
            port: port.into(),
            open: false,
            fail_open: false,
            open_count: 0,
            close_count: 0,
            api_mode,
            reported_mode: Some(reported_mode),
            replies: VecDeque::new(),
            reader: FrameReader::new(api_mode),
            written: Vec::new(),
            rx: VecDeque::new(),
        }
    }

    /// Make every open attempt fail as if the port did not exist
    pub fn fail_open(&mut self, fail: bool) {
        self.fail_open = fail;
    }

    /// Value returned for `AP` queries, or None to leave them unanswered
    pub fn report_operating_mode(&mut self, mode: Option<u8>) {
        self.reported_mode = mode;
    }

    pub fn queue_reply(&mut self, reply: MockReply) {
        self.replies.push_back(reply);
    }

    /// Queue an unsolicited frame for the host to read
    pub fn inject(&mut self, packet: &ApiPacket) {
        if let Ok(bytes) = packet.encode(self.api_mode) {
            self.rx.extend(bytes);
        }
    }

    /// Every packet written by the host, in order
    pub fn written_packets(&self) -> &[ApiPacket] {
        &self.written
    }

    /// RF payloads of all transmit requests received
    pub fn sent_payloads(&self) -> Vec<Vec<u8>> {
        self.written
            .iter()
            .filter_map(|packet| match packet {
                ApiPacket::TransmitRequest(request) => Some(request.data.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn open_count(&self) -> u32 {
        self.open_count
    }

    pub fn close_count(&self) -> u32 {
        self.close_count
    }

    fn respond(&mut self, packet: &ApiPacket) -> CommResult<()> {
        let response = match packet {
            ApiPacket::AtCommand(command) if &command.command == b"AP" => {
                let Some(mode) = self.reported_mode else {
                    return Ok(());
                };
                ApiPacket::AtCommandResponse(AtCommandResponse {
                    frame_id: command.frame_id,
                    command: command.command,
                    status: AtCommandStatus::Ok,
                    data: vec![mode],
                })
            }
            ApiPacket::AtCommand(command) => ApiPacket::AtCommandResponse(AtCommandResponse {
                frame_id: command.frame_id,
                command: command.command,
                status: AtCommandStatus::InvalidCommand,
                data: Vec::new(),
            }),
            ApiPacket::TransmitRequest(request) => {
                let delivery = match self.replies.pop_front().unwrap_or(MockReply::Ack) {
                    MockReply::Ack => DeliveryStatus::Success,
                    MockReply::Status(status) => status,
                    MockReply::Silent => return Ok(()),
                    MockReply::IoError => {
                        return Err(CommError::io(
                            &self.port,
                            io::Error::new(io::ErrorKind::BrokenPipe, "simulated write failure"),
                        ))
                    }
                };
                ApiPacket::TransmitStatus(TransmitStatus {
                    frame_id: request.frame_id,
                    dest16: UNKNOWN_16BIT_ADDRESS,
                    retries: 0,
                    delivery,
                    discovery: 0,
                })
            }
            _ => return Ok(()),
        };
        self.inject(&response);
        Ok(())
    }
}

impl SerialLink for MockLink {
    fn open(&mut self) -> CommResult<()> {
        if self.open {
            return Ok(());
        }
        if self.fail_open {
            return Err(CommError::open(
                &self.port,
                serialport::Error::new(serialport::ErrorKind::NoDevice, "simulated missing device"),
            ));
        }
        self.open = true;
        self.open_count += 1;
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.close_count += 1;
            self.rx.clear();
            self.reader.clear();
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write_all(&mut self, data: &[u8]) -> CommResult<()> {
        if !self.open {
            return Err(CommError::not_open(&self.port));
        }

        self.reader.push(data);
        while let Some(frame) = self.reader.next_frame() {
            // the host only ever writes well-formed frames
            let Ok(packet) = frame.and_then(|data| ApiPacket::parse(&data)) else {
                continue;
            };
            self.written.push(packet.clone());
            self.respond(&packet)?;
        }
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> CommResult<usize> {
        if !self.open {
            return Err(CommError::not_open(&self.port));
        }
        if self.rx.is_empty() {
            // stand in for the port's read timeout
            std::thread::sleep(Duration::from_millis(1));
            return Ok(0);
        }

        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn port_name(&self) -> &str {
        &self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xbee::frame::{AtCommand, TransmitRequest};
    use crate::xbee::XBee64BitAddress;

    fn read_packet(link: &mut MockLink) -> ApiPacket {
        let mut reader = FrameReader::new(ApiMode::Api);
        let mut buf = [0u8; 64];
        let n = link.read_available(&mut buf).unwrap();
        reader.push(&buf[..n]);
        ApiPacket::parse(&reader.next_frame().unwrap().unwrap()).unwrap()
    }

    fn transmit(link: &mut MockLink, frame_id: u8) -> CommResult<()> {
        let request = ApiPacket::TransmitRequest(TransmitRequest::new(
            frame_id,
            XBee64BitAddress::from_u64(1),
            b"ping".to_vec(),
        ));
        link.write_all(&request.encode(ApiMode::Api).unwrap())
    }

    #[test]
    fn test_mock_link_creation() {
        let link = MockLink::new("/dev/mock0");
        assert!(!link.is_open());
        assert_eq!(link.port_name(), "/dev/mock0");
        assert_eq!(link.open_count(), 0);
    }

    #[test]
    fn test_open_failure() {
        let mut link = MockLink::new("/dev/mock0");
        link.fail_open(true);
        assert!(matches!(link.open(), Err(CommError::Open { .. })));
        assert!(!link.is_open());
    }

    #[test]
    fn test_close_counts_only_open_links() {
        let mut link = MockLink::new("/dev/mock0");
        link.open().unwrap();
        link.close();
        link.close();
        assert_eq!(link.close_count(), 1);
    }

    #[test]
    fn test_answers_operating_mode_query() {
        let mut link = MockLink::new("/dev/mock0");
        link.open().unwrap();

        let query = ApiPacket::AtCommand(AtCommand {
            frame_id: 9,
            command: *b"AP",
            parameter: Vec::new(),
        });
        link.write_all(&query.encode(ApiMode::Api).unwrap()).unwrap();

        match read_packet(&mut link) {
            ApiPacket::AtCommandResponse(response) => {
                assert_eq!(response.frame_id, 9);
                assert_eq!(response.data, vec![1]);
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_scripted_transmit_replies() {
        let mut link = MockLink::new("/dev/mock0");
        link.open().unwrap();
        link.queue_reply(MockReply::Status(DeliveryStatus::MacAckFailure));
        link.queue_reply(MockReply::IoError);

        transmit(&mut link, 1).unwrap();
        match read_packet(&mut link) {
            ApiPacket::TransmitStatus(status) => {
                assert_eq!(status.delivery, DeliveryStatus::MacAckFailure)
            }
            other => panic!("unexpected packet {:?}", other),
        }

        assert!(matches!(transmit(&mut link, 2), Err(CommError::Io { .. })));

        transmit(&mut link, 3).unwrap();
        assert!(matches!(read_packet(&mut link), ApiPacket::TransmitStatus(s) if s.delivery.is_success()));
        assert_eq!(link.sent_payloads().len(), 3);
    }

    #[test]
    fn test_closed_link_rejects_io() {
        let mut link = MockLink::new("/dev/mock0");
        let mut buf = [0u8; 4];
        assert!(link.read_available(&mut buf).is_err());
        assert!(transmit(&mut link, 1).is_err());
    }
}
