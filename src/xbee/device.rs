//! Local XBee device handle and remote peer reference

use crate::hardware::SerialLink;
use crate::xbee::frame::{
    ApiMode, ApiPacket, AtCommand, AtCommandResponse, AtCommandStatus, FrameIdCounter,
    FrameReader, TransmitRequest, TransmitStatus,
};
use crate::xbee::{XBee64BitAddress, XBeeError, XBeeResult};
use log::{debug, info, warn};
use std::fmt;
use std::time::{Duration, Instant};

/// Operating mode reported by the module's `AP` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    /// AT / transparent mode, API frames are not understood
    Transparent,
    Api,
    ApiEscaped,
    /// Not probed yet, or the module did not answer
    Unknown,
}

impl OperatingMode {
    pub fn from_ap(value: u8) -> Self {
        match value {
            0 => Self::Transparent,
            1 => Self::Api,
            2 => Self::ApiEscaped,
            _ => Self::Unknown,
        }
    }

    /// Framing to use for this mode, if it speaks API frames at all
    pub fn api_mode(&self) -> Option<ApiMode> {
        match self {
            Self::Api => Some(ApiMode::Api),
            Self::ApiEscaped => Some(ApiMode::ApiEscaped),
            Self::Transparent | Self::Unknown => None,
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transparent => "transparent",
            Self::Api => "API",
            Self::ApiEscaped => "API escaped",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A remote module addressed by its 64-bit address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteXBeeDevice {
    address: XBee64BitAddress,
}

impl RemoteXBeeDevice {
    pub fn new(address: XBee64BitAddress) -> Self {
        Self { address }
    }

    /// Resolve a peer from its hex address
    pub fn from_hex_string(input: &str) -> XBeeResult<Self> {
        let address = XBee64BitAddress::from_hex_string(input).map_err(|source| {
            XBeeError::InvalidAddress {
                input: input.to_string(),
                source,
            }
        })?;
        Ok(Self::new(address))
    }

    pub fn get_64bit_addr(&self) -> XBee64BitAddress {
        self.address
    }
}

/// Handle to the locally attached XBee module.
///
/// The handle owns its serial link. It is closed on drop, and closing an
/// already closed handle does nothing.
pub struct XBeeDevice<L: SerialLink> {
    link: L,
    api_mode: ApiMode,
    operating_mode: OperatingMode,
    sync_timeout: Duration,
    frame_ids: FrameIdCounter,
    reader: FrameReader,
}

impl<L: SerialLink> XBeeDevice<L> {
    pub fn new(link: L, api_mode: ApiMode, sync_timeout: Duration) -> Self {
        Self {
            link,
            api_mode,
            operating_mode: OperatingMode::Unknown,
            sync_timeout,
            frame_ids: FrameIdCounter::new(),
            reader: FrameReader::new(api_mode),
        }
    }

    /// Open the link and probe the module's operating mode.
    ///
    /// Only a link failure is an error. A module that does not answer the
    /// probe is left in [`OperatingMode::Unknown`] and sends will be refused.
    pub fn open(&mut self) -> XBeeResult<()> {
        if self.link.is_open() {
            return Ok(());
        }

        self.link.open().map_err(XBeeError::Open)?;
        self.reader.set_mode(self.api_mode);

        self.operating_mode = self.probe_operating_mode();
        match self.operating_mode.api_mode() {
            Some(mode) if mode != self.api_mode => {
                info!("module reports {} mode, switching framing", self.operating_mode);
                self.api_mode = mode;
                self.reader.set_mode(mode);
            }
            Some(_) => debug!("{} running in {} mode", self.link.port_name(), self.operating_mode),
            None => warn!(
                "{} operating mode is {}, API frames will not be sent",
                self.link.port_name(),
                self.operating_mode
            ),
        }
        Ok(())
    }

    /// Close the link if it is open
    pub fn close(&mut self) {
        if self.link.is_open() {
            self.link.close();
            self.reader.clear();
            self.operating_mode = OperatingMode::Unknown;
        }
    }

    pub fn is_open(&self) -> bool {
        self.link.is_open()
    }

    pub fn operating_mode(&self) -> OperatingMode {
        self.operating_mode
    }

    pub fn api_mode(&self) -> ApiMode {
        self.api_mode
    }

    pub fn port_name(&self) -> &str {
        self.link.port_name()
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Send `data` to `remote` and wait for its transmit status.
    ///
    /// Every failure is a recoverable transport fault.
    pub fn send_data(&mut self, remote: &RemoteXBeeDevice, data: &[u8]) -> XBeeResult<TransmitStatus> {
        if !self.link.is_open() {
            return Err(XBeeError::device(format!(
                "serial port {} is closed",
                self.link.port_name()
            )));
        }
        if self.operating_mode.api_mode().is_none() {
            return Err(XBeeError::invalid_operating_mode(self.operating_mode));
        }

        let frame_id = self.frame_ids.next_id();
        let request = TransmitRequest::new(frame_id, remote.get_64bit_addr(), data.to_vec());
        self.write_packet(&ApiPacket::TransmitRequest(request))?;

        let status = self.wait_for(|packet| match packet {
            ApiPacket::TransmitStatus(status) if status.frame_id == frame_id => Some(status),
            _ => None,
        })?;

        if !status.delivery.is_success() {
            return Err(XBeeError::transmit(status.delivery));
        }
        debug!(
            "frame {} delivered to {} after {} retries",
            frame_id,
            remote.get_64bit_addr(),
            status.retries
        );
        Ok(status)
    }

    /// Run a local AT command and return the module's response
    pub fn send_at_command(&mut self, command: [u8; 2], parameter: &[u8]) -> XBeeResult<AtCommandResponse> {
        let frame_id = self.frame_ids.next_id();
        self.write_packet(&ApiPacket::AtCommand(AtCommand {
            frame_id,
            command,
            parameter: parameter.to_vec(),
        }))?;

        self.wait_for(|packet| match packet {
            ApiPacket::AtCommandResponse(response) if response.frame_id == frame_id => Some(response),
            _ => None,
        })
    }

    fn probe_operating_mode(&mut self) -> OperatingMode {
        match self.send_at_command(*b"AP", &[]) {
            Ok(response) if response.status == AtCommandStatus::Ok => response
                .data
                .last()
                .map(|&value| OperatingMode::from_ap(value))
                .unwrap_or(OperatingMode::Unknown),
            Ok(response) => {
                debug!("AP query rejected with {:?}", response.status);
                OperatingMode::Unknown
            }
            Err(e) => {
                debug!("AP query failed: {}", e);
                OperatingMode::Unknown
            }
        }
    }

    fn write_packet(&mut self, packet: &ApiPacket) -> XBeeResult<()> {
        let bytes = packet.encode(self.api_mode).map_err(XBeeError::frame)?;
        self.link.write_all(&bytes).map_err(XBeeError::link)
    }

    /// Read frames until `matcher` accepts one or the sync timeout expires
    fn wait_for<T>(&mut self, mut matcher: impl FnMut(ApiPacket) -> Option<T>) -> XBeeResult<T> {
        let deadline = Instant::now() + self.sync_timeout;
        let mut buf = [0u8; 256];

        loop {
            while let Some(frame) = self.reader.next_frame() {
                let data = frame.map_err(XBeeError::frame)?;
                let packet = ApiPacket::parse(&data).map_err(XBeeError::frame)?;
                let api_id = packet.api_id();
                match matcher(packet) {
                    Some(found) => return Ok(found),
                    None => debug!("skipping frame 0x{:02X}", api_id),
                }
            }

            if Instant::now() >= deadline {
                return Err(XBeeError::timeout(self.sync_timeout.as_millis()));
            }

            let n = self.link.read_available(&mut buf).map_err(XBeeError::link)?;
            self.reader.push(&buf[..n]);
        }
    }
}

impl<L: SerialLink> Drop for XBeeDevice<L> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{MockLink, MockReply};
    use crate::xbee::frame::DeliveryStatus;
    use crate::xbee::FaultKind;

    const REMOTE: &str = "0013A20041723B63";

    fn device_with(link: MockLink) -> XBeeDevice<MockLink> {
        XBeeDevice::new(link, ApiMode::Api, Duration::from_millis(50))
    }

    fn opened() -> XBeeDevice<MockLink> {
        let mut device = device_with(MockLink::new("/dev/mock0"));
        device.open().unwrap();
        device
    }

    fn remote() -> RemoteXBeeDevice {
        RemoteXBeeDevice::from_hex_string(REMOTE).unwrap()
    }

    #[test]
    fn test_open_probes_operating_mode() {
        let device = opened();
        assert!(device.is_open());
        assert_eq!(device.operating_mode(), OperatingMode::Api);
        assert!(matches!(
            &device.link().written_packets()[0],
            ApiPacket::AtCommand(command) if &command.command == b"AP"
        ));
    }

    #[test]
    fn test_open_failure_is_open_error() {
        let mut link = MockLink::new("/dev/mock0");
        link.fail_open(true);
        let mut device = device_with(link);

        let err = device.open().unwrap_err();
        assert!(matches!(err, XBeeError::Open(_)));
        assert!(!err.is_recoverable());
        assert!(!device.is_open());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut device = opened();
        device.close();
        device.close();
        assert!(!device.is_open());
        assert_eq!(device.link().close_count(), 1);

        let mut never_opened = device_with(MockLink::new("/dev/mock1"));
        never_opened.close();
        assert!(!never_opened.is_open());
    }

    #[test]
    fn test_reopen_after_close() {
        let mut device = opened();
        device.close();
        device.open().unwrap();
        assert!(device.is_open());
        assert_eq!(device.link().open_count(), 2);
    }

    #[test]
    fn test_send_data_success() {
        let mut device = opened();
        let status = device.send_data(&remote(), b"Hello Xbee").unwrap();

        assert!(status.delivery.is_success());
        assert_eq!(device.link().sent_payloads(), vec![b"Hello Xbee".to_vec()]);
        match device.link().written_packets().last().unwrap() {
            ApiPacket::TransmitRequest(request) => assert_eq!(request.dest64, remote().get_64bit_addr()),
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_send_data_delivery_failure() {
        let mut device = opened();
        device
            .link_mut()
            .queue_reply(MockReply::Status(DeliveryStatus::AddressNotFound));

        let err = device.send_data(&remote(), b"x").unwrap_err();
        assert_eq!(err.fault_kind(), Some(FaultKind::Transmit));
    }

    #[test]
    fn test_send_data_timeout() {
        let mut device = opened();
        device.link_mut().queue_reply(MockReply::Silent);

        let started = Instant::now();
        let err = device.send_data(&remote(), b"x").unwrap_err();
        assert_eq!(err.fault_kind(), Some(FaultKind::Timeout));
        assert!(started.elapsed() >= Duration::from_millis(50));

        // the device stays usable after a timeout
        assert!(device.send_data(&remote(), b"y").is_ok());
    }

    #[test]
    fn test_send_data_link_failure() {
        let mut device = opened();
        device.link_mut().queue_reply(MockReply::IoError);

        let err = device.send_data(&remote(), b"x").unwrap_err();
        assert_eq!(err.fault_kind(), Some(FaultKind::Device));
    }

    #[test]
    fn test_send_on_closed_device() {
        let mut device = opened();
        device.close();
        let err = device.send_data(&remote(), b"x").unwrap_err();
        assert_eq!(err.fault_kind(), Some(FaultKind::Device));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_transparent_module_refuses_send() {
        let mut link = MockLink::new("/dev/mock0");
        link.report_operating_mode(Some(0));
        let mut device = device_with(link);
        device.open().unwrap();

        assert_eq!(device.operating_mode(), OperatingMode::Transparent);
        let err = device.send_data(&remote(), b"x").unwrap_err();
        assert_eq!(err.fault_kind(), Some(FaultKind::InvalidOperatingMode));
        assert!(device.link().sent_payloads().is_empty());
    }

    #[test]
    fn test_silent_module_is_unknown_mode() {
        let mut link = MockLink::new("/dev/mock0");
        link.report_operating_mode(None);
        let mut device = device_with(link);

        device.open().unwrap();
        assert!(device.is_open());
        assert_eq!(device.operating_mode(), OperatingMode::Unknown);
    }

    #[test]
    fn test_adopts_escaped_mode_reported_by_module() {
        let link = MockLink::with_mode("/dev/mock0", ApiMode::ApiEscaped);
        let mut device = device_with(link);
        device.open().unwrap();

        assert_eq!(device.operating_mode(), OperatingMode::ApiEscaped);
        assert_eq!(device.api_mode(), ApiMode::ApiEscaped);
        assert!(device.send_data(&remote(), &[0x7E, 0x11, 0x13, 0x7D]).is_ok());
        assert_eq!(device.link().sent_payloads(), vec![vec![0x7E, 0x11, 0x13, 0x7D]]);
    }

    #[test]
    fn test_unrelated_frames_are_skipped() {
        let mut device = opened();
        device.link_mut().inject(&ApiPacket::Unsupported {
            api_id: 0x8A,
            data: vec![0x06],
        });
        assert!(device.send_data(&remote(), b"x").is_ok());
    }

    #[test]
    fn test_remote_from_malformed_address() {
        let err = RemoteXBeeDevice::from_hex_string("not-an-address").unwrap_err();
        assert!(matches!(err, XBeeError::InvalidAddress { .. }));
        assert!(!err.is_recoverable());
        assert_eq!(remote(), remote());
    }
}
