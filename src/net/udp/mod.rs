pub mod error;
pub mod packet;

use self::error::{ConfigurationIssue, VoiceUdpError, VoiceUdpErrorType};
use self::packet::{build_media_header, encode_discovery_probe, parse_discovery_response};
use crate::crypto::{self, AeadCipher, EncryptMode};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::{debug, trace};
use voicewire_types::SECRET_KEY_LEN;

/// Largest datagram we expect back from the media server during discovery.
const RECV_BUFFER_LEN: usize = 1460;

/// Sequence number and timestamp of the next media packet.
///
/// Both wrap around instead of overflowing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RtpCounters {
    pub sequence: u16,
    pub timestamp: u32,
}

impl RtpCounters {
    /// Moves past one frame holding `samples` samples per channel.
    pub fn advance(&mut self, samples: u32) {
        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(samples);
    }
}

/// It contains the details that can be retrieved with [`VoiceUdp::discover`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverIpResult {
    /// External IP address of the client.
    pub address: IpAddr,

    /// External UDP port bound by the client.
    pub port: u16,
}

/// The media path of a voice session.
///
/// Owns the UDP socket, the session's cipher and the packet counters.
/// Setup happens in two steps: [`discover`] once the server announced
/// the media endpoint, then [`configure`] once the secret key arrived.
///
/// Counters only move through [`advance`], so a failed [`send_frame`]
/// can be retried with the same sequence number and timestamp.
///
/// [`discover`]: VoiceUdp::discover
/// [`configure`]: VoiceUdp::configure
/// [`advance`]: VoiceUdp::advance
/// [`send_frame`]: VoiceUdp::send_frame
#[derive(Debug, Default)]
pub struct VoiceUdp {
    socket: Option<UdpSocket>,
    ssrc: u32,
    external: Option<DiscoverIpResult>,
    cipher: Option<Box<dyn AeadCipher>>,
    counters: RtpCounters,
}

impl VoiceUdp {
    /// Creates a new instance of `VoiceUdp` that is uninitialized by default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Performs IP discovery against the media server.
    ///
    /// Any previous media state is dropped first. This waits for exactly
    /// one datagram; callers bound it with their own timeout.
    pub async fn discover(
        &mut self,
        ssrc: u32,
        ip: IpAddr,
        port: u16,
    ) -> Result<DiscoverIpResult, VoiceUdpError> {
        self.close();

        let local = match ip {
            IpAddr::V4(..) => SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0),
            IpAddr::V6(..) => SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0),
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| VoiceUdpError::with_source(VoiceUdpErrorType::Connect, source))?;

        socket
            .connect((ip, port))
            .await
            .map_err(|source| VoiceUdpError::with_source(VoiceUdpErrorType::Connect, source))?;

        socket
            .send(&encode_discovery_probe(ssrc))
            .await
            .map_err(|source| {
                VoiceUdpError::with_source(VoiceUdpErrorType::DiscoveringIp, source)
            })?;

        let mut buf = [0; RECV_BUFFER_LEN];
        let len = socket.recv(&mut buf).await.map_err(|source| {
            VoiceUdpError::with_source(VoiceUdpErrorType::DiscoveringIp, source)
        })?;

        let (address, external_port) = parse_discovery_response(&buf[..len]).ok_or_else(|| {
            VoiceUdpError::with_source(
                VoiceUdpErrorType::DiscoveringIp,
                "invalid ip discovery response",
            )
        })?;

        let result = DiscoverIpResult {
            address,
            port: external_port,
        };
        debug!(?ssrc, ?result, "discovered external address");

        self.socket = Some(socket);
        self.ssrc = ssrc;
        self.external = Some(result);
        Ok(result)
    }

    /// Installs the session's secret key.
    ///
    /// Allowed once per discovery.
    pub fn configure(
        &mut self,
        mode: EncryptMode,
        key: &[u8; SECRET_KEY_LEN],
    ) -> Result<(), VoiceUdpError> {
        if self.cipher.is_some() {
            return Err(VoiceUdpError::new(VoiceUdpErrorType::Configuration(
                ConfigurationIssue::AlreadyConfigured,
            )));
        }

        if self.external.is_none() {
            return Err(VoiceUdpError::new(VoiceUdpErrorType::Configuration(
                ConfigurationIssue::NotDiscovered,
            )));
        }

        let cipher = crypto::aead(mode, key).map_err(|source| {
            VoiceUdpError::with_source(
                VoiceUdpErrorType::Configuration(ConfigurationIssue::Unavailable),
                source,
            )
        })?;

        debug!(?mode, ssrc = self.ssrc, "media transport configured");
        self.cipher = Some(cipher);
        Ok(())
    }

    /// Seals `payload` under the current counters and sends it.
    ///
    /// This does not advance the counters.
    pub async fn send_frame(&self, payload: &[u8]) -> Result<(), VoiceUdpError> {
        let (Some(socket), Some(cipher)) = (self.socket.as_ref(), self.cipher.as_ref()) else {
            return Err(VoiceUdpError::new(VoiceUdpErrorType::NotConfigured));
        };

        let packet = self.seal(cipher.as_ref(), payload)?;
        socket
            .send(&packet)
            .await
            .map_err(|source| VoiceUdpError::with_source(VoiceUdpErrorType::Sending, source))?;

        trace!(
            sequence = self.counters.sequence,
            timestamp = self.counters.timestamp,
            len = packet.len(),
            "sent media packet"
        );
        Ok(())
    }

    fn seal(&self, cipher: &dyn AeadCipher, payload: &[u8]) -> Result<Vec<u8>, VoiceUdpError> {
        let header = build_media_header(
            self.counters.sequence,
            self.counters.timestamp,
            self.ssrc,
        );

        let mut nonce = vec![0; cipher.mode().nonce_size()];
        nonce[..header.len()].copy_from_slice(&header);

        let ciphertext = cipher
            .encrypt(&nonce, &[], payload)
            .map_err(|source| VoiceUdpError::with_source(VoiceUdpErrorType::Encrypting, source))?;

        let mut packet = Vec::with_capacity(header.len() + ciphertext.len());
        packet.extend_from_slice(&header);
        packet.extend_from_slice(&ciphertext);
        Ok(packet)
    }

    /// Moves the counters past one frame of `samples` samples.
    pub fn advance(&mut self, samples: u32) {
        self.counters.advance(samples);
    }

    /// Drops the socket, the key and the counters.
    pub fn close(&mut self) {
        if self.socket.is_some() {
            debug!(ssrc = self.ssrc, "closing media transport");
        }
        *self = Self::default();
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.cipher.is_some() && self.socket.is_some()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    #[must_use]
    pub const fn counters(&self) -> RtpCounters {
        self.counters
    }

    #[must_use]
    pub const fn ssrc(&self) -> u32 {
        self.ssrc
    }

    #[must_use]
    pub const fn external(&self) -> Option<DiscoverIpResult> {
        self.external
    }
}

#[cfg(test)]
mod tests {
    use super::packet::{MEDIA_HEADER_LEN, discovery_response};
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    async fn answer_probe(server: &UdpSocket, address: &str, port: u16) -> u32 {
        let mut buf = [0; 128];
        let (len, peer) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(len, 70);
        server
            .send_to(&discovery_response(address, port), peer)
            .await
            .unwrap();
        u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
    }

    async fn discovered(ssrc: u32) -> (VoiceUdp, UdpSocket) {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let mut udp = VoiceUdp::new();
        let (result, probed) = tokio::join!(
            udp.discover(ssrc, addr.ip(), addr.port()),
            answer_probe(&server, "198.51.100.9", 5000)
        );

        assert_eq!(probed, ssrc);
        assert_eq!(
            result.unwrap(),
            DiscoverIpResult {
                address: "198.51.100.9".parse().unwrap(),
                port: 5000,
            }
        );
        (udp, server)
    }

    #[tokio::test]
    async fn configure_needs_discovery_first() {
        let mut udp = VoiceUdp::new();
        let error = udp
            .configure(EncryptMode::XChaCha20Poly1305, &[0; SECRET_KEY_LEN])
            .unwrap_err();
        assert_eq!(
            error.kind(),
            &VoiceUdpErrorType::Configuration(ConfigurationIssue::NotDiscovered)
        );

        let error = udp.send_frame(b"early").await.unwrap_err();
        assert_eq!(error.kind(), &VoiceUdpErrorType::NotConfigured);
    }

    #[cfg(feature = "xchacha20poly1305")]
    #[tokio::test]
    async fn configure_only_once() {
        let (mut udp, _server) = discovered(7).await;
        udp.configure(EncryptMode::XChaCha20Poly1305, &[0; SECRET_KEY_LEN])
            .unwrap();
        assert!(udp.is_configured());

        let error = udp
            .configure(EncryptMode::XChaCha20Poly1305, &[0; SECRET_KEY_LEN])
            .unwrap_err();
        assert_eq!(
            error.kind(),
            &VoiceUdpErrorType::Configuration(ConfigurationIssue::AlreadyConfigured)
        );
    }

    #[cfg(feature = "xchacha20poly1305")]
    #[tokio::test]
    async fn frames_carry_counters_and_decrypt() {
        let (mut udp, server) = discovered(1234).await;
        let key = [0; SECRET_KEY_LEN];
        udp.configure(EncryptMode::XChaCha20Poly1305, &key).unwrap();
        let cipher = crypto::aead(EncryptMode::XChaCha20Poly1305, &key).unwrap();

        let mut buf = [0; 256];
        for (expected_seq, expected_ts) in [(0u16, 0u32), (1, 960)] {
            udp.send_frame(b"opus").await.unwrap();
            udp.advance(960);

            let len = server.recv(&mut buf).await.unwrap();
            let (header, sealed) = buf[..len].split_at(MEDIA_HEADER_LEN);
            assert_eq!(header, &build_media_header(expected_seq, expected_ts, 1234)[..]);

            let mut nonce = [0; 24];
            nonce[..MEDIA_HEADER_LEN].copy_from_slice(header);
            assert_eq!(cipher.decrypt(&nonce, &[], sealed).unwrap(), b"opus");
        }
    }

    #[cfg(feature = "xchacha20poly1305")]
    #[tokio::test]
    async fn retrying_a_send_reuses_counters() {
        let (mut udp, server) = discovered(5).await;
        udp.configure(EncryptMode::XChaCha20Poly1305, &[1; SECRET_KEY_LEN])
            .unwrap();

        udp.send_frame(b"a").await.unwrap();
        udp.send_frame(b"a").await.unwrap();

        let mut first = [0; 64];
        let mut second = [0; 64];
        server.recv(&mut first).await.unwrap();
        server.recv(&mut second).await.unwrap();
        assert_eq!(&first[..MEDIA_HEADER_LEN], &second[..MEDIA_HEADER_LEN]);
        assert_eq!(udp.counters(), RtpCounters::default());
    }

    #[tokio::test]
    async fn garbage_discovery_response() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let mut udp = VoiceUdp::new();

        let answer = async {
            let mut buf = [0; 128];
            let (_, peer) = server.recv_from(&mut buf).await.unwrap();
            server.send_to(&[1, 2, 3], peer).await.unwrap();
        };
        let (result, ()) = tokio::join!(udp.discover(1, addr.ip(), addr.port()), answer);

        let error = result.unwrap_err();
        assert_eq!(error.kind(), &VoiceUdpErrorType::DiscoveringIp);
        assert!(!udp.is_open());
    }

    #[cfg(feature = "xchacha20poly1305")]
    #[tokio::test]
    async fn close_forgets_everything() {
        let (mut udp, _server) = discovered(9).await;
        udp.configure(EncryptMode::XChaCha20Poly1305, &[0; SECRET_KEY_LEN])
            .unwrap();
        udp.advance(960);

        udp.close();
        assert!(!udp.is_open());
        assert!(!udp.is_configured());
        assert_eq!(udp.external(), None);
        assert_eq!(udp.counters(), RtpCounters::default());
    }

    proptest! {
        #[test]
        fn sequence_wraps(sequence in any::<u16>(), timestamp in any::<u32>()) {
            let mut counters = RtpCounters { sequence, timestamp };
            counters.advance(960);
            prop_assert_eq!(u32::from(counters.sequence), (u32::from(sequence) + 1) % 65_536);
        }

        #[test]
        fn timestamp_wraps(timestamp in any::<u32>(), samples in any::<u32>()) {
            let mut counters = RtpCounters { sequence: 0, timestamp };
            counters.advance(samples);
            let expected = (u64::from(timestamp) + u64::from(samples)) % (1 << 32);
            prop_assert_eq!(u64::from(counters.timestamp), expected);
        }
    }
}
