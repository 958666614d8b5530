//! Fixed-layout datagrams exchanged with the media server.
use std::net::IpAddr;

/// Size of an IP discovery request.
pub const DISCOVERY_PACKET_LEN: usize = 70;

/// Offset of the NUL-terminated address in a discovery response.
const DISCOVERY_ADDRESS_OFFSET: usize = 4;

/// Size of the media packet header.
pub const MEDIA_HEADER_LEN: usize = 12;

/// Version 2, no padding, no extension, no CSRCs.
pub const MEDIA_HEADER_FLAGS: u8 = 0x80;

/// Dynamic payload type used for encoded audio.
pub const MEDIA_PAYLOAD_TYPE: u8 = 0x78;

/// Zero-filled discovery request with the big-endian `ssrc` up front.
#[must_use]
pub fn encode_discovery_probe(ssrc: u32) -> [u8; DISCOVERY_PACKET_LEN] {
    let mut packet = [0; DISCOVERY_PACKET_LEN];
    packet[..4].copy_from_slice(&ssrc.to_be_bytes());
    packet
}

/// Extracts the external address and port from a discovery response.
///
/// The address is the ASCII text starting at offset 4 up to the first NUL
/// byte, the port is the little-endian `u16` in the last two bytes.
/// Returns [`None`] if the buffer does not have that shape.
#[must_use]
pub fn decode_discovery_response(buf: &[u8]) -> Option<(String, u16)> {
    if buf.len() < DISCOVERY_ADDRESS_OFFSET + 2 {
        return None;
    }

    let port_at = buf.len() - 2;
    let text = &buf[DISCOVERY_ADDRESS_OFFSET..port_at];
    let end = text.iter().position(|&b| b == 0)?;
    let address = std::str::from_utf8(&text[..end]).ok()?;
    if address.is_empty() || !address.is_ascii() {
        return None;
    }

    let port = u16::from_le_bytes([buf[port_at], buf[port_at + 1]]);
    Some((address.to_owned(), port))
}

/// Parses a discovery response into a usable address.
pub(crate) fn parse_discovery_response(buf: &[u8]) -> Option<(IpAddr, u16)> {
    let (address, port) = decode_discovery_response(buf)?;
    Some((address.parse().ok()?, port))
}

/// Header prefixed to every media packet.
#[must_use]
pub fn build_media_header(sequence: u16, timestamp: u32, ssrc: u32) -> [u8; MEDIA_HEADER_LEN] {
    let mut header = [0; MEDIA_HEADER_LEN];
    header[0] = MEDIA_HEADER_FLAGS;
    header[1] = MEDIA_PAYLOAD_TYPE;
    header[2..4].copy_from_slice(&sequence.to_be_bytes());
    header[4..8].copy_from_slice(&timestamp.to_be_bytes());
    header[8..12].copy_from_slice(&ssrc.to_be_bytes());
    header
}

/// Discovery response as a media server would answer it.
#[cfg(test)]
pub(crate) fn discovery_response(address: &str, port: u16) -> [u8; DISCOVERY_PACKET_LEN] {
    let mut buf = [0; DISCOVERY_PACKET_LEN];
    buf[0..2].copy_from_slice(&2u16.to_be_bytes());
    buf[2..4].copy_from_slice(&70u16.to_be_bytes());
    buf[4..4 + address.len()].copy_from_slice(address.as_bytes());
    buf[DISCOVERY_PACKET_LEN - 2..].copy_from_slice(&port.to_le_bytes());
    buf
}
