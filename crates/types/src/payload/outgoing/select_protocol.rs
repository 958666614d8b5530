use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Transport protocol name for UDP media.
pub const UDP_PROTOCOL: &str = "udp";

/// Tells the server where to send media and which encryption to use.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct SelectProtocol {
    pub protocol: String,
    pub data: SelectProtocolData,
}

impl SelectProtocol {
    /// Selects UDP media with the externally discovered address.
    #[must_use]
    pub fn udp(address: IpAddr, port: u16, mode: impl Into<String>) -> Self {
        Self {
            protocol: UDP_PROTOCOL.to_string(),
            data: SelectProtocolData {
                address,
                port,
                mode: mode.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct SelectProtocolData {
    #[serde(with = "crate::deserializers::ip_string")]
    pub address: IpAddr,
    pub port: u16,
    pub mode: String,
}
