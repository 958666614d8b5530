use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Identification of the media endpoint for this session.
///
/// Servers also send a stale `heartbeat_interval` here; it is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct Ready {
    pub ssrc: u32,
    #[serde(with = "crate::deserializers::ip_string")]
    pub ip: IpAddr,
    pub port: u16,
    #[serde(default)]
    pub modes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serde_test::{Configure, Token};
    use std::net::Ipv4Addr;

    #[test]
    fn structure() {
        let payload = Ready {
            ssrc: 1,
            ip: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 1234,
            modes: vec!["xchacha20_poly1305".to_string()],
        };
        serde_test::assert_tokens(
            &payload.compact(),
            &[
                Token::Struct {
                    name: "Ready",
                    len: 4,
                },
                Token::Str("ssrc"),
                Token::U32(1),
                Token::Str("ip"),
                Token::Str("127.0.0.1"),
                Token::Str("port"),
                Token::U16(1234),
                Token::Str("modes"),
                Token::Seq { len: Some(1) },
                Token::Str("xchacha20_poly1305"),
                Token::SeqEnd,
                Token::StructEnd,
            ],
        );
    }

    #[test]
    fn modes_are_optional() {
        let ready: Ready = serde_json::from_value(json!({
            "ssrc": 1234,
            "ip": "198.51.100.9",
            "port": 5000,
            "heartbeat_interval": 1
        }))
        .unwrap();

        assert_eq!(ready.ssrc, 1234);
        assert!(ready.modes.is_empty());
    }
}
