pub mod incoming;
pub mod outgoing;
pub mod speaking;

pub use self::speaking::{Speaking, SpeakingFlags};

use serde::de::DeserializeOwned;
use serde_json::Value;

#[allow(clippy::wildcard_imports)]
use self::incoming::*;
use crate::OpCode;

/// Any server-to-client message on the voice control channel.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Hello(Hello),
    Ready(Ready),
    SessionDescription(SessionDescription),
    HeartbeatAck,
    Speaking(Speaking),
    Resumed,
    /// An opcode that only clients are supposed to send.
    Unexpected(OpCode),
}

impl Event {
    /// Interprets the payload of an already decoded envelope.
    ///
    /// Fails only when the payload does not fit the shape its opcode implies.
    pub fn from_envelope(op: OpCode, data: Value) -> serde_json::Result<Self> {
        fn parse<T: DeserializeOwned>(data: Value) -> serde_json::Result<T> {
            serde_json::from_value(data)
        }

        Ok(match op {
            OpCode::Hello => Self::Hello(parse(data)?),
            OpCode::Ready => Self::Ready(parse(data)?),
            OpCode::SessionDescription => Self::SessionDescription(parse(data)?),
            OpCode::HeartbeatAck => Self::HeartbeatAck,
            OpCode::Speaking => Self::Speaking(parse(data)?),
            OpCode::Resumed => Self::Resumed,
            OpCode::Identify | OpCode::SelectProtocol | OpCode::Heartbeat | OpCode::Resume => {
                Self::Unexpected(op)
            }
        })
    }

    /// Name used in logs and error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Hello(..) => "hello",
            Self::Ready(..) => "ready",
            Self::SessionDescription(..) => "session_description",
            Self::HeartbeatAck => "heartbeat_ack",
            Self::Speaking(..) => "speaking",
            Self::Resumed => "resumed",
            Self::Unexpected(..) => "unexpected",
        }
    }
}
