use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OpCode;

#[derive(Serialize)]
struct OutgoingEnvelope<'a, T: Serialize> {
    op: OpCode,
    d: &'a T,
}

#[derive(Deserialize)]
struct IncomingEnvelope {
    op: u8,
    #[serde(default)]
    d: Value,
}

/// Encodes a control message into its `{"op", "d"}` text form.
///
/// Serialization of plain payload structs cannot fail, so the only way
/// to get an error is a `data` type with a fallible [`Serialize`] impl.
pub fn encode_envelope<T: Serialize>(op: OpCode, data: &T) -> serde_json::Result<String> {
    serde_json::to_string(&OutgoingEnvelope { op, d: data })
}

/// Decodes a control message.
///
/// Returns [`None`] for anything that is not valid JSON, does not have
/// the envelope shape, or carries an opcode outside of [`OpCode`].
#[must_use]
pub fn decode_envelope(text: &str) -> Option<(OpCode, Value)> {
    let envelope = serde_json::from_str::<IncomingEnvelope>(text).ok()?;
    let op = OpCode::from(envelope.op)?;
    Some((op, envelope.d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn every_opcode_survives() {
        for value in 0..=9 {
            let op = OpCode::from(value).unwrap();
            let data = json!({ "value": value, "nested": [1, "two", null] });

            let text = encode_envelope(op, &data).unwrap();
            assert_eq!(decode_envelope(&text), Some((op, data)));
        }
    }

    #[test]
    fn wire_shape() {
        let text = encode_envelope(OpCode::Heartbeat, &1_501_184_119_561_u64).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({ "op": 3, "d": 1_501_184_119_561_u64 }));
    }

    #[test]
    fn missing_data_is_null() {
        assert_eq!(
            decode_envelope(r#"{"op":9}"#),
            Some((OpCode::Resumed, Value::Null))
        );
    }

    #[test]
    fn malformed_input() {
        assert_eq!(decode_envelope(""), None);
        assert_eq!(decode_envelope("{not json"), None);
        assert_eq!(decode_envelope(r#"{"d":{}}"#), None);
        assert_eq!(decode_envelope(r#"{"op":"hello","d":{}}"#), None);
        assert_eq!(decode_envelope(r#"[8, {}]"#), None);
    }

    #[test]
    fn unknown_opcode() {
        assert_eq!(decode_envelope(r#"{"op":12,"d":{}}"#), None);
        assert_eq!(decode_envelope(r#"{"op":300,"d":{}}"#), None);
    }
}
