use serde::{Deserialize, Serialize};
use std::time::Duration;

/// First message the server sends on every new control channel.
///
/// The voice flavour of `hello` carries the interval as a float.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Hello {
    #[serde(with = "crate::deserializers::millis")]
    pub heartbeat_interval: f64,
}

impl Hello {
    /// Heartbeat interval as requested by the server, without any margin.
    ///
    /// Values that do not fit a [`Duration`] saturate to [`Duration::MAX`].
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.heartbeat_interval / 1000.0).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_integers_and_floats() {
        let hello: Hello = serde_json::from_value(json!({ "heartbeat_interval": 400 })).unwrap();
        assert_eq!(hello.interval(), Duration::from_millis(400));

        let hello: Hello =
            serde_json::from_value(json!({ "heartbeat_interval": 13_750.0 })).unwrap();
        assert_eq!(hello.interval(), Duration::from_millis(13_750));
    }

    #[test]
    fn rejects_non_positive() {
        assert!(serde_json::from_value::<Hello>(json!({ "heartbeat_interval": 0 })).is_err());
        assert!(serde_json::from_value::<Hello>(json!({ "heartbeat_interval": -5 })).is_err());
    }

    #[test]
    fn rejects_oversized() {
        assert!(serde_json::from_str::<Hello>(r#"{"heartbeat_interval":1e300}"#).is_err());

        let longest: Hello =
            serde_json::from_value(json!({ "heartbeat_interval": u32::MAX })).unwrap();
        assert_eq!(longest.interval(), Duration::from_millis(u64::from(u32::MAX)));
    }

    #[test]
    fn interval_saturates() {
        let hello = Hello {
            heartbeat_interval: 1e300,
        };
        assert_eq!(hello.interval(), Duration::MAX);
    }
}
