use serde::{Deserialize, Serialize};

use crate::SECRET_KEY_LEN;

#[derive(Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct SessionDescription {
    pub mode: String,
    pub secret_key: [u8; SECRET_KEY_LEN],
}

// Keeps the key out of logs.
impl std::fmt::Debug for SessionDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDescription")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_must_be_full_length() {
        let short = json!({ "mode": "xchacha20_poly1305", "secret_key": ([0u8; 16]) });
        assert!(serde_json::from_value::<SessionDescription>(short).is_err());

        let full = json!({ "mode": "xchacha20_poly1305", "secret_key": ([7u8; 32]) });
        let description: SessionDescription = serde_json::from_value(full).unwrap();
        assert_eq!(description.secret_key, [7; SECRET_KEY_LEN]);
    }

    #[test]
    fn debug_hides_key() {
        let description = SessionDescription {
            mode: "xchacha20_poly1305".into(),
            secret_key: [42; SECRET_KEY_LEN],
        };
        let output = format!("{description:?}");
        assert!(!output.contains("42"));
    }
}
