use twilight_model::id::Id;
use twilight_model::id::marker::{GuildMarker, UserMarker};
use voicewire_types::API_VERSION;

/// This struct holds connection parameters for the [`VoiceClient`].
///
/// All of it comes from whoever arranged the voice session: the endpoint
/// and token from the voice server assignment, the session id from the
/// voice state of the user.
///
/// [`VoiceClient`]: super::VoiceClient
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub endpoint: String,
    pub guild_id: Id<GuildMarker>,
    pub session_id: String,
    pub token: Token,
    pub user_id: Id<UserMarker>,
}

impl ConnectionInfo {
    /// Control channel URL for this session.
    ///
    /// Any scheme or trailing slash in `endpoint` is ignored.
    #[must_use]
    pub fn gateway_url(&self, tls: bool) -> String {
        let host = self
            .endpoint
            .trim_start_matches("wss://")
            .trim_start_matches("ws://")
            .trim_end_matches('/');

        let scheme = if tls { "wss" } else { "ws" };
        format!("{scheme}://{host}/?v={API_VERSION}")
    }
}

/// Wrapper for an authorization token with a debug implementation
/// that redacts the string.
#[derive(Clone, Default)]
pub struct Token {
    /// Authorization token that is redacted in the Debug implementation.
    inner: Box<str>,
}

impl Token {
    /// Create a new authorization wrapper.
    #[must_use]
    pub const fn new(token: Box<str>) -> Self {
        Self { inner: token }
    }

    /// Exposes the authorization token.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.inner
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self::new(value.into_boxed_str())
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(endpoint: &str) -> ConnectionInfo {
        ConnectionInfo {
            endpoint: endpoint.into(),
            guild_id: Id::new(1),
            session_id: "session".into(),
            token: String::from("secret").into(),
            user_id: Id::new(2),
        }
    }

    #[test]
    fn url_from_bare_host() {
        assert_eq!(
            info("voice.example.net:443").gateway_url(true),
            "wss://voice.example.net:443/?v=4"
        );
        assert_eq!(
            info("127.0.0.1:9000").gateway_url(false),
            "ws://127.0.0.1:9000/?v=4"
        );
    }

    #[test]
    fn url_strips_scheme() {
        assert_eq!(
            info("wss://voice.example.net/").gateway_url(true),
            "wss://voice.example.net/?v=4"
        );
    }

    #[test]
    fn token_is_redacted() {
        let info = info("voice.example.net");
        assert!(!format!("{info:?}").contains("secret"));
        assert_eq!(info.token.expose(), "secret");
    }
}
