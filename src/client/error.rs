use std::error::Error;
use std::fmt::Display;

#[derive(Debug)]
pub struct VoiceClientError {
    pub(crate) kind: VoiceClientErrorType,
    pub(crate) source: Option<Box<dyn Error + Send + Sync>>,
}

impl VoiceClientError {
    #[must_use]
    pub fn kind(&self) -> &VoiceClientErrorType {
        &self.kind
    }

    pub(crate) fn new(kind: VoiceClientErrorType) -> Self {
        Self { kind, source: None }
    }

    pub(crate) fn with_source(
        kind: VoiceClientErrorType,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            kind,
            source: Some(source.into()),
        }
    }
}

impl Display for VoiceClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            VoiceClientErrorType::Configuration => f.write_str("invalid voice client configuration"),
            VoiceClientErrorType::AlreadyStarted => f.write_str("voice client was already started"),
            VoiceClientErrorType::Closed => f.write_str("voice client is closed"),
            VoiceClientErrorType::NotConnected => f.write_str("voice session is not ready"),
            VoiceClientErrorType::SendingPacket => f.write_str("could not send voice data"),
            VoiceClientErrorType::SendingMessage => {
                f.write_str("could not send voice gateway message")
            }
            VoiceClientErrorType::Handshaking => {
                f.write_str("could not handshake voice UDP connection")
            }
            VoiceClientErrorType::Protocol => f.write_str("voice gateway violated the protocol"),
            VoiceClientErrorType::Deserializing { event } => {
                f.write_str("voice gateway event could not be deserialized: event=")?;
                f.write_str(event)
            }
            VoiceClientErrorType::Shutdown => f.write_str("voice client did not shut down cleanly"),
        }
    }
}

impl Error for VoiceClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn Error + 'static))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum VoiceClientErrorType {
    /// Options are unusable, e.g. the encryption mode was compiled out.
    Configuration,

    /// [`start`] was called more than once.
    ///
    /// [`start`]: super::VoiceClient::start
    AlreadyStarted,

    /// The client was closed, or closed itself after a fatal close code.
    Closed,

    /// The session is not ready yet.
    NotConnected,

    /// Could not send voice data.
    SendingPacket,

    /// Could not send a message over the control channel.
    SendingMessage,

    /// Could not handshake a voice server.
    Handshaking,

    /// The voice gateway sent something out of order.
    Protocol,

    /// Voice gateway event could not be deserialized.
    Deserializing { event: String },

    /// The connection task ended abnormally while closing.
    Shutdown,
}
