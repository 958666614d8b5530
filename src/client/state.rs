/// The current state of [`VoiceClient`].
///
/// States advance in declaration order during a handshake. Losing the
/// control channel goes back to [`Connecting`]; [`Closed`] is terminal.
///
/// [`VoiceClient`]: super::VoiceClient
/// [`Connecting`]: VoiceClientState::Connecting
/// [`Closed`]: VoiceClientState::Closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceClientState {
    /// Not started yet.
    Disconnected,

    /// Opening the control channel, possibly after a drop.
    Connecting,

    /// Control channel is open, waiting for the server's `hello`.
    AwaitingHello,

    /// Sent `identify` for a fresh session.
    Identifying,

    /// Sent `resume` to reattach to the previous session.
    Resuming,

    /// Waiting for the server to describe the media endpoint.
    AwaitingReady,

    /// Performing IP discovery over UDP.
    DiscoveringUdp,

    /// Telling the server which address and encryption to use.
    SelectingProtocol,

    /// Waiting for the secret key.
    AwaitingSessionDescription,

    /// Media can flow.
    Ready,

    /// Closed for good.
    Closed,
}

impl VoiceClientState {
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Which handshake follows the server's `hello`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconnectMode {
    /// Start a fresh session.
    Identify,

    /// Reattach to the previous session.
    Resume,
}

impl ReconnectMode {
    pub(crate) const fn handshake_state(self) -> VoiceClientState {
        match self {
            Self::Identify => VoiceClientState::Identifying,
            Self::Resume => VoiceClientState::Resuming,
        }
    }
}
