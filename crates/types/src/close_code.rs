use serde_repr::{Deserialize_repr, Serialize_repr};
use std::{error::Error, fmt::Display};

/// Close codes the voice gateway may attach to a close frame.
#[derive(Clone, Copy, Debug, Deserialize_repr, Eq, Hash, PartialEq, Serialize_repr)]
#[non_exhaustive]
#[repr(u16)]
pub enum CloseCode {
    /// An invalid opcode was sent.
    UnknownOpcode = 4001,
    /// An invalid payload was sent.
    DecodeError = 4002,
    /// A payload was sent prior to identifying.
    NotAuthenticated = 4003,
    /// An invalid token was sent when identifying.
    AuthenticationFailed = 4004,
    /// Multiple identify payloads were sent.
    AlreadyAuthenticated = 4005,
    /// The session was invalidated.
    SessionNoLongerValid = 4006,
    /// The session timed out.
    SessionTimedOut = 4009,
    /// The specified voice server was not found.
    ServerNotFound = 4011,
    /// An unknown protocol was sent.
    UnknownProtocol = 4012,
    /// Disconnected from the voice channel.
    Disconnected = 4014,
    /// The voice server crashed.
    VoiceServerCrashed = 4015,
    /// The encryption could not be recognized.
    UnknownEncryptionMode = 4016,
}

/// What a client should do after the peer closed the channel with a given code.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ClosePolicy {
    /// Reconnect and reattach to the previous session if there was one.
    Reconnect,

    /// Reconnect but start a fresh session.
    Reidentify,

    /// Never reconnect.
    Stop,
}

impl CloseCode {
    #[must_use]
    pub const fn policy(&self) -> ClosePolicy {
        match self {
            Self::UnknownOpcode
            | Self::DecodeError
            | Self::NotAuthenticated
            | Self::AlreadyAuthenticated
            | Self::VoiceServerCrashed => ClosePolicy::Reconnect,
            Self::SessionNoLongerValid | Self::SessionTimedOut => ClosePolicy::Reidentify,
            Self::AuthenticationFailed
            | Self::ServerNotFound
            | Self::UnknownProtocol
            | Self::Disconnected
            | Self::UnknownEncryptionMode => ClosePolicy::Stop,
        }
    }

    /// Policy for a raw close code, or for a close without any code.
    ///
    /// Codes outside of the voice gateway range (1000-series WebSocket codes,
    /// missing codes) are treated as ordinary drops.
    #[must_use]
    pub fn policy_for(code: Option<u16>) -> ClosePolicy {
        code.and_then(|code| Self::try_from(code).ok())
            .map_or(ClosePolicy::Reconnect, |code| code.policy())
    }
}

impl From<CloseCode> for u16 {
    fn from(val: CloseCode) -> Self {
        val as u16
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct CloseCodeConversionError {
    code: u16,
}

impl CloseCodeConversionError {
    #[must_use]
    pub const fn code(&self) -> u16 {
        self.code
    }
}

impl Display for CloseCodeConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.code, f)?;
        f.write_str(" is not a valid close code")
    }
}

impl Error for CloseCodeConversionError {}

impl TryFrom<u16> for CloseCode {
    type Error = CloseCodeConversionError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Ok(match value {
            4001 => Self::UnknownOpcode,
            4002 => Self::DecodeError,
            4003 => Self::NotAuthenticated,
            4004 => Self::AuthenticationFailed,
            4005 => Self::AlreadyAuthenticated,
            4006 => Self::SessionNoLongerValid,
            4009 => Self::SessionTimedOut,
            4011 => Self::ServerNotFound,
            4012 => Self::UnknownProtocol,
            4014 => Self::Disconnected,
            4015 => Self::VoiceServerCrashed,
            4016 => Self::UnknownEncryptionMode,
            code => return Err(CloseCodeConversionError { code }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use static_assertions::assert_impl_all;
    use std::fmt::Debug;

    assert_impl_all!(
        CloseCode: Clone,
        Copy,
        Debug,
        Deserialize<'static>,
        Eq,
        PartialEq,
        Send,
        Serialize,
        Sync,
    );
    assert_impl_all!(CloseCodeConversionError: Debug, PartialEq, Eq, Send, Sync, Error);

    #[test]
    fn unknown_codes_reconnect() {
        assert_eq!(CloseCode::policy_for(None), ClosePolicy::Reconnect);
        assert_eq!(CloseCode::policy_for(Some(1006)), ClosePolicy::Reconnect);
        assert_eq!(CloseCode::policy_for(Some(4999)), ClosePolicy::Reconnect);
    }

    #[test]
    fn invalid_session_reidentifies() {
        assert_eq!(CloseCode::policy_for(Some(4006)), ClosePolicy::Reidentify);
    }

    #[test]
    fn fatal_codes_stop() {
        for code in [4004, 4011, 4012, 4014, 4016] {
            assert_eq!(CloseCode::policy_for(Some(code)), ClosePolicy::Stop, "{code}");
        }
        assert_eq!(CloseCode::AuthenticationFailed.policy(), ClosePolicy::Stop);
    }

    #[test]
    fn conversion_rejects_unknown() {
        let error = CloseCode::try_from(4000).unwrap_err();
        assert_eq!(error.code(), 4000);
        assert_eq!(error.to_string(), "4000 is not a valid close code");
    }
}
