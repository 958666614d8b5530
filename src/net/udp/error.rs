use std::error::Error;
use std::fmt::Display;

#[derive(Debug)]
pub struct VoiceUdpError {
    pub(crate) kind: VoiceUdpErrorType,
    pub(crate) source: Option<Box<dyn Error + Send + Sync>>,
}

impl VoiceUdpError {
    #[must_use]
    pub fn kind(&self) -> &VoiceUdpErrorType {
        &self.kind
    }

    pub(crate) fn new(kind: VoiceUdpErrorType) -> Self {
        Self { kind, source: None }
    }

    pub(crate) fn with_source(
        kind: VoiceUdpErrorType,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            kind,
            source: Some(source.into()),
        }
    }
}

impl Display for VoiceUdpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            VoiceUdpErrorType::Connect => f.write_str("could not connect to the voice UDP server"),
            VoiceUdpErrorType::DiscoveringIp => f.write_str("could not discover external IP address"),
            VoiceUdpErrorType::Configuration(issue) => {
                f.write_str("could not configure media encryption: ")?;
                f.write_str(match issue {
                    ConfigurationIssue::AlreadyConfigured => "already configured",
                    ConfigurationIssue::NotDiscovered => "IP discovery has not completed",
                    ConfigurationIssue::Unavailable => "encryption mode is not available",
                })
            }
            VoiceUdpErrorType::NotConfigured => f.write_str("media transport is not configured"),
            VoiceUdpErrorType::Encrypting => f.write_str("could not encrypt media packet"),
            VoiceUdpErrorType::Sending => f.write_str("could not send UDP packet"),
        }
    }
}

impl Error for VoiceUdpError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn Error + 'static))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum VoiceUdpErrorType {
    /// Could not bind or connect the local socket.
    Connect,

    /// Could not perform IP discovery, or the response made no sense.
    DiscoveringIp,

    /// Secret key could not be installed.
    Configuration(ConfigurationIssue),

    /// Tried to send media before a secret key was installed.
    NotConfigured,

    /// The cipher refused to seal a frame.
    Encrypting,

    /// Could not send a media packet.
    Sending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationIssue {
    AlreadyConfigured,
    NotDiscovered,
    Unavailable,
}
