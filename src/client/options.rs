use crate::crypto::EncryptMode;
use std::time::Duration;
use voicewire_types::payload::SpeakingFlags;

/// How the control channel is (re)opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound for a single connection attempt.
    pub timeout: Duration,

    /// Pause between failed attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            delay: Duration::from_secs(2),
        }
    }
}

/// Tunables for a [`VoiceClient`].
///
/// [`VoiceClient`]: super::VoiceClient
#[derive(Debug, Clone)]
pub struct VoiceClientOptions {
    /// Media encryption to request. [`None`] means no usable mode was
    /// compiled in, which [`VoiceClient::new`] rejects.
    ///
    /// [`VoiceClient::new`]: super::VoiceClient::new
    pub mode: Option<EncryptMode>,

    pub retry: RetryPolicy,

    /// Bound for UDP discovery.
    pub handshake_timeout: Duration,

    /// Whether the control channel uses `wss://`.
    pub tls: bool,

    /// Speaking state announced once the session becomes ready.
    pub speaking: SpeakingFlags,
}

impl Default for VoiceClientOptions {
    fn default() -> Self {
        Self {
            mode: EncryptMode::preferred(),
            retry: RetryPolicy::default(),
            handshake_timeout: Duration::from_secs(5),
            tls: true,
            speaking: SpeakingFlags::MICROPHONE,
        }
    }
}
