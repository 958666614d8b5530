//! A client for real-time voice gateways.
//!
//! [`VoiceClient`] keeps the control channel alive, performs the identify
//! or resume handshake and sets up an encrypted UDP media path. Audio is
//! handed over through an [`AudioSink`].
#![forbid(unsafe_code)]
#![warn(
    clippy::pedantic,
    clippy::must_use_candidate,
    clippy::empty_enum,
    clippy::unwrap_used
)]
#![allow(
    clippy::new_without_default,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]

pub mod audio;
pub mod client;
pub mod crypto;

/// Transports underneath a voice session.
///
/// Implement [`net::Connector`] to run the control channel over something
/// other than the bundled WebSocket client.
pub mod net;

pub use self::audio::{AudioEncoder, AudioSink};
pub use self::client::error::{VoiceClientError, VoiceClientErrorType};
pub use self::client::{
    ConnectionInfo, HeartbeatInfo, RetryPolicy, Token, VoiceClient, VoiceClientOptions,
    VoiceClientState,
};
pub use self::crypto::EncryptMode;
pub use voicewire_types as types;
