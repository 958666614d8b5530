//! Per-packet encryption used by the media transport.
//!
//! Ciphers are chosen at runtime from [`EncryptMode`]; which modes exist
//! depends on the Cargo features the crate was compiled with.
use std::fmt::{Debug, Display};
use voicewire_types::SECRET_KEY_LEN;

mod mode;
pub use self::mode::{EncryptMode, UnknownEncryptMode};

#[cfg(feature = "xchacha20poly1305")]
pub mod xchacha20poly1305;

#[cfg(feature = "xchacha20poly1305")]
pub use self::xchacha20poly1305::XChaCha20Poly1305;

/// Authenticated encryption capability keyed with one session's secret key.
pub trait AeadCipher: Debug + Sync + Send {
    fn mode(&self) -> EncryptMode;
    fn encrypt(&self, nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, AeadError>;
    fn decrypt(&self, nonce: &[u8], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, AeadError>;
}

/// Creates the cipher for `mode` keyed with `key`.
///
/// Fails with [`AeadErrorType::Unavailable`] if the mode was compiled out.
pub fn aead(mode: EncryptMode, key: &[u8; SECRET_KEY_LEN]) -> Result<Box<dyn AeadCipher>, AeadError> {
    match mode {
        #[cfg(feature = "xchacha20poly1305")]
        EncryptMode::XChaCha20Poly1305 => Ok(Box::new(XChaCha20Poly1305::new(key))),
        #[cfg(not(feature = "xchacha20poly1305"))]
        EncryptMode::XChaCha20Poly1305 => {
            let _ = key;
            Err(AeadError {
                kind: AeadErrorType::Unavailable { mode },
            })
        }
    }
}

pub struct AeadError {
    pub(crate) kind: AeadErrorType,
}

impl AeadError {
    #[must_use]
    pub fn kind(&self) -> &AeadErrorType {
        &self.kind
    }
}

impl Debug for AeadError {
    #[cfg(not(test))]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadError").finish_non_exhaustive()
    }

    #[cfg(test)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadError")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Display for AeadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never say why, the cause can leak information about the key.
        f.write_str("aead error")
    }
}

impl std::error::Error for AeadError {}

#[cfg_attr(test, derive(Debug))]
#[non_exhaustive]
pub enum AeadErrorType {
    /// General AEAD error. Nothing too specific.
    Unspecified,

    /// Invalid nonce length.
    InvalidNonceLength { expected: usize },

    /// The mode is known but its implementation was not compiled in.
    Unavailable { mode: EncryptMode },
}
