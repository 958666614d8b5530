use super::{AeadCipher, AeadError, AeadErrorType, EncryptMode};
use chacha20poly1305::{Key, KeyInit, XNonce, aead::AeadInPlace};
use std::fmt::Debug;
use voicewire_types::SECRET_KEY_LEN;

const NONCE_LEN: usize = 24;

pub struct XChaCha20Poly1305 {
    cipher: chacha20poly1305::XChaCha20Poly1305,
}

impl Debug for XChaCha20Poly1305 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XChaCha20Poly1305").finish_non_exhaustive()
    }
}

impl XChaCha20Poly1305 {
    #[must_use]
    pub fn new(key: &[u8; SECRET_KEY_LEN]) -> Self {
        Self {
            cipher: chacha20poly1305::XChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    fn nonce(nonce: &[u8]) -> Result<&XNonce, AeadError> {
        if nonce.len() == NONCE_LEN {
            Ok(XNonce::from_slice(nonce))
        } else {
            Err(AeadError {
                kind: AeadErrorType::InvalidNonceLength {
                    expected: NONCE_LEN,
                },
            })
        }
    }
}

impl AeadCipher for XChaCha20Poly1305 {
    fn mode(&self) -> EncryptMode {
        EncryptMode::XChaCha20Poly1305
    }

    fn encrypt(&self, nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, AeadError> {
        let nonce = Self::nonce(nonce)?;
        let mut buffer = plaintext.to_vec();
        self.cipher
            .encrypt_in_place(nonce, aad, &mut buffer)
            .map_err(|_| AeadError {
                kind: AeadErrorType::Unspecified,
            })?;

        Ok(buffer)
    }

    fn decrypt(&self, nonce: &[u8], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, AeadError> {
        let nonce = Self::nonce(nonce)?;
        let mut buffer = ciphertext.to_vec();
        self.cipher
            .decrypt_in_place(nonce, aad, &mut buffer)
            .map_err(|_| AeadError {
                kind: AeadErrorType::Unspecified,
            })?;

        Ok(buffer)
    }
}
