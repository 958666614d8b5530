use std::str::FromStr;

/// Media encryption modes this crate knows how to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EncryptMode {
    /// `XChaCha20-Poly1305` with the packet header zero-padded as the nonce.
    XChaCha20Poly1305,
}

impl EncryptMode {
    /// Every known mode, most preferred first.
    pub const ALL: &'static [Self] = &[Self::XChaCha20Poly1305];

    /// Whether an implementation for this mode was compiled in.
    #[must_use]
    pub const fn is_available(self) -> bool {
        match self {
            Self::XChaCha20Poly1305 => cfg!(feature = "xchacha20poly1305"),
        }
    }

    /// Most preferred mode that is available in this build.
    #[must_use]
    pub fn preferred() -> Option<Self> {
        Self::ALL.iter().copied().find(|mode| mode.is_available())
    }

    /// Required size of a nonce for a particular mode.
    #[must_use]
    pub const fn nonce_size(self) -> usize {
        match self {
            Self::XChaCha20Poly1305 => 24,
        }
    }

    /// Picks the mode to use given what the server offered in `ready`.
    ///
    /// The configured mode wins whenever the server offers it, or when the
    /// server did not offer anything. Otherwise the most preferred available
    /// mode that the server supports is picked.
    #[must_use]
    pub fn negotiate<T: AsRef<str>>(configured: Self, offered: &[T]) -> Option<Self> {
        if offered.is_empty() {
            return Some(configured);
        }

        let offered = offered
            .iter()
            .filter_map(|mode| Self::from_str(mode.as_ref()).ok())
            .filter(|mode| mode.is_available())
            .collect::<Vec<_>>();

        if offered.contains(&configured) {
            return Some(configured);
        }

        Self::ALL
            .iter()
            .copied()
            .find(|mode| offered.contains(mode))
    }

    /// Returns the name of a mode as it appears on the wire.
    #[must_use]
    pub const fn to_request_str(self) -> &'static str {
        match self {
            Self::XChaCha20Poly1305 => "xchacha20_poly1305",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEncryptMode {
    mode: String,
}

impl UnknownEncryptMode {
    #[must_use]
    pub fn mode(&self) -> &str {
        &self.mode
    }
}

impl std::fmt::Display for UnknownEncryptMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("unknown encrypt mode: ")?;
        std::fmt::Debug::fmt(&self.mode, f)
    }
}

impl std::error::Error for UnknownEncryptMode {}

impl FromStr for EncryptMode {
    type Err = UnknownEncryptMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xchacha20_poly1305" => Ok(Self::XChaCha20Poly1305),
            _ => Err(UnknownEncryptMode {
                mode: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_names() {
        for mode in EncryptMode::ALL {
            assert_eq!(EncryptMode::from_str(mode.to_request_str()), Ok(*mode));
        }

        let error = EncryptMode::from_str("xsalsa20_poly1305_lite").unwrap_err();
        assert_eq!(error.mode(), "xsalsa20_poly1305_lite");
    }

    #[test]
    fn negotiation_without_offer_keeps_configured() {
        let offered: [&str; 0] = [];
        assert_eq!(
            EncryptMode::negotiate(EncryptMode::XChaCha20Poly1305, &offered),
            Some(EncryptMode::XChaCha20Poly1305)
        );
    }

    #[test]
    fn negotiation_without_overlap() {
        assert_eq!(
            EncryptMode::negotiate(
                EncryptMode::XChaCha20Poly1305,
                &["xsalsa20_poly1305", "aead_aes256_gcm"]
            ),
            None
        );
    }

    #[cfg(feature = "xchacha20poly1305")]
    #[test]
    fn negotiation_picks_offered() {
        assert_eq!(EncryptMode::preferred(), Some(EncryptMode::XChaCha20Poly1305));
        assert_eq!(
            EncryptMode::negotiate(
                EncryptMode::XChaCha20Poly1305,
                &["xsalsa20_poly1305", "xchacha20_poly1305"]
            ),
            Some(EncryptMode::XChaCha20Poly1305)
        );
    }
}
