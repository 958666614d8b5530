use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use twilight_model::id::{Id, marker::UserMarker};

/// Speaking state of a media source.
///
/// Clients announce their own state with `delay` set and no `user_id`;
/// the server relays other participants' state with `user_id` set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct Speaking {
    pub speaking: SpeakingFlags,
    pub ssrc: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Id<UserMarker>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
}

impl Speaking {
    /// Announcement of our own speaking state for the given media source.
    #[must_use]
    pub const fn announce(speaking: SpeakingFlags, ssrc: u32) -> Self {
        Self {
            speaking,
            ssrc,
            user_id: None,
            delay: Some(0),
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
    pub struct SpeakingFlags: u8 {
        const MICROPHONE = 1 << 0;
        const SOUNDSHARE = 1 << 1;
        const PRIORITY = 1 << 2;
    }
}

impl<'de> Deserialize<'de> for SpeakingFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self::from_bits_truncate(u8::deserialize(deserializer)?))
    }
}

impl Serialize for SpeakingFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.bits())
    }
}
