use serde::{Deserialize, Serialize};
use twilight_model::id::Id;
use twilight_model::id::marker::GuildMarker;

/// Reattaches to a session that was previously established.
#[derive(Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct Resume {
    #[serde(rename = "server_id")]
    pub guild_id: Id<GuildMarker>,
    pub session_id: String,
    pub token: String,
}

impl std::fmt::Debug for Resume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resume")
            .field("guild_id", &self.guild_id)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}
