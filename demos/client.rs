//! Joins a voice session described by environment variables and plays a
//! few seconds of silence.
//!
//! The values come from the voice state and voice server updates of the
//! main gateway: `VOICE_ENDPOINT`, `VOICE_TOKEN`, `SESSION_ID`, `GUILD_ID`
//! and `USER_ID`. A `.env` file works too.
use anyhow::{Context as _, Result};
use std::error::Error;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use twilight_model::id::Id;
use voicewire::audio::{FRAME_DURATION, SILENCE_FRAME};
use voicewire::{ConnectionInfo, VoiceClient, VoiceClientOptions};

const PLAYBACK: Duration = Duration::from_secs(5);

fn parse_id_from_env<T>(env: &'static str) -> Result<Id<T>> {
    let content = dotenvy::var(env).with_context(|| format!("Missing `{env}` environment variable"))?;
    Id::<T>::from_str(&content).with_context(|| format!("could not parse snowflake of {env:?}"))
}

// Stands in for a real Opus encoder.
fn silence(_: &[f32], _: usize) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>> {
    Ok(SILENCE_FRAME.to_vec())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let info = ConnectionInfo {
        endpoint: dotenvy::var("VOICE_ENDPOINT").context("Missing `VOICE_ENDPOINT` environment variable")?,
        guild_id: parse_id_from_env("GUILD_ID")?,
        session_id: dotenvy::var("SESSION_ID").context("Missing `SESSION_ID` environment variable")?,
        token: dotenvy::var("VOICE_TOKEN")
            .context("Missing `VOICE_TOKEN` environment variable")?
            .into(),
        user_id: parse_id_from_env("USER_ID")?,
    };

    let client = VoiceClient::new(info, VoiceClientOptions::default())?;
    client.start()?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            warn!("ctrl+c detected, closing voice client...");
            client.close().await?;
            return Ok(());
        }
        result = client.wait_ready() => result?,
    }
    info!("voice client is ready, playing silence");

    #[allow(clippy::cast_possible_truncation)]
    let frames = (PLAYBACK.as_millis() / FRAME_DURATION.as_millis()) as usize;
    let mut sink = client.audio_sink(silence);
    let playback = sink.play(futures::stream::iter(vec![[0.0_f32; 1920]; frames]));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => warn!("ctrl+c detected, stopping playback..."),
        result = playback => result?,
    }

    info!(heartbeat = ?client.heartbeat(), "closing voice client");
    client.close().await?;
    Ok(())
}
