//! Turns application audio into media packets.
//!
//! Encoding is left to an [`AudioEncoder`] supplied by the caller, usually
//! an Opus encoder configured for 48 kHz stereo.
use crate::client::error::{VoiceClientError, VoiceClientErrorType};
use crate::client::{VoiceClientState, wait_ready};
use crate::net::VoiceUdp;

use futures::{Stream, StreamExt};
use std::error::Error;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

/// Samples per channel in one 20 ms frame at 48 kHz.
pub const FRAME_SIZE: usize = 960;

/// Playback pace.
pub const FRAME_DURATION: Duration = Duration::from_millis(20);

/// An Opus frame of silence.
pub const SILENCE_FRAME: [u8; 3] = [0xF8, 0xFF, 0xFE];

/// Silence sent after a stream ends so the receiving side does not
/// interpolate past the last real frame.
const TRAILING_SILENCE_FRAMES: usize = 5;

/// Encodes raw PCM frames for transmission.
pub trait AudioEncoder: Send {
    fn encode(
        &mut self,
        frame: &[f32],
        frame_size: usize,
    ) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>>;
}

impl<F> AudioEncoder for F
where
    F: FnMut(&[f32], usize) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>> + Send,
{
    fn encode(
        &mut self,
        frame: &[f32],
        frame_size: usize,
    ) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>> {
        self(frame, frame_size)
    }
}

/// Feeds encoded frames into a voice session's media transport.
///
/// Created with [`VoiceClient::audio_sink`]. Every call waits until the
/// session is ready, so frames are never sent during a handshake.
///
/// [`VoiceClient::audio_sink`]: crate::VoiceClient::audio_sink
pub struct AudioSink<E> {
    encoder: E,
    state: watch::Receiver<VoiceClientState>,
    udp: Arc<Mutex<VoiceUdp>>,
}

impl<E: AudioEncoder> AudioSink<E> {
    pub(crate) fn new(
        encoder: E,
        state: watch::Receiver<VoiceClientState>,
        udp: Arc<Mutex<VoiceUdp>>,
    ) -> Self {
        Self {
            encoder,
            state,
            udp,
        }
    }

    /// Encodes and sends one frame of [`FRAME_SIZE`] samples per channel.
    ///
    /// A frame the encoder rejects goes out as silence. Fails with
    /// [`VoiceClientErrorType::Closed`] once the client is closed and with
    /// [`VoiceClientErrorType::SendingPacket`] if the packet could not be
    /// sent; the session itself is unaffected by the latter.
    pub async fn send(&mut self, frame: &[f32]) -> Result<(), VoiceClientError> {
        wait_ready(&mut self.state).await?;

        let payload = match self.encoder.encode(frame, FRAME_SIZE) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(?error, "could not encode audio frame, sending silence");
                SILENCE_FRAME.to_vec()
            }
        };
        self.transmit(&payload).await
    }

    /// Plays `frames` at real-time pace until the stream ends or the
    /// client closes.
    ///
    /// Frames that fail to send are skipped.
    pub async fn play<S>(&mut self, frames: S) -> Result<(), VoiceClientError>
    where
        S: Stream,
        S::Item: AsRef<[f32]>,
    {
        let mut frames = pin!(frames);
        let mut interval = tokio::time::interval(FRAME_DURATION);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut sent = 0_usize;
        while let Some(frame) = frames.next().await {
            interval.tick().await;
            match self.send(frame.as_ref()).await {
                Ok(()) => sent += 1,
                Err(error) if error.kind() == &VoiceClientErrorType::Closed => return Err(error),
                Err(error) => warn!(%error, "dropped audio frame"),
            }
        }

        for _ in 0..TRAILING_SILENCE_FRAMES {
            interval.tick().await;
            wait_ready(&mut self.state).await?;
            self.transmit(&SILENCE_FRAME).await?;
        }

        debug!(sent, "finished playing");
        Ok(())
    }

    /// Sends `payload`, retrying once, and advances the counters only if
    /// it went out.
    async fn transmit(&self, payload: &[u8]) -> Result<(), VoiceClientError> {
        let mut udp = self.udp.lock().await;
        let result = match udp.send_frame(payload).await {
            Ok(()) => Ok(()),
            Err(error) => {
                trace!(?error, "retrying media packet");
                udp.send_frame(payload).await
            }
        };

        match result {
            Ok(()) => {
                // FRAME_SIZE fits in u32.
                #[allow(clippy::cast_possible_truncation)]
                udp.advance(FRAME_SIZE as u32);
                Ok(())
            }
            Err(source) => {
                warn!(error = ?source, "could not send media packet");
                Err(VoiceClientError::with_source(
                    VoiceClientErrorType::SendingPacket,
                    source,
                ))
            }
        }
    }
}

impl<E> std::fmt::Debug for AudioSink<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSink")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}
