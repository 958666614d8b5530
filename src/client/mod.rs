mod driver;
mod heartbeater;
mod info;
mod options;
mod state;


pub mod error;

pub use self::heartbeater::HeartbeatInfo;
pub use self::info::{ConnectionInfo, Token};
pub use self::options::{RetryPolicy, VoiceClientOptions};
pub use self::state::{ReconnectMode, VoiceClientState};

use self::driver::{Channels, Driver, Signal};
use self::error::{VoiceClientError, VoiceClientErrorType};
use self::heartbeater::Heartbeater;
use crate::audio::{AudioEncoder, AudioSink};
use crate::crypto::EncryptMode;
use crate::net::{Connector, VoiceUdp, WebSocketConnector};

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use voicewire_types::payload::{Speaking, SpeakingFlags};
use voicewire_types::{OpCode, encode_envelope};

/// How many speaking updates a slow subscriber may lag behind.
const SPEAKING_CAPACITY: usize = 16;

/// A client for one voice session.
///
/// It drives the voice gateway control channel in a background task:
/// connects (and reconnects) with [`ConnectionInfo`], performs the
/// identify or resume handshake, discovers its external address over UDP
/// and installs the session key. Audio goes through an [`AudioSink`] once
/// the client is [`Ready`].
///
/// Losing the control channel is handled internally. A session that was
/// ready before is resumed, anything else identifies from scratch.
///
/// ```no_run
/// # async fn run(info: voicewire::ConnectionInfo) -> Result<(), Box<dyn std::error::Error>> {
/// use voicewire::{VoiceClient, VoiceClientOptions};
///
/// let client = VoiceClient::new(info, VoiceClientOptions::default())?;
/// client.start()?;
/// client.wait_ready().await?;
/// // ...
/// client.close().await?;
/// # Ok(()) }
/// ```
///
/// [`Ready`]: VoiceClientState::Ready
pub struct VoiceClient {
    shared: Arc<Shared>,
    channels: Mutex<Option<Channels>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

/// Everything the client and its driver task look at.
pub(crate) struct Shared {
    info: ConnectionInfo,
    options: VoiceClientOptions,

    /// Configured encryption, checked at construction.
    mode: EncryptMode,
    connector: Arc<dyn Connector>,

    state: watch::Sender<VoiceClientState>,
    heartbeater: Heartbeater,
    udp: Arc<tokio::sync::Mutex<VoiceUdp>>,
    speaking: broadcast::Sender<Speaking>,

    outbound: mpsc::UnboundedSender<String>,
    signals: mpsc::UnboundedSender<Signal>,
    cancel: CancellationToken,
}

impl Shared {
    fn state(&self) -> VoiceClientState {
        *self.state.borrow()
    }

    /// Moves to `next` unless the client is already closed.
    fn set_state(&self, next: VoiceClientState) {
        self.state.send_if_modified(|state| {
            if state.is_closed() || *state == next {
                return false;
            }

            debug!(from = ?*state, to = ?next, "voice client state changed");
            *state = next;
            true
        });
    }

    /// Kills the heartbeater, closes the media transport and enters
    /// [`VoiceClientState::Closed`].
    async fn release(&self) {
        if !self.heartbeater.is_killed() {
            debug!("releasing voice session");
        }
        self.heartbeater.kill();
        self.udp.lock().await.close();
        self.set_state(VoiceClientState::Closed);
    }
}

impl VoiceClient {
    /// Creates a client that reaches the voice gateway over WebSocket.
    ///
    /// Nothing happens on the network until [`start`] is called.
    ///
    /// [`start`]: VoiceClient::start
    pub fn new(info: ConnectionInfo, options: VoiceClientOptions) -> Result<Self, VoiceClientError> {
        Self::with_connector(info, options, Arc::new(WebSocketConnector))
    }

    /// Creates a client that opens its control channels with `connector`.
    pub fn with_connector(
        info: ConnectionInfo,
        options: VoiceClientOptions,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, VoiceClientError> {
        let mode = match options.mode {
            Some(mode) if mode.is_available() => mode,
            Some(mode) => {
                return Err(VoiceClientError::with_source(
                    VoiceClientErrorType::Configuration,
                    format!("{mode:?} encryption was not compiled in"),
                ));
            }
            None => {
                return Err(VoiceClientError::with_source(
                    VoiceClientErrorType::Configuration,
                    "no encryption mode is available",
                ));
            }
        };

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (signals, signals_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(VoiceClientState::Disconnected);
        let (speaking, _) = broadcast::channel(SPEAKING_CAPACITY);

        let heartbeater = {
            let signals = signals.clone();
            Heartbeater::new(outbound.clone(), move || {
                _ = signals.send(Signal::ConnectionLost);
            })
        };

        let shared = Arc::new(Shared {
            info,
            options,
            mode,
            connector,
            state,
            heartbeater,
            udp: Arc::new(tokio::sync::Mutex::new(VoiceUdp::new())),
            speaking,
            outbound,
            signals,
            cancel: CancellationToken::new(),
        });

        Ok(Self {
            shared,
            channels: Mutex::new(Some(Channels {
                outbound: outbound_rx,
                signals: signals_rx,
            })),
            driver: Mutex::new(None),
        })
    }

    /// Spawns the connection task. Must be called within a Tokio runtime.
    pub fn start(&self) -> Result<(), VoiceClientError> {
        if self.shared.cancel.is_cancelled() {
            return Err(VoiceClientError::new(VoiceClientErrorType::Closed));
        }

        let Some(channels) = self.channels.lock().take() else {
            return Err(VoiceClientError::new(VoiceClientErrorType::AlreadyStarted));
        };

        debug!(guild_id = %self.shared.info.guild_id, "starting voice client");
        let driver = Driver::new(self.shared.clone(), channels);
        *self.driver.lock() = Some(tokio::spawn(driver.run()));
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> VoiceClientState {
        self.shared.state()
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<VoiceClientState> {
        self.shared.state.subscribe()
    }

    /// Waits until the session is [`Ready`].
    ///
    /// Fails with [`VoiceClientErrorType::Closed`] if the client closes first.
    ///
    /// [`Ready`]: VoiceClientState::Ready
    pub async fn wait_ready(&self) -> Result<(), VoiceClientError> {
        wait_ready(&mut self.watch_state()).await
    }

    /// Drops the current session and identifies from scratch.
    pub fn restart(&self) -> Result<(), VoiceClientError> {
        if self.shared.cancel.is_cancelled() {
            return Err(VoiceClientError::new(VoiceClientErrorType::Closed));
        }

        self.shared
            .signals
            .send(Signal::Restart)
            .map_err(|_| VoiceClientError::new(VoiceClientErrorType::Closed))
    }

    /// Announces our speaking state for the session's media source.
    pub async fn speaking(&self, flags: SpeakingFlags) -> Result<(), VoiceClientError> {
        if !self.state().is_ready() {
            return Err(VoiceClientError::new(VoiceClientErrorType::NotConnected));
        }

        let ssrc = self.shared.udp.lock().await.ssrc();
        let text = encode_envelope(OpCode::Speaking, &Speaking::announce(flags, ssrc))
            .map_err(|source| {
                VoiceClientError::with_source(VoiceClientErrorType::SendingMessage, source)
            })?;

        self.shared
            .outbound
            .send(text)
            .map_err(|_| VoiceClientError::new(VoiceClientErrorType::Closed))
    }

    /// Speaking updates relayed by the server for other participants.
    #[must_use]
    pub fn subscribe_speaking(&self) -> broadcast::Receiver<Speaking> {
        self.shared.speaking.subscribe()
    }

    #[must_use]
    pub fn heartbeat(&self) -> HeartbeatInfo {
        self.shared.heartbeater.info()
    }

    /// Creates a sink that turns raw audio frames into media packets
    /// with `encoder`.
    #[must_use]
    pub fn audio_sink<E: AudioEncoder>(&self, encoder: E) -> AudioSink<E> {
        AudioSink::new(encoder, self.watch_state(), self.shared.udp.clone())
    }

    /// Ends the session for good and releases the sockets.
    ///
    /// Calling it again does nothing.
    pub async fn close(&self) -> Result<(), VoiceClientError> {
        self.shared.cancel.cancel();
        self.channels.lock().take();

        let handle = self.driver.lock().take();
        let joined = match handle {
            Some(handle) => handle
                .await
                .map_err(|source| VoiceClientError::with_source(VoiceClientErrorType::Shutdown, source)),
            None => Ok(()),
        };

        self.shared.release().await;
        joined
    }
}

impl Drop for VoiceClient {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl std::fmt::Debug for VoiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceClient")
            .field("info", &self.shared.info)
            .field("state", &self.state())
            .field("heartbeater", &self.shared.heartbeater)
            .finish_non_exhaustive()
    }
}

pub(crate) async fn wait_ready(
    state: &mut watch::Receiver<VoiceClientState>,
) -> Result<(), VoiceClientError> {
    let ready = state
        .wait_for(|state| state.is_ready() || state.is_closed())
        .await
        .map_err(|_| VoiceClientError::new(VoiceClientErrorType::Closed))?
        .is_ready();

    if ready {
        Ok(())
    } else {
        Err(VoiceClientError::new(VoiceClientErrorType::Closed))
    }
}
