//! The task behind a [`VoiceClient`]: keeps the control channel open and
//! walks every connection through the handshake.
//!
//! [`VoiceClient`]: super::VoiceClient
use super::Shared;
use super::error::{VoiceClientError, VoiceClientErrorType};
use super::state::{ReconnectMode, VoiceClientState};
use crate::crypto::EncryptMode;
use crate::net::gateway::{GatewayConnection, GatewayMessage, GatewaySink};

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use twilight_model::gateway::CloseFrame;
use voicewire_types::payload::incoming::{Hello, Ready, SessionDescription};
use voicewire_types::payload::outgoing::{Identify, Resume, SelectProtocol};
use voicewire_types::payload::{Event, Speaking};
use voicewire_types::{ClosePolicy, CloseCode, OpCode, decode_envelope, encode_envelope};

/// A close frame should not hold up a reconnect for long.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Requests for the driver coming from outside the read loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    /// The heartbeater gave up on the current connection.
    ConnectionLost,

    /// The caller asked for a fresh session.
    Restart,
}

/// Receiving halves owned by the driver once it runs.
#[derive(Debug)]
pub(crate) struct Channels {
    pub outbound: mpsc::UnboundedReceiver<String>,
    pub signals: mpsc::UnboundedReceiver<Signal>,
}

enum Outcome {
    Closed,
    Reconnect(ReconnectMode),
}

pub(crate) struct Driver {
    shared: Arc<Shared>,
    channels: Channels,

    /// Whether a session reached `Ready` and can be resumed.
    established: bool,

    /// Encryption agreed on in `ready`, consumed by `session_description`.
    negotiated: Option<EncryptMode>,
}

impl Driver {
    pub fn new(shared: Arc<Shared>, channels: Channels) -> Self {
        Self {
            shared,
            channels,
            established: false,
            negotiated: None,
        }
    }

    pub async fn run(mut self) {
        let mut mode = ReconnectMode::Identify;
        while let Some(connection) = self.connect().await {
            match self.run_connection(connection, mode).await {
                Outcome::Closed => break,
                Outcome::Reconnect(next) => {
                    debug!(mode = ?next, "reconnecting to voice gateway");
                    self.shared.heartbeater.pause();
                    mode = next;
                }
            }
        }

        self.shared.cancel.cancel();
        self.shared.release().await;
    }

    /// Opens the control channel, retrying until it works or the client
    /// is closed.
    async fn connect(&self) -> Option<GatewayConnection> {
        let url = self.shared.info.gateway_url(self.shared.options.tls);
        let retry = self.shared.options.retry;
        let cancel = &self.shared.cancel;

        self.shared.set_state(VoiceClientState::Connecting);
        let mut attempts = 0_u32;
        loop {
            attempts = attempts.saturating_add(1);
            debug!(%url, attempts, "connecting to voice gateway");

            let attempt = tokio::time::timeout(retry.timeout, self.shared.connector.connect(&url));
            let result = tokio::select! {
                () = cancel.cancelled() => return None,
                result = attempt => result,
            };

            match result {
                Ok(Ok(connection)) => return Some(connection),
                Ok(Err(error)) => warn!(?error, attempts, "could not connect to voice gateway"),
                Err(..) => warn!(attempts, "timed out connecting to voice gateway"),
            }

            tokio::select! {
                () = cancel.cancelled() => return None,
                () = tokio::time::sleep(retry.delay) => {}
            }
        }
    }

    async fn run_connection(
        &mut self,
        connection: GatewayConnection,
        mut mode: ReconnectMode,
    ) -> Outcome {
        let GatewayConnection {
            mut sink,
            mut stream,
        } = connection;

        // Anything queued for the previous connection is stale by now.
        while self.channels.outbound.try_recv().is_ok() {}
        while let Ok(signal) = self.channels.signals.try_recv() {
            if signal == Signal::Restart {
                self.established = false;
                mode = ReconnectMode::Identify;
            }
        }

        self.negotiated = None;
        self.shared.set_state(VoiceClientState::AwaitingHello);

        let cancel = self.shared.cancel.clone();
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    close_sink(&mut sink, CloseFrame::NORMAL).await;
                    return Outcome::Closed;
                }
                Some(signal) = self.channels.signals.recv() => match signal {
                    Signal::ConnectionLost => {
                        close_sink(&mut sink, CloseFrame::RESUME).await;
                        return Outcome::Reconnect(self.resume_mode());
                    }
                    Signal::Restart => {
                        debug!("restarting voice session");
                        close_sink(&mut sink, CloseFrame::NORMAL).await;
                        self.established = false;
                        return Outcome::Reconnect(ReconnectMode::Identify);
                    }
                },
                Some(text) = self.channels.outbound.recv() => {
                    if let Err(error) = sink.send(GatewayMessage::Text(text)).await {
                        warn!(?error, "could not write to voice gateway");
                        return Outcome::Reconnect(self.resume_mode());
                    }
                }
                message = stream.next() => match message {
                    Some(Ok(GatewayMessage::Text(text))) => {
                        let step = tokio::select! {
                            () = cancel.cancelled() => return Outcome::Closed,
                            step = self.dispatch(&mut sink, mode, &text) => step,
                        };

                        if let Err(error) = step {
                            warn!(%error, "voice session step failed");
                            return Outcome::Reconnect(self.resume_mode());
                        }
                    }
                    Some(Ok(GatewayMessage::Close(frame))) => {
                        let code = frame.as_ref().map(|frame| frame.code);
                        return match CloseCode::policy_for(code) {
                            ClosePolicy::Stop => {
                                warn!(?code, "voice gateway ended the session");
                                Outcome::Closed
                            }
                            ClosePolicy::Reidentify => {
                                debug!(?code, "voice session expired");
                                self.established = false;
                                Outcome::Reconnect(ReconnectMode::Identify)
                            }
                            ClosePolicy::Reconnect => {
                                debug!(?code, "voice gateway closed the connection");
                                Outcome::Reconnect(self.resume_mode())
                            }
                        };
                    }
                    Some(Err(error)) => {
                        warn!(?error, "voice gateway connection failed");
                        return Outcome::Reconnect(self.resume_mode());
                    }
                    None => {
                        debug!("voice gateway connection dropped");
                        return Outcome::Reconnect(self.resume_mode());
                    }
                },
            }
        }
    }

    const fn resume_mode(&self) -> ReconnectMode {
        if self.established {
            ReconnectMode::Resume
        } else {
            ReconnectMode::Identify
        }
    }

    /// Handles one text frame. Frames that cannot be understood are
    /// dropped without touching the session.
    async fn dispatch(
        &mut self,
        sink: &mut GatewaySink,
        mode: ReconnectMode,
        text: &str,
    ) -> Result<(), VoiceClientError> {
        let Some((op, data)) = decode_envelope(text) else {
            trace!(len = text.len(), "dropping malformed voice gateway frame");
            return Ok(());
        };

        let event = match Event::from_envelope(op, data) {
            Ok(event) => event,
            Err(source) => {
                let error = VoiceClientError::with_source(
                    VoiceClientErrorType::Deserializing {
                        event: format!("{op:?}"),
                    },
                    source,
                );
                warn!(%error, "dropping voice gateway frame");
                return Ok(());
            }
        };

        trace!(event = event.name(), "received voice gateway event");
        match event {
            Event::Hello(hello) => self.on_hello(sink, mode, &hello).await,
            Event::Ready(ready) => self.on_ready(sink, ready).await,
            Event::SessionDescription(description) => {
                self.on_session_description(sink, &description).await
            }
            Event::HeartbeatAck => {
                self.shared.heartbeater.ack();
                Ok(())
            }
            Event::Speaking(speaking) => {
                trace!(ssrc = speaking.ssrc, user_id = ?speaking.user_id, "speaking update");
                // Nobody listening is fine.
                _ = self.shared.speaking.send(speaking);
                Ok(())
            }
            Event::Resumed => self.on_resumed().await,
            Event::Unexpected(op) => {
                trace!(?op, "ignoring client-only opcode");
                Ok(())
            }
        }
    }

    async fn on_hello(
        &mut self,
        sink: &mut GatewaySink,
        mode: ReconnectMode,
        hello: &Hello,
    ) -> Result<(), VoiceClientError> {
        let interval = hello.interval();
        let heartbeater = &self.shared.heartbeater;
        heartbeater.ack();
        heartbeater.start(interval);

        if self.shared.state() != VoiceClientState::AwaitingHello {
            debug!(?interval, "heartbeat interval changed");
            return Ok(());
        }

        debug!(?interval, ?mode, "received hello");
        self.shared.set_state(mode.handshake_state());

        let info = &self.shared.info;
        match mode {
            ReconnectMode::Identify => {
                let identify = Identify {
                    guild_id: info.guild_id,
                    user_id: info.user_id,
                    session_id: info.session_id.clone(),
                    token: info.token.expose().to_owned(),
                };
                send(sink, OpCode::Identify, &identify).await?;
                self.shared.set_state(VoiceClientState::AwaitingReady);
            }
            ReconnectMode::Resume => {
                let resume = Resume {
                    guild_id: info.guild_id,
                    session_id: info.session_id.clone(),
                    token: info.token.expose().to_owned(),
                };
                send(sink, OpCode::Resume, &resume).await?;
            }
        }
        Ok(())
    }

    async fn on_ready(
        &mut self,
        sink: &mut GatewaySink,
        ready: Ready,
    ) -> Result<(), VoiceClientError> {
        if self.shared.state() != VoiceClientState::AwaitingReady {
            return Err(VoiceClientError::with_source(
                VoiceClientErrorType::Protocol,
                "ready arrived outside of a handshake",
            ));
        }

        debug!(ssrc = ready.ssrc, ip = ?ready.ip, port = ready.port, "received ready");
        self.shared.set_state(VoiceClientState::DiscoveringUdp);

        let mode = EncryptMode::negotiate(self.shared.mode, &ready.modes).ok_or_else(|| {
            VoiceClientError::with_source(
                VoiceClientErrorType::Protocol,
                format!("no usable encryption mode in {:?}", ready.modes),
            )
        })?;

        let external = {
            let mut udp = self.shared.udp.lock().await;
            tokio::time::timeout(
                self.shared.options.handshake_timeout,
                udp.discover(ready.ssrc, ready.ip, ready.port),
            )
            .await
            .map_err(|source| {
                VoiceClientError::with_source(VoiceClientErrorType::Handshaking, source)
            })?
            .map_err(|source| {
                VoiceClientError::with_source(VoiceClientErrorType::Handshaking, source)
            })?
        };

        self.shared.set_state(VoiceClientState::SelectingProtocol);
        let select = SelectProtocol::udp(external.address, external.port, mode.to_request_str());
        send(sink, OpCode::SelectProtocol, &select).await?;

        self.negotiated = Some(mode);
        self.shared
            .set_state(VoiceClientState::AwaitingSessionDescription);
        Ok(())
    }

    async fn on_session_description(
        &mut self,
        sink: &mut GatewaySink,
        description: &SessionDescription,
    ) -> Result<(), VoiceClientError> {
        let Some(negotiated) = self.negotiated.take() else {
            return Err(VoiceClientError::with_source(
                VoiceClientErrorType::Protocol,
                "session_description arrived before ready",
            ));
        };

        let mode = description
            .mode
            .parse::<EncryptMode>()
            .map_err(|source| VoiceClientError::with_source(VoiceClientErrorType::Protocol, source))?;
        if mode != negotiated {
            warn!(requested = ?negotiated, responded = ?mode, "server picked another encryption mode");
        }

        let ssrc = {
            let mut udp = self.shared.udp.lock().await;
            udp.configure(mode, &description.secret_key)
                .map_err(|source| {
                    VoiceClientError::with_source(VoiceClientErrorType::Handshaking, source)
                })?;
            udp.ssrc()
        };

        let speaking = Speaking::announce(self.shared.options.speaking, ssrc);
        send(sink, OpCode::Speaking, &speaking).await?;

        self.established = true;
        self.shared.set_state(VoiceClientState::Ready);
        debug!(ssrc, ?mode, "voice session is ready");
        Ok(())
    }

    async fn on_resumed(&mut self) -> Result<(), VoiceClientError> {
        if self.shared.state() != VoiceClientState::Resuming {
            return Err(VoiceClientError::with_source(
                VoiceClientErrorType::Protocol,
                "resumed arrived without a resume",
            ));
        }

        if !self.shared.udp.lock().await.is_configured() {
            self.established = false;
            return Err(VoiceClientError::with_source(
                VoiceClientErrorType::Protocol,
                "resumed a session without media transport",
            ));
        }

        self.shared.heartbeater.resume();
        self.shared.set_state(VoiceClientState::Ready);
        debug!("voice session resumed");
        Ok(())
    }
}

async fn send<T: Serialize>(
    sink: &mut GatewaySink,
    op: OpCode,
    data: &T,
) -> Result<(), VoiceClientError> {
    let text = encode_envelope(op, data)
        .map_err(|source| VoiceClientError::with_source(VoiceClientErrorType::SendingMessage, source))?;

    trace!(?op, "sending voice gateway command");
    sink.send(GatewayMessage::Text(text))
        .await
        .map_err(|source| VoiceClientError::with_source(VoiceClientErrorType::SendingMessage, source))
}

async fn close_sink(sink: &mut GatewaySink, frame: CloseFrame<'static>) {
    let close = sink.send(GatewayMessage::Close(Some(frame)));
    match tokio::time::timeout(CLOSE_TIMEOUT, close).await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => trace!(?error, "could not close voice gateway connection"),
        Err(..) => trace!("timed out closing voice gateway connection"),
    }
}
