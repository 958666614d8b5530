//! Reliable control channel to the voice gateway.
//!
//! The session driver only talks to a [`Connector`]; the real one speaks
//! WebSocket through [`tokio_websockets`].
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use std::borrow::Cow;
use std::error::Error;
use std::pin::Pin;
use tokio_websockets::{CloseCode as WsCloseCode, Limits, Message as WsMessage};
use twilight_model::gateway::CloseFrame;

use super::ConnectionFuture;

/// Error raised by a control channel transport.
pub type TransportError = Box<dyn Error + Send + Sync>;

/// Frames that matter to the voice gateway protocol.
#[derive(Debug, Clone)]
pub enum GatewayMessage {
    Text(String),
    Close(Option<CloseFrame<'static>>),
}

pub type GatewaySink = Pin<Box<dyn Sink<GatewayMessage, Error = TransportError> + Send>>;
pub type GatewayStream =
    Pin<Box<dyn Stream<Item = Result<GatewayMessage, TransportError>> + Send>>;

/// One established control channel, split into its halves.
pub struct GatewayConnection {
    pub sink: GatewaySink,
    pub stream: GatewayStream,
}

impl std::fmt::Debug for GatewayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConnection").finish_non_exhaustive()
    }
}

/// Opens control channels.
pub trait Connector: std::fmt::Debug + Send + Sync + 'static {
    fn connect(&self, url: &str) -> ConnectionFuture<GatewayConnection, TransportError>;
}

/// [`Connector`] backed by [`tokio_websockets`].
///
/// TLS is picked from the URL scheme with whichever backend the crate
/// features enabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn connect(&self, url: &str) -> ConnectionFuture<GatewayConnection, TransportError> {
        let url = url.to_owned();
        ConnectionFuture::new(async move {
            let tls = tokio_websockets::Connector::new()?;
            let (connection, _response) = tokio_websockets::ClientBuilder::new()
                .uri(&url)?
                .limits(Limits::unlimited())
                .connector(&tls)
                .connect()
                .await?;

            let (sink, stream) = connection.split();
            let sink = sink
                .sink_map_err(|error| Box::new(error) as TransportError)
                .with(|message: GatewayMessage| {
                    future::ready(Ok::<_, TransportError>(into_ws(message)))
                });

            let stream = stream.filter_map(|item| {
                future::ready(match item {
                    Ok(message) => from_ws(&message).map(Ok),
                    Err(error) => Some(Err(Box::new(error) as TransportError)),
                })
            });

            Ok::<_, TransportError>(GatewayConnection {
                sink: Box::pin(sink),
                stream: Box::pin(stream),
            })
        })
    }
}

fn into_ws(message: GatewayMessage) -> WsMessage {
    match message {
        GatewayMessage::Text(text) => WsMessage::text(text),
        GatewayMessage::Close(frame) => WsMessage::close(
            frame
                .as_ref()
                .and_then(|frame| WsCloseCode::try_from(frame.code).ok()),
            frame.as_ref().map_or("", |frame| frame.reason.as_ref()),
        ),
    }
}

// Pings, pongs and binary frames carry nothing for the voice protocol.
fn from_ws(message: &WsMessage) -> Option<GatewayMessage> {
    if let Some((code, reason)) = message.as_close() {
        let frame = (code != WsCloseCode::NO_STATUS_RECEIVED).then(|| CloseFrame {
            code: code.into(),
            reason: Cow::Owned(reason.to_owned()),
        });
        Some(GatewayMessage::Close(frame))
    } else {
        message
            .as_text()
            .map(|text| GatewayMessage::Text(text.to_owned()))
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory control channel. Every successful `connect` hands the
    //! test a [`MockServer`] playing the gateway side of that connection.
    use super::{
        ConnectionFuture, Connector, GatewayConnection, GatewayMessage, TransportError,
    };
    use futures::channel::mpsc as fmpsc;
    use futures::{SinkExt, StreamExt};
    use serde::Serialize;
    use serde_json::Value;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use twilight_model::gateway::CloseFrame;
    use voicewire_types::{OpCode, decode_envelope, encode_envelope};

    #[derive(Debug, Clone)]
    pub struct MockConnector {
        refusals: Arc<AtomicUsize>,
        attempts: Arc<AtomicUsize>,
        servers: mpsc::UnboundedSender<MockServer>,
    }

    pub struct MockAcceptor {
        refusals: Arc<AtomicUsize>,
        attempts: Arc<AtomicUsize>,
        servers: mpsc::UnboundedReceiver<MockServer>,
    }

    impl MockConnector {
        pub fn new() -> (Self, MockAcceptor) {
            let refusals = Arc::new(AtomicUsize::new(0));
            let attempts = Arc::new(AtomicUsize::new(0));
            let (tx, rx) = mpsc::unbounded_channel();
            let connector = Self {
                refusals: refusals.clone(),
                attempts: attempts.clone(),
                servers: tx,
            };
            let acceptor = MockAcceptor {
                refusals,
                attempts,
                servers: rx,
            };
            (connector, acceptor)
        }
    }

    impl Connector for MockConnector {
        fn connect(&self, url: &str) -> ConnectionFuture<GatewayConnection, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let refused = self
                .refusals
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();

            let url = url.to_owned();
            let servers = self.servers.clone();
            ConnectionFuture::new(async move {
                if refused {
                    return Err::<GatewayConnection, TransportError>("connection refused".into());
                }

                let (client_tx, server_rx) = fmpsc::unbounded::<GatewayMessage>();
                let (server_tx, client_rx) =
                    fmpsc::unbounded::<Result<GatewayMessage, TransportError>>();

                servers
                    .send(MockServer {
                        url,
                        auto_ack: true,
                        incoming: server_rx,
                        outgoing: server_tx,
                    })
                    .map_err(|_| TransportError::from("acceptor dropped"))?;

                Ok(GatewayConnection {
                    sink: Box::pin(client_tx.sink_map_err(|e| Box::new(e) as TransportError)),
                    stream: Box::pin(client_rx),
                })
            })
        }
    }

    impl MockAcceptor {
        /// Refuses the next `n` connection attempts.
        pub fn refuse(&self, n: usize) {
            self.refusals.store(n, Ordering::SeqCst);
        }

        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        pub async fn accept(&mut self) -> MockServer {
            tokio::time::timeout(Duration::from_secs(10), self.servers.recv())
                .await
                .expect("no connection attempt within 10s")
                .expect("connector dropped")
        }

        /// Whether another connection shows up within `wait`.
        pub async fn try_accept(&mut self, wait: Duration) -> Option<MockServer> {
            tokio::time::timeout(wait, self.servers.recv())
                .await
                .ok()
                .flatten()
        }
    }

    pub struct MockServer {
        pub url: String,
        pub auto_ack: bool,
        incoming: fmpsc::UnboundedReceiver<GatewayMessage>,
        outgoing: fmpsc::UnboundedSender<Result<GatewayMessage, TransportError>>,
    }

    impl MockServer {
        pub fn send<T: Serialize>(&self, op: OpCode, data: &T) {
            let text = encode_envelope(op, data).unwrap();
            self.send_raw(&text);
        }

        pub fn send_raw(&self, text: &str) {
            _ = self
                .outgoing
                .unbounded_send(Ok(GatewayMessage::Text(text.to_owned())));
        }

        pub fn close(self, code: u16) {
            let frame = CloseFrame {
                code,
                reason: "".into(),
            };
            _ = self
                .outgoing
                .unbounded_send(Ok(GatewayMessage::Close(Some(frame))));
        }

        /// Raw next frame from the client, [`None`] once the client let go.
        pub async fn recv(&mut self) -> Option<GatewayMessage> {
            tokio::time::timeout(Duration::from_secs(10), self.incoming.next())
                .await
                .expect("client sent nothing within 10s")
        }

        /// Next command from the client, answering heartbeats on the way
        /// when `auto_ack` is set.
        pub async fn command(&mut self) -> (OpCode, Value) {
            loop {
                match self.recv().await {
                    Some(GatewayMessage::Text(text)) => {
                        let (op, data) = decode_envelope(&text).expect("client sent garbage");
                        if op == OpCode::Heartbeat && self.auto_ack {
                            self.send(OpCode::HeartbeatAck, &data);
                            continue;
                        }
                        return (op, data);
                    }
                    Some(GatewayMessage::Close(frame)) => {
                        panic!("expected a command, client closed with {frame:?}")
                    }
                    None => panic!("expected a command, client went away"),
                }
            }
        }

        /// Waits until the client closes this connection or drops it.
        pub async fn closed(&mut self) -> Option<CloseFrame<'static>> {
            loop {
                match self.recv().await {
                    Some(GatewayMessage::Close(frame)) => return frame,
                    Some(GatewayMessage::Text(..)) => {}
                    None => return None,
                }
            }
        }
    }
}
