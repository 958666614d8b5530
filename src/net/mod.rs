pub mod gateway;
pub mod udp;

pub use self::gateway::{Connector, GatewayConnection, GatewayMessage, WebSocketConnector};
pub use self::internal::ConnectionFuture;
pub use self::udp::VoiceUdp;

pub(crate) mod internal {
    use std::pin::Pin;

    /// Wrapper struct around an `async fn` with a `Debug` implementation.
    pub struct ConnectionFuture<T, E>(pub Pin<Box<dyn Future<Output = Result<T, E>> + Send>>);

    impl<T, E> ConnectionFuture<T, E> {
        #[must_use]
        pub fn new<F: Future<Output = Result<T, E>> + Send + 'static>(future: F) -> Self {
            Self(Box::pin(future))
        }
    }

    impl<T, E> std::fmt::Debug for ConnectionFuture<T, E> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_tuple("ConnectionFuture")
                .field(&"<async fn>")
                .finish()
        }
    }

    impl<T, E> Future for ConnectionFuture<T, E> {
        type Output = Result<T, E>;

        fn poll(
            mut self: Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Self::Output> {
            self.0.as_mut().poll(cx)
        }
    }
}
