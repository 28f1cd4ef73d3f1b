//! TCP message client.

use crate::endpoint::Endpoint;
use crate::error::ConnectionError;
use crate::handler::{HandlerList, MessageHandler, spawn_read_loop};
use ferry_proto::Envelope;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::debug;

/// Client side of a message connection.
///
/// Owns one [`Endpoint`] and its read loop. Handlers registered here see
/// every inbound message while the endpoint is not diverted.
pub struct Client {
    endpoint: Arc<Endpoint>,
    handlers: HandlerList,
}

impl Client {
    /// Connect to `addr` and start the read loop.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::ConnectFailed` when the peer is
    /// unreachable.
    pub async fn connect(addr: &str) -> Result<Self, ConnectionError> {
        let stream =
            TcpStream::connect(addr)
                .await
                .map_err(|source| ConnectionError::ConnectFailed {
                    addr: addr.to_string(),
                    source,
                })?;
        debug!(%addr, "connected");

        let (reader, writer) = stream.into_split();
        let endpoint = Arc::new(Endpoint::new(addr, Box::new(writer)));
        let handlers = HandlerList::new();
        spawn_read_loop(reader, endpoint.clone(), handlers.clone());

        Ok(Self { endpoint, handlers })
    }

    /// Register a message handler.
    pub fn add_handler(&self, handler: Arc<dyn MessageHandler>) {
        self.handlers.add(handler);
    }

    /// The connection's endpoint.
    pub fn endpoint(&self) -> Arc<Endpoint> {
        self.endpoint.clone()
    }

    /// Send one message.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` when the connection is closed or broken.
    pub async fn send(&self, msg: &Envelope) -> Result<(), ConnectionError> {
        self.endpoint.send(msg).await
    }
}
