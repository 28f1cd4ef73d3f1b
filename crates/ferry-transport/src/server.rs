//! TCP message server.

use crate::endpoint::Endpoint;
use crate::error::ConnectionError;
use crate::handler::{HandlerList, MessageHandler, spawn_read_loop};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Accepts connections and drives a read loop per connection.
///
/// Every accepted connection becomes an [`Endpoint`] registered under an
/// opaque identity; all connections share one handler list. The server
/// never interprets messages itself.
pub struct Server {
    listener: TcpListener,
    handlers: HandlerList,
    endpoints: Arc<RwLock<HashMap<String, Arc<Endpoint>>>>,
    next_conn: AtomicU64,
}

impl Server {
    /// Bind a listener on `addr`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::Io` if binding fails.
    pub async fn bind(addr: &str) -> Result<Self, ConnectionError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            handlers: HandlerList::new(),
            endpoints: Arc::new(RwLock::new(HashMap::new())),
            next_conn: AtomicU64::new(0),
        })
    }

    /// The bound local address.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::Io` if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, ConnectionError> {
        Ok(self.listener.local_addr()?)
    }

    /// Register a message handler for all connections.
    pub fn add_handler(&self, handler: Arc<dyn MessageHandler>) {
        self.handlers.add(handler);
    }

    /// Number of currently connected endpoints.
    pub async fn connection_count(&self) -> usize {
        self.endpoints.read().await.len()
    }

    /// Accept connections until the task is dropped.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::Io` if accepting fails fatally.
    pub async fn run(self) -> Result<(), ConnectionError> {
        info!(addr = %self.local_addr()?, "server listening");
        loop {
            let (stream, peer) = self.listener.accept().await?;
            self.accept_connection(stream, peer);
        }
    }

    fn accept_connection(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let conn = self.next_conn.fetch_add(1, Ordering::Relaxed);
        let id = format!("{peer}#{conn}");
        debug!(endpoint = %id, "connection accepted");

        let (reader, writer) = stream.into_split();
        let endpoint = Arc::new(Endpoint::new(id.clone(), Box::new(writer)));

        let endpoints = self.endpoints.clone();
        let handlers = self.handlers.clone();
        tokio::spawn(async move {
            endpoints.write().await.insert(id.clone(), endpoint.clone());
            let read_loop = spawn_read_loop(reader, endpoint, handlers);
            let _ = read_loop.await;
            endpoints.write().await.remove(&id);
            debug!(endpoint = %id, "connection closed");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use async_trait::async_trait;
    use ferry_proto::{Envelope, MessageKind};
    use tokio::sync::mpsc;

    struct EchoHandler;

    #[async_trait]
    impl MessageHandler for EchoHandler {
        async fn handle_message(&self, endpoint: Arc<Endpoint>, msg: Envelope) {
            if msg.kind == MessageKind::Ping {
                let _ = endpoint.send(&Envelope::control(MessageKind::Ping)).await;
            }
        }
    }

    struct Forwarder(mpsc::Sender<Envelope>);

    #[async_trait]
    impl MessageHandler for Forwarder {
        async fn handle_message(&self, _endpoint: Arc<Endpoint>, msg: Envelope) {
            let _ = self.0.send(msg).await;
        }
    }

    #[tokio::test]
    async fn test_server_round_trip_with_client() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        server.add_handler(Arc::new(EchoHandler));
        tokio::spawn(server.run());

        let client = Client::connect(&addr.to_string()).await.unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        client.add_handler(Arc::new(Forwarder(tx)));

        client
            .send(&Envelope::control(MessageKind::Ping))
            .await
            .unwrap();

        let reply = rx.recv().await.unwrap();
        assert_eq!(reply.kind, MessageKind::Ping);
    }
}
