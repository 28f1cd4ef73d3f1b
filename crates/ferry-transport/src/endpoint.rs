//! Stream endpoints.

use crate::error::ConnectionError;
use ferry_proto::{Envelope, write_frame};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::AsyncWrite;
use tokio::sync::{Mutex, mpsc};

/// Capacity of the per-endpoint diversion queue.
///
/// The queue is bounded so a fast producer blocks instead of dropping,
/// backpressuring the peer's chunk loop through the connection.
pub const DIVERSION_QUEUE_DEPTH: usize = 10;

/// One side of a message connection.
///
/// Wraps the outbound half of a connection with a uniform `send` contract
/// and owns the diversion queue for its inbound traffic. Inbound frames are
/// read by an external read loop (see [`crate::spawn_read_loop`]) which
/// either pushes to the diversion queue or dispatches to registered
/// handlers; exactly one of the two consumes the endpoint at any instant.
///
/// `send` is safe to call concurrently with receiving. Concurrent `send`
/// calls serialize on the internal writer lock.
pub struct Endpoint {
    id: String,
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    diverted: AtomicBool,
    divert_tx: mpsc::Sender<Envelope>,
    divert_rx: Mutex<mpsc::Receiver<Envelope>>,
}

impl Endpoint {
    /// Wrap the outbound half of a connection.
    pub fn new(id: impl Into<String>, writer: Box<dyn AsyncWrite + Send + Unpin>) -> Self {
        let (divert_tx, divert_rx) = mpsc::channel(DIVERSION_QUEUE_DEPTH);
        Self {
            id: id.into(),
            writer: Mutex::new(writer),
            diverted: AtomicBool::new(false),
            divert_tx,
            divert_rx: Mutex::new(divert_rx),
        }
    }

    /// Opaque identity of the underlying connection.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Send one message on the underlying connection.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` when the connection is closed or broken.
    /// The send is not retried.
    pub async fn send(&self, msg: &Envelope) -> Result<(), ConnectionError> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, msg).await?;
        Ok(())
    }

    /// Whether inbound messages are currently diverted to the queue.
    pub fn is_diverted(&self) -> bool {
        self.diverted.load(Ordering::SeqCst)
    }

    /// Redirect inbound messages into the diversion queue.
    pub fn start_diversion(&self) {
        self.diverted.store(true, Ordering::SeqCst);
    }

    /// Restore handler dispatch for inbound messages.
    pub fn stop_diversion(&self) {
        self.diverted.store(false, Ordering::SeqCst);
    }

    /// Take the next diverted message, waiting until one is available.
    ///
    /// Returns `None` only if the endpoint itself is gone, which cannot
    /// happen while the caller holds a reference; callers treat `None` as
    /// connection teardown.
    pub async fn next_diverted(&self) -> Option<Envelope> {
        let mut rx = self.divert_rx.lock().await;
        rx.recv().await
    }

    /// Push an inbound message into the diversion queue.
    ///
    /// Blocks when the queue is full. Called only by the read loop.
    pub(crate) async fn push_diverted(&self, msg: Envelope) {
        // The receiver lives inside self, so send can only fail if the
        // endpoint is being dropped; nothing to do then.
        let _ = self.divert_tx.send(msg).await;
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("diverted", &self.is_diverted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_proto::{MessageKind, read_frame};

    #[tokio::test]
    async fn test_send_writes_a_frame() {
        let (client, mut server) = tokio::io::duplex(1024);
        let ep = Endpoint::new("test", Box::new(client));

        ep.send(&Envelope::control(MessageKind::Ping)).await.unwrap();

        let read = read_frame(&mut server).await.unwrap();
        assert_eq!(read.kind, MessageKind::Ping);
    }

    #[tokio::test]
    async fn test_send_on_closed_connection_fails() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let ep = Endpoint::new("test", Box::new(client));

        let res = ep.send(&Envelope::control(MessageKind::Ping)).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn test_diversion_toggle() {
        let (client, _server) = tokio::io::duplex(64);
        let ep = Endpoint::new("test", Box::new(client));

        assert!(!ep.is_diverted());
        ep.start_diversion();
        assert!(ep.is_diverted());
        ep.stop_diversion();
        assert!(!ep.is_diverted());
    }

    #[tokio::test]
    async fn test_diverted_messages_queue_in_order() {
        let (client, _server) = tokio::io::duplex(64);
        let ep = Endpoint::new("test", Box::new(client));
        ep.start_diversion();

        for i in 0..3u8 {
            ep.push_diverted(Envelope::with_payload(MessageKind::FileData, vec![i]))
                .await;
        }
        for i in 0..3u8 {
            let msg = ep.next_diverted().await.unwrap();
            assert_eq!(msg.payload, vec![i]);
        }
    }
}
