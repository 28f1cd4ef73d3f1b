//! Event plumbing between read loops and the driver task.
//!
//! Each state machine registers one forwarder as its message handler and
//! consumes events from a single bounded queue. File handles and cursors
//! live only in the driver task; nothing else touches them.

use crate::cancel::CancelToken;
use crate::error::TransferError;
use async_trait::async_trait;
use ferry_proto::Envelope;
use ferry_transport::{Endpoint, MessageHandler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Bound on queued protocol events. Producers block when full, so a fast
/// peer backpressures through the connection rather than piling up chunks.
pub(crate) const EVENT_QUEUE_DEPTH: usize = 10;

/// Delay after notifying the peer of a local interrupt, letting the final
/// message egress before teardown.
pub(crate) const INTERRUPT_GRACE: Duration = Duration::from_secs(1);

pub(crate) type Event = (Arc<Endpoint>, Envelope);
pub(crate) type EventRx = mpsc::Receiver<Event>;

/// Forwards every inbound message into the driver task's event queue.
pub(crate) struct EventForwarder {
    tx: mpsc::Sender<Event>,
}

impl EventForwarder {
    pub(crate) fn channel() -> (Arc<Self>, EventRx) {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl MessageHandler for EventForwarder {
    async fn handle_message(&self, endpoint: Arc<Endpoint>, msg: Envelope) {
        // A closed queue means the driver is gone; drop the event.
        let _ = self.tx.send((endpoint, msg)).await;
    }
}

/// Wait for the next event, cancellation, or loss of the peer.
pub(crate) async fn next_event(
    rx: &mut EventRx,
    cancel: &CancelToken,
) -> Result<Event, TransferError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(TransferError::Interrupted),
        ev = rx.recv() => ev.ok_or(TransferError::PeerClosed),
    }
}

/// Like [`next_event`], but skips events from other connections.
pub(crate) async fn next_from(
    rx: &mut EventRx,
    cancel: &CancelToken,
    endpoint: &Arc<Endpoint>,
) -> Result<Envelope, TransferError> {
    loop {
        let (ep, msg) = next_event(rx, cancel).await?;
        if Arc::ptr_eq(&ep, endpoint) {
            return Ok(msg);
        }
    }
}
