//! Message handler dispatch and the per-connection read loop.

use crate::endpoint::Endpoint;
use async_trait::async_trait;
use ferry_proto::{Envelope, read_frame};
use std::sync::{Arc, RwLock};
use tokio::io::AsyncRead;
use tokio::task::JoinHandle;
use tracing::debug;

/// Something that reacts to inbound messages on a connection.
///
/// Handlers are invoked with the endpoint the message arrived on, so a
/// reply can be sent on the same connection. Message kinds a handler does
/// not care about are a no-op by design.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// React to one inbound message.
    async fn handle_message(&self, endpoint: Arc<Endpoint>, msg: Envelope);
}

/// A shared, ordered list of message handlers.
#[derive(Clone, Default)]
pub struct HandlerList {
    handlers: Arc<RwLock<Vec<Arc<dyn MessageHandler>>>>,
}

impl HandlerList {
    /// An empty handler list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler. Handlers run in registration order.
    pub fn add(&self, handler: Arc<dyn MessageHandler>) {
        self.handlers
            .write()
            .expect("handler list lock poisoned")
            .push(handler);
    }

    /// Snapshot the current handlers for dispatch.
    pub fn snapshot(&self) -> Vec<Arc<dyn MessageHandler>> {
        self.handlers
            .read()
            .expect("handler list lock poisoned")
            .clone()
    }
}

/// Spawn the read loop for one connection.
///
/// For each inbound frame the loop either pushes to the endpoint's
/// diversion queue (when diverted) or dispatches to every registered
/// handler in order. Dispatch is inline on this task: the decision between
/// queue and handlers is made by the single task that also runs the
/// handlers, so a handler toggling diversion is ordered with respect to the
/// next message. The loop ends when the connection closes or a frame fails
/// to decode.
pub fn spawn_read_loop<R>(
    mut reader: R,
    endpoint: Arc<Endpoint>,
    handlers: HandlerList,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let msg = match read_frame(&mut reader).await {
                Ok(msg) => msg,
                Err(e) => {
                    debug!(endpoint = endpoint.id(), error = %e, "read loop ended");
                    break;
                }
            };

            if endpoint.is_diverted() {
                endpoint.push_diverted(msg).await;
            } else {
                for handler in handlers.snapshot() {
                    handler.handle_message(endpoint.clone(), msg.clone()).await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_proto::{MessageKind, write_frame};
    use tokio::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<MessageKind>>,
    }

    #[async_trait]
    impl MessageHandler for Recorder {
        async fn handle_message(&self, _endpoint: Arc<Endpoint>, msg: Envelope) {
            self.seen.lock().await.push(msg.kind);
        }
    }

    #[tokio::test]
    async fn test_dispatch_reaches_handlers_in_order() {
        let (mut remote, local) = tokio::io::duplex(1024);
        let (r, _w) = tokio::io::split(local);

        let endpoint = Arc::new(Endpoint::new(
            "conn",
            Box::new(tokio::io::sink()) as Box<dyn tokio::io::AsyncWrite + Send + Unpin>,
        ));
        let handlers = HandlerList::new();
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        handlers.add(recorder.clone());

        let loop_handle = spawn_read_loop(r, endpoint, handlers);

        write_frame(&mut remote, &Envelope::control(MessageKind::Ping))
            .await
            .unwrap();
        write_frame(&mut remote, &Envelope::control(MessageKind::Cancel))
            .await
            .unwrap();
        drop(remote);
        loop_handle.await.unwrap();

        let seen = recorder.seen.lock().await;
        assert_eq!(&*seen, &[MessageKind::Ping, MessageKind::Cancel]);
    }

    #[tokio::test]
    async fn test_diversion_bypasses_handlers() {
        let (mut remote, local) = tokio::io::duplex(1024);
        let (r, _w) = tokio::io::split(local);

        let endpoint = Arc::new(Endpoint::new(
            "conn",
            Box::new(tokio::io::sink()) as Box<dyn tokio::io::AsyncWrite + Send + Unpin>,
        ));
        endpoint.start_diversion();

        let handlers = HandlerList::new();
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        handlers.add(recorder.clone());

        let _loop_handle = spawn_read_loop(r, endpoint.clone(), handlers);

        write_frame(&mut remote, &Envelope::control(MessageKind::Ping))
            .await
            .unwrap();

        let diverted = endpoint.next_diverted().await.unwrap();
        assert_eq!(diverted.kind, MessageKind::Ping);
        assert!(recorder.seen.lock().await.is_empty());
    }
}
