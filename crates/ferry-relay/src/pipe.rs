//! The message pipe between two paired connections.

use ferry_proto::{Envelope, MessageKind};
use ferry_transport::Endpoint;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Bound on each best-effort cancel send and on joining the relay task
/// during stop. A peer that stopped reading must not hang teardown.
const STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Couples two endpoints into one transparent bidirectional relay.
///
/// Once started, every message arriving on either side is forwarded
/// verbatim to the other, in arrival order per direction; the relay never
/// interprets piped traffic. The pipe claims exclusive custody of both
/// endpoints' inbound messages through diversion while it runs.
pub struct Pipe {
    first: Arc<Endpoint>,
    second: Arc<Endpoint>,
    stopped: Arc<AtomicBool>,
    quit_tx: watch::Sender<bool>,
    quit_rx: watch::Receiver<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Pipe {
    /// Build a pipe between two endpoints. Call [`Pipe::start`] to begin
    /// forwarding.
    pub fn new(first: Arc<Endpoint>, second: Arc<Endpoint>) -> Self {
        let (quit_tx, quit_rx) = watch::channel(false);
        Self {
            first,
            second,
            stopped: Arc::new(AtomicBool::new(false)),
            quit_tx,
            quit_rx,
            task: Mutex::new(None),
        }
    }

    /// Enable diversion on both endpoints and launch the relay task.
    pub async fn start(&self) {
        self.first.start_diversion();
        self.second.start_diversion();

        let first = self.first.clone();
        let second = self.second.clone();
        let stopped = self.stopped.clone();
        let mut quit_rx = self.quit_rx.clone();

        let handle = tokio::spawn(async move {
            loop {
                if stopped.load(Ordering::SeqCst) {
                    break;
                }
                tokio::select! {
                    _ = quit_rx.changed() => break,
                    msg = first.next_diverted() => {
                        if !relay_one(msg, &first, &second, &stopped).await {
                            break;
                        }
                    }
                    msg = second.next_diverted() => {
                        if !relay_one(msg, &second, &first, &stopped).await {
                            break;
                        }
                    }
                }
            }
        });

        *self.task.lock().await = Some(handle);
    }

    /// Stop forwarding.
    ///
    /// Idempotent: the first call notifies both endpoints with a `cancel`
    /// control message (best effort, bounded), disables diversion on both,
    /// and terminates the relay task; later calls do nothing. After `stop`
    /// returns no further message is forwarded by this pipe.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        teardown(&self.first, &self.second).await;
        let _ = self.quit_tx.send(true);
        let task = self.task.lock().await.take();
        if let Some(mut handle) = task {
            if tokio::time::timeout(STOP_TIMEOUT, &mut handle).await.is_err() {
                // The task is wedged inside a send to a stalled peer.
                handle.abort();
            }
        }
        debug!(
            first = self.first.id(),
            second = self.second.id(),
            "pipe stopped"
        );
    }

    /// Whether the pipe has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Forward one diverted message to the opposite endpoint.
///
/// Returns false when the relay task should end. A forward failure
/// notifies the source side and shuts the pipe down from within the task;
/// no join is needed since the task is ending anyway.
async fn relay_one(
    msg: Option<Envelope>,
    source: &Arc<Endpoint>,
    dest: &Arc<Endpoint>,
    stopped: &Arc<AtomicBool>,
) -> bool {
    let Some(msg) = msg else {
        return false;
    };
    if stopped.load(Ordering::SeqCst) {
        return false;
    }

    if let Err(e) = dest.send(&msg).await {
        warn!(
            source = source.id(),
            dest = dest.id(),
            error = %e,
            "forward failed, stopping pipe"
        );
        if !stopped.swap(true, Ordering::SeqCst) {
            let _ = source.send(&Envelope::control(MessageKind::Failed)).await;
            teardown(source, dest).await;
        }
        return false;
    }
    true
}

async fn teardown(a: &Arc<Endpoint>, b: &Arc<Endpoint>) {
    let cancel = Envelope::control(MessageKind::Cancel);
    let _ = tokio::time::timeout(STOP_TIMEOUT, a.send(&cancel)).await;
    let _ = tokio::time::timeout(STOP_TIMEOUT, b.send(&cancel)).await;
    a.stop_diversion();
    b.stop_diversion();
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_proto::{read_frame, write_frame};
    use ferry_transport::{HandlerList, spawn_read_loop};
    use tokio::io::DuplexStream;

    fn endpoint_pair(name: &str) -> (Arc<Endpoint>, DuplexStream) {
        let (local, remote) = tokio::io::duplex(16 * 1024);
        let (reader, writer) = tokio::io::split(local);
        let endpoint = Arc::new(Endpoint::new(name, Box::new(writer)));
        spawn_read_loop(reader, endpoint.clone(), HandlerList::new());
        (endpoint, remote)
    }

    #[tokio::test]
    async fn test_pipe_forwards_in_order() {
        let (a, mut remote_a) = endpoint_pair("a");
        let (b, mut remote_b) = endpoint_pair("b");

        let pipe = Pipe::new(a, b);
        pipe.start().await;

        for i in 0..5u8 {
            write_frame(
                &mut remote_a,
                &Envelope::with_payload(MessageKind::FileData, vec![i]),
            )
            .await
            .unwrap();
        }
        for i in 0..5u8 {
            let msg = read_frame(&mut remote_b).await.unwrap();
            assert_eq!(msg.kind, MessageKind::FileData);
            assert_eq!(msg.payload, vec![i]);
        }

        pipe.stop().await;
    }

    #[tokio::test]
    async fn test_pipe_forwards_both_directions() {
        let (a, mut remote_a) = endpoint_pair("a");
        let (b, mut remote_b) = endpoint_pair("b");

        let pipe = Pipe::new(a, b);
        pipe.start().await;

        write_frame(&mut remote_a, &Envelope::control(MessageKind::FileFinish))
            .await
            .unwrap();
        write_frame(&mut remote_b, &Envelope::control(MessageKind::AgreeReceive))
            .await
            .unwrap();

        assert_eq!(
            read_frame(&mut remote_b).await.unwrap().kind,
            MessageKind::FileFinish
        );
        assert_eq!(
            read_frame(&mut remote_a).await.unwrap().kind,
            MessageKind::AgreeReceive
        );

        pipe.stop().await;
    }

    #[tokio::test]
    async fn test_stop_returns_despite_stalled_peer() {
        let (local, _remote_a) = tokio::io::duplex(64);
        let (reader, writer) = tokio::io::split(local);
        let a = Arc::new(Endpoint::new("a", Box::new(writer)));
        spawn_read_loop(reader, a.clone(), HandlerList::new());
        let (b, mut remote_b) = endpoint_pair("b");

        let pipe = Pipe::new(a.clone(), b);
        pipe.start().await;

        // Jam a's write buffer; its remote never reads.
        let jam = a.clone();
        tokio::spawn(async move {
            let _ = jam
                .send(&Envelope::with_payload(
                    MessageKind::FileData,
                    vec![0u8; 4096],
                ))
                .await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let stopped = tokio::time::timeout(Duration::from_secs(5), pipe.stop()).await;
        assert!(stopped.is_ok(), "stop hung on a peer that stopped reading");
        assert!(pipe.is_stopped());

        // The healthy side still gets its cancel notification.
        assert_eq!(
            read_frame(&mut remote_b).await.unwrap().kind,
            MessageKind::Cancel
        );
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_terminal() {
        let (a, mut remote_a) = endpoint_pair("a");
        let (b, mut remote_b) = endpoint_pair("b");

        let pipe = Pipe::new(a.clone(), b.clone());
        pipe.start().await;

        pipe.stop().await;
        pipe.stop().await;
        assert!(pipe.is_stopped());
        assert!(!a.is_diverted());
        assert!(!b.is_diverted());

        // Both sides got the cancel notification.
        assert_eq!(
            read_frame(&mut remote_a).await.unwrap().kind,
            MessageKind::Cancel
        );
        assert_eq!(
            read_frame(&mut remote_b).await.unwrap().kind,
            MessageKind::Cancel
        );

        // Nothing is forwarded after stop.
        write_frame(&mut remote_a, &Envelope::control(MessageKind::Ping))
            .await
            .unwrap();
        let forwarded = tokio::time::timeout(
            Duration::from_millis(100),
            read_frame(&mut remote_b),
        )
        .await;
        assert!(forwarded.is_err(), "message forwarded after stop");
    }
}
