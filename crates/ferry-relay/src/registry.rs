//! Session registry: share code to session mapping and liveness sweep.

use crate::pipe::Pipe;
use async_trait::async_trait;
use ferry_proto::{Envelope, MessageKind, Payload};
use ferry_transport::{Endpoint, MessageHandler};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Bound on each liveness ping. An unresponsive peer counts as gone.
const PING_TIMEOUT: Duration = Duration::from_secs(1);

/// Registry tuning knobs.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Interval between liveness sweeps
    pub sweep_interval: Duration,
    /// Hard cap on session age; not renewed by activity
    pub max_session_age: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(3),
            max_session_age: Duration::from_secs(30 * 60),
        }
    }
}

/// One rendezvous session.
struct Session {
    owner: Arc<Endpoint>,
    visitor: Option<Arc<Endpoint>>,
    created_at: Instant,
    full: bool,
    pipe: Option<Arc<Pipe>>,
}

impl Session {
    fn new(owner: Arc<Endpoint>) -> Self {
        Self {
            owner,
            visitor: None,
            created_at: Instant::now(),
            full: false,
            pipe: None,
        }
    }
}

/// Maps share codes to sessions and owns every session's lifecycle.
///
/// All transitions run under one exclusive lock spanning the whole
/// read-check-then-write, so two concurrent joins on the same code cannot
/// both succeed.
pub struct Registry {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
    config: RegistryConfig,
}

impl Registry {
    /// An empty registry.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Whether the session for `code` is paired.
    pub async fn is_paired(&self, code: &str) -> bool {
        self.sessions
            .lock()
            .await
            .get(code)
            .map(|s| s.pipe.is_some())
            .unwrap_or(false)
    }

    async fn handle_create(&self, endpoint: Arc<Endpoint>, share_code: String) {
        if share_code.is_empty() {
            reply(&endpoint, MessageKind::CreateFailed).await;
            return;
        }

        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&share_code) {
            debug!(code = %share_code, "create rejected: code in use");
            reply(&endpoint, MessageKind::CreateFailed).await;
        } else {
            info!(code = %share_code, owner = endpoint.id(), "session created");
            sessions.insert(share_code, Session::new(endpoint.clone()));
            reply(&endpoint, MessageKind::CreateSuccess).await;
        }
    }

    async fn handle_join(&self, endpoint: Arc<Endpoint>, share_code: String) {
        if share_code.is_empty() {
            reply(&endpoint, MessageKind::JoinFailed).await;
            return;
        }

        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&share_code) {
            None => {
                debug!(code = %share_code, "join rejected: no such session");
                reply(&endpoint, MessageKind::ChannelNotFound).await;
            }
            Some(session) if session.full => {
                debug!(code = %share_code, "join rejected: session full");
                reply(&endpoint, MessageKind::ChannelFull).await;
            }
            Some(session) => {
                info!(code = %share_code, visitor = endpoint.id(), "session paired");
                session.visitor = Some(endpoint.clone());
                session.full = true;

                let pipe = Arc::new(Pipe::new(session.owner.clone(), endpoint.clone()));
                pipe.start().await;
                session.pipe = Some(pipe);

                reply(&endpoint, MessageKind::JoinSuccess).await;
            }
        }
    }

    /// Spawn the periodic liveness sweep.
    ///
    /// Every tick, each session's owner (and visitor when paired) is
    /// pinged; a failed ping tears the session down. Independently, any
    /// session older than the max age is torn down even when both peers
    /// still answer.
    pub fn spawn_sweep(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = self.clone();
        let config = registry.config.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.sweep_interval);
            loop {
                ticker.tick().await;
                registry.sweep_once(&config).await;
            }
        })
    }

    async fn sweep_once(&self, config: &RegistryConfig) {
        // Snapshot under the lock, ping without it. A peer that stopped
        // reading may block its ping until the timeout; that must never
        // hold up create/join traffic on unrelated codes.
        let snapshot: Vec<(String, Arc<Endpoint>, Option<Arc<Endpoint>>, bool)> = {
            let sessions = self.sessions.lock().await;
            sessions
                .iter()
                .map(|(code, s)| {
                    (
                        code.clone(),
                        s.owner.clone(),
                        s.visitor.clone(),
                        s.created_at.elapsed() > config.max_session_age,
                    )
                })
                .collect()
        };

        let ping = Envelope::control(MessageKind::Ping);
        let mut doomed: Vec<(String, Arc<Endpoint>)> = Vec::new();
        for (code, owner, visitor, expired) in snapshot {
            let mut dead = !alive(&owner, &ping).await;
            if !dead {
                if let Some(visitor) = &visitor {
                    dead = !alive(visitor, &ping).await;
                }
            }

            if dead || expired {
                if dead {
                    debug!(code = %code, "session peer unreachable, tearing down");
                } else {
                    info!(code = %code, "session exceeded max age, tearing down");
                }
                doomed.push((code, owner));
            }
        }

        let mut pipes = Vec::new();
        {
            let mut sessions = self.sessions.lock().await;
            for (code, owner) in doomed {
                // The code may have been freed and reclaimed by a new
                // owner while the lock was released; leave that one be.
                let same_session = sessions
                    .get(&code)
                    .map(|s| Arc::ptr_eq(&s.owner, &owner))
                    .unwrap_or(false);
                if same_session {
                    if let Some(session) = sessions.remove(&code) {
                        if let Some(pipe) = session.pipe {
                            pipes.push(pipe);
                        }
                    }
                }
            }
        }
        for pipe in pipes {
            pipe.stop().await;
        }
    }
}

/// Send one ping within [`PING_TIMEOUT`].
async fn alive(endpoint: &Arc<Endpoint>, ping: &Envelope) -> bool {
    matches!(
        tokio::time::timeout(PING_TIMEOUT, endpoint.send(ping)).await,
        Ok(Ok(()))
    )
}

async fn reply(endpoint: &Arc<Endpoint>, kind: MessageKind) {
    if let Err(e) = endpoint.send(&Envelope::control(kind)).await {
        warn!(endpoint = endpoint.id(), error = %e, "reply failed");
    }
}

#[async_trait]
impl MessageHandler for Registry {
    async fn handle_message(&self, endpoint: Arc<Endpoint>, msg: Envelope) {
        match msg.kind {
            MessageKind::CreateSession => match msg.decode_payload() {
                Ok(Payload::ShareCode(p)) => self.handle_create(endpoint, p.share_code).await,
                other => {
                    warn!(endpoint = endpoint.id(), ?other, "bad create-session payload");
                    reply(&endpoint, MessageKind::CreateFailed).await;
                }
            },
            MessageKind::JoinSession => match msg.decode_payload() {
                Ok(Payload::ShareCode(p)) => self.handle_join(endpoint, p.share_code).await,
                other => {
                    warn!(endpoint = endpoint.id(), ?other, "bad join-session payload");
                    reply(&endpoint, MessageKind::JoinFailed).await;
                }
            },
            // Session traffic for paired peers never reaches the registry;
            // anything else is not relay business.
            _ => {}
        }
    }
}
