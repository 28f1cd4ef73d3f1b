//! UDP broadcast discovery for local-network transfers.
//!
//! The sender broadcasts its share code on the discovery port; the receiver
//! listens for a matching payload and learns the sender's address. This only
//! exchanges the share code and the peer's address; the transfer itself runs
//! over the normal message connection.

use crate::error::ConnectionError;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::debug;

/// Fixed UDP port used for broadcast discovery.
pub const DISCOVERY_PORT: u16 = 6891;

/// A peer found on the local network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    /// The peer's address
    pub address: IpAddr,
}

/// Broadcast `payload` on the discovery port every `interval` until the
/// returned task is aborted or dropped with the runtime.
pub fn spawn_broadcast(payload: Vec<u8>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let socket = match UdpSocket::bind("0.0.0.0:0").await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, "broadcast socket bind failed");
                return;
            }
        };
        if let Err(e) = socket.set_broadcast(true) {
            debug!(error = %e, "enabling broadcast failed");
            return;
        }

        loop {
            let _ = socket
                .send_to(&payload, (Ipv4Addr::BROADCAST, DISCOVERY_PORT))
                .await;
            sleep(interval).await;
        }
    })
}

/// Listen on the discovery port for peers broadcasting `payload`.
///
/// Collects up to `limit` distinct peer addresses whose broadcast payload
/// matches, returning early when the limit is reached or when `time_limit`
/// elapses.
///
/// # Errors
///
/// Returns `ConnectionError::Io` if the discovery port cannot be bound.
pub async fn discover(
    payload: &[u8],
    limit: usize,
    time_limit: Duration,
) -> Result<Vec<Found>, ConnectionError> {
    let socket = UdpSocket::bind(("0.0.0.0", DISCOVERY_PORT)).await?;
    let deadline = Instant::now() + time_limit;
    let mut found: Vec<Found> = Vec::new();
    let mut buf = vec![0u8; 1024];

    while found.len() < limit {
        let recv = match timeout_at(deadline, socket.recv_from(&mut buf)).await {
            Ok(recv) => recv,
            Err(_) => break,
        };
        let (len, from) = match recv {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "discovery receive failed");
                continue;
            }
        };
        if &buf[..len] != payload {
            continue;
        }
        let address = from.ip();
        if found.iter().all(|f| f.address != address) {
            debug!(%address, "peer discovered");
            found.push(Found { address });
        }
    }

    Ok(found)
}
