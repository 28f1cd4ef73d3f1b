//! Relay process: the session registry wired onto a transport server.

use crate::registry::{Registry, RegistryConfig};
use ferry_transport::{ConnectionError, Server};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Relay failures.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Transport-level failure
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// A relay: transport server plus session registry.
pub struct Relay {
    server: Server,
    registry: Arc<Registry>,
}

impl Relay {
    /// Bind a relay on `addr` with the given registry configuration.
    ///
    /// # Errors
    ///
    /// Returns `RelayError` if binding fails.
    pub async fn bind(addr: &str, config: RegistryConfig) -> Result<Self, RelayError> {
        let server = Server::bind(addr).await?;
        let registry = Arc::new(Registry::new(config));
        server.add_handler(registry.clone());
        Ok(Self { server, registry })
    }

    /// The bound local address.
    ///
    /// # Errors
    ///
    /// Returns `RelayError` if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.server.local_addr()?)
    }

    /// The relay's registry.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Serve until the task is dropped.
    ///
    /// Starts the registry's liveness sweep, then accepts connections
    /// forever.
    ///
    /// # Errors
    ///
    /// Returns `RelayError` if accepting fails fatally.
    pub async fn run(self) -> Result<(), RelayError> {
        info!(addr = %self.local_addr()?, "relay up");
        let sweep = self.registry.spawn_sweep();
        let result = self.server.run().await;
        sweep.abort();
        result.map_err(RelayError::from)
    }
}
