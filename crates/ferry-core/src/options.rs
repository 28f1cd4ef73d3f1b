//! Sender and receiver run options.

use ferry_transport::DEFAULT_LOCAL_PORT;
use std::path::PathBuf;

/// Default address of the rendezvous relay.
pub const DEFAULT_RELAY_ADDR: &str = "127.0.0.1:50051";

/// Options for a send run.
#[derive(Debug, Clone)]
pub struct SenderOptions {
    /// The rendezvous share code
    pub share_code: String,
    /// Relay address, ignored in local-network mode
    pub relay: String,
    /// Archive folders into a temporary zip instead of walking them
    pub zip: bool,
    /// Skip the relay and serve the receiver directly on the LAN
    pub local_network: bool,
    /// Listen port for local-network mode
    pub local_port: u16,
}

impl Default for SenderOptions {
    fn default() -> Self {
        Self {
            share_code: String::new(),
            relay: DEFAULT_RELAY_ADDR.to_string(),
            zip: false,
            local_network: false,
            local_port: DEFAULT_LOCAL_PORT,
        }
    }
}

/// Options for a receive run.
#[derive(Debug, Clone)]
pub struct ReceiverOptions {
    /// The rendezvous share code
    pub share_code: String,
    /// Relay address, ignored in local-network mode
    pub relay: String,
    /// Directory files are written under
    pub out_path: PathBuf,
    /// Find the sender by broadcast instead of going through the relay
    pub local_network: bool,
    /// The sender's listen port in local-network mode
    pub local_port: u16,
    /// Accept the transfer and all overwrites without prompting
    pub assume_yes: bool,
}

impl Default for ReceiverOptions {
    fn default() -> Self {
        Self {
            share_code: String::new(),
            relay: DEFAULT_RELAY_ADDR.to_string(),
            out_path: PathBuf::from("."),
            local_network: false,
            local_port: DEFAULT_LOCAL_PORT,
            assume_yes: false,
        }
    }
}
