//! # Ferry Relay
//!
//! Rendezvous relay for ferry.
//!
//! This crate provides:
//! - The session registry: share code to session mapping, create/join
//!   transitions, and the periodic liveness sweep
//! - The pipe: a transparent bidirectional forwarder coupling two paired
//!   connections
//! - `Relay`: the registry wired onto a transport server
//!
//! The relay never interprets session traffic once a pair is piped; its
//! only jobs are brokering and forwarding.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod pipe;
pub mod registry;
pub mod relay;

pub use pipe::Pipe;
pub use registry::{Registry, RegistryConfig};
pub use relay::{Relay, RelayError};

/// Default listen address for a relay process.
pub const DEFAULT_RELAY_HOST: &str = "0.0.0.0";

/// Default listen port for a relay process.
pub const DEFAULT_RELAY_PORT: u16 = 50051;
