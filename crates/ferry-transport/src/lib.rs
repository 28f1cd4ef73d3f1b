//! # Ferry Transport
//!
//! Transport layer for ferry.
//!
//! This crate provides:
//! - `Endpoint`: one side of a message connection with a uniform send
//!   contract and a diversion queue for exclusive inbound custody
//! - `MessageHandler` dispatch driven by a per-connection read loop
//! - TCP `Server` and `Client` carrying framed `ferry_proto` envelopes
//! - UDP broadcast discovery for relay-free local-network transfers
//!
//! The transport guarantees in-order delivery per connection and surfaces
//! disconnection as errors; it never interprets message contents.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod server;

pub use client::Client;
pub use endpoint::Endpoint;
pub use error::ConnectionError;
pub use handler::{HandlerList, MessageHandler, spawn_read_loop};
pub use server::Server;

/// Default port for direct local-network transfers.
pub const DEFAULT_LOCAL_PORT: u16 = 6880;
