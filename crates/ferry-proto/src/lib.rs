//! # Ferry Protocol
//!
//! Wire protocol for ferry file transfer.
//!
//! This crate provides:
//! - The closed set of message kinds exchanged between peers and the relay
//! - The `Envelope` wire unit and its length-prefixed framing
//! - Typed payload encoding/decoding dispatched by message kind
//!
//! Messages are the only unit of communication; no other shared state
//! crosses the wire. Structured payloads (share code, file-set stats, file
//! metadata) are JSON; the file-data chunk payload is bincode.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod envelope;
pub mod error;
pub mod kind;
pub mod payload;

pub use envelope::{Envelope, MAX_FRAME_SIZE, read_frame, write_frame};
pub use error::ProtocolError;
pub use kind::MessageKind;
pub use payload::{
    FileDataPayload, FileInfoPayload, FileMeta, FileSetStatsPayload, Payload, ShareCodePayload,
};
