//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding, decoding, or framing messages.
///
/// A protocol error always terminates the affected session or transfer; it
/// is never silently ignored.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Kind byte not in the closed message-kind set
    #[error("unknown message kind: 0x{0:02X}")]
    UnknownKind(u8),

    /// Frame length exceeds the wire limit
    #[error("frame too large: {size} bytes (limit {limit})")]
    FrameTooLarge {
        /// Declared frame size
        size: usize,
        /// Maximum allowed frame size
        limit: usize,
    },

    /// Declared frame length too short to hold a kind byte
    #[error("frame too short: {0} bytes")]
    FrameTooShort(usize),

    /// Payload failed to decode for its message kind
    #[error("malformed {kind} payload: {reason}")]
    Malformed {
        /// Message kind being decoded
        kind: &'static str,
        /// Decoder failure description
        reason: String,
    },

    /// Payload present or absent where the kind requires otherwise
    #[error("unexpected payload for {0}")]
    UnexpectedPayload(&'static str),

    /// Underlying stream failed mid-frame
    #[error("frame I/O: {0}")]
    Io(#[from] std::io::Error),
}
