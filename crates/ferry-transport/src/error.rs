//! Transport error types.

use thiserror::Error;

/// Errors from the underlying connection.
///
/// Connection errors are never retried by the protocol layer; they
/// terminate the affected session or transfer.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// I/O failure on the underlying stream
    #[error("connection I/O: {0}")]
    Io(#[from] std::io::Error),

    /// The connection is closed
    #[error("connection closed")]
    Closed,

    /// Framing failure while sending
    #[error(transparent)]
    Protocol(#[from] ferry_proto::ProtocolError),

    /// Connecting to a remote address failed
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        /// Remote address
        addr: String,
        /// Underlying error
        source: std::io::Error,
    },
}
