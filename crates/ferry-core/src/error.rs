//! Transfer error types.

use ferry_files::FileError;
use ferry_proto::ProtocolError;
use ferry_transport::ConnectionError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors terminating a send or receive run.
///
/// Rejections (`Refused`, `SessionNotFound`, `SessionFull`, ...) are
/// user-visible outcomes, not bugs; they still end the run.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Transport send/connect failure
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Malformed or unexpected wire message
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// File collection or chunk compression failure
    #[error(transparent)]
    File(#[from] FileError),

    /// The relay rejected session creation
    #[error("could not create session: share code empty or already in use")]
    CreateRejected,

    /// No session registered under the share code
    #[error("no session found for this share code")]
    SessionNotFound,

    /// The session already has a receiver
    #[error("session already has a receiver")]
    SessionFull,

    /// The relay rejected the join outright
    #[error("could not join session: invalid share code")]
    JoinRejected,

    /// The peer declined the transfer
    #[error("peer declined the transfer")]
    Refused,

    /// The session was torn down by the relay or the peer
    #[error("session cancelled by relay or peer")]
    Cancelled,

    /// The peer's connection went away mid-transfer
    #[error("connection closed by peer")]
    PeerClosed,

    /// No broadcasting peer answered on the local network
    #[error("no peer found on the local network")]
    NoPeerFound,

    /// Local cancellation (Ctrl-C)
    #[error("interrupted")]
    Interrupted,

    /// Filesystem failure on a transfer path
    #[error("{}: {source}", path.display())]
    FileIo {
        /// The file being read or written
        path: PathBuf,
        /// The underlying failure
        source: std::io::Error,
    },
}

impl TransferError {
    pub(crate) fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }
}
