//! Typed payloads and their encoding.
//!
//! Decoding is dispatched purely by message kind: every kind either carries
//! no payload, one of the structured records below, or (for `file-data`) a
//! bincode chunk record. Structured records are JSON, mirroring the
//! self-describing encoding of the metadata path; chunk records are bincode
//! since they carry raw file bytes.

use crate::envelope::Envelope;
use crate::error::ProtocolError;
use crate::kind::MessageKind;
use serde::{Deserialize, Serialize};

/// Share-code announcement, carried by `create-session` and `join-session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareCodePayload {
    /// The human-relayed rendezvous code
    pub share_code: String,
}

/// File-set summary, carried by `file-set-stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSetStatsPayload {
    /// Total bytes across all files
    pub files_size: i64,
    /// Number of files to transfer
    pub files_number: i64,
    /// Number of folders in the set
    pub folder_number: i64,
}

/// Per-file metadata as announced on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    /// File name without any directory component
    pub name: String,
    /// Destination folder relative to the receiver's output root
    pub folder_remote: String,
    /// Source folder on the sender (never used by the receiver)
    pub folder_source: String,
    /// File size in bytes
    pub size: i64,
    /// Modification time, milliseconds since the Unix epoch
    pub mod_time: i64,
    /// Whether file content is pre-compressed (always false; reserved)
    pub is_compressed: bool,
    /// Whether file content is encrypted (always false; reserved)
    pub is_encrypted: bool,
    /// Symlink target, empty for regular files
    pub symlink: String,
    /// Unix mode bits
    pub mode: u32,
    /// Whether this is a temporary artifact (zipped folder) on the sender
    pub temp_file: bool,
}

/// Wrapper for `file-info` messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfoPayload {
    /// The announced file
    pub file_info: FileMeta,
}

/// One chunk of file bytes, carried by `file-data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDataPayload {
    /// Compressed chunk bytes
    pub data: Vec<u8>,
    /// Cumulative bytes sent including this chunk
    pub position: i64,
    /// Set on exactly the final chunk of a file
    pub eof: bool,
}

/// A decoded payload, keyed by the envelope's message kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Share-code announcement
    ShareCode(ShareCodePayload),
    /// File-set summary
    FileSetStats(FileSetStatsPayload),
    /// Per-file metadata
    FileInfo(FileInfoPayload),
    /// File chunk
    FileData(FileDataPayload),
    /// Control-only kind, no payload
    Empty,
}

fn malformed(kind: MessageKind, err: impl std::fmt::Display) -> ProtocolError {
    ProtocolError::Malformed {
        kind: kind.as_str(),
        reason: err.to_string(),
    }
}

impl ShareCodePayload {
    /// Encode into an envelope of the given kind (`create-session` or
    /// `join-session`).
    pub fn into_envelope(self, kind: MessageKind) -> Envelope {
        let bytes = serde_json::to_vec(&self).unwrap_or_default();
        Envelope::with_payload(kind, bytes)
    }
}

impl FileSetStatsPayload {
    /// Encode into a `file-set-stats` envelope.
    pub fn into_envelope(self) -> Envelope {
        let bytes = serde_json::to_vec(&self).unwrap_or_default();
        Envelope::with_payload(MessageKind::FileSetStats, bytes)
    }
}

impl FileInfoPayload {
    /// Encode into a `file-info` envelope.
    pub fn into_envelope(self) -> Envelope {
        let bytes = serde_json::to_vec(&self).unwrap_or_default();
        Envelope::with_payload(MessageKind::FileInfo, bytes)
    }
}

impl FileDataPayload {
    /// Encode into a `file-data` envelope.
    pub fn into_envelope(self) -> Envelope {
        let bytes = bincode::serialize(&self).unwrap_or_default();
        Envelope::with_payload(MessageKind::FileData, bytes)
    }
}

impl Envelope {
    /// Decode this envelope's payload according to its kind.
    ///
    /// Control-only kinds decode to `Payload::Empty` regardless of payload
    /// bytes; structured kinds fail with `ProtocolError::Malformed` when the
    /// payload does not parse.
    pub fn decode_payload(&self) -> Result<Payload, ProtocolError> {
        match self.kind {
            MessageKind::CreateSession | MessageKind::JoinSession => {
                let p: ShareCodePayload = serde_json::from_slice(&self.payload)
                    .map_err(|e| malformed(self.kind, e))?;
                Ok(Payload::ShareCode(p))
            }
            MessageKind::FileSetStats => {
                let p: FileSetStatsPayload = serde_json::from_slice(&self.payload)
                    .map_err(|e| malformed(self.kind, e))?;
                Ok(Payload::FileSetStats(p))
            }
            MessageKind::FileInfo => {
                let p: FileInfoPayload = serde_json::from_slice(&self.payload)
                    .map_err(|e| malformed(self.kind, e))?;
                Ok(Payload::FileInfo(p))
            }
            MessageKind::FileData => {
                let p: FileDataPayload =
                    bincode::deserialize(&self.payload).map_err(|e| malformed(self.kind, e))?;
                Ok(Payload::FileData(p))
            }
            _ => Ok(Payload::Empty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_share_code_dispatch() {
        let env = ShareCodePayload {
            share_code: "ab12-cd34".into(),
        }
        .into_envelope(MessageKind::CreateSession);

        match env.decode_payload().unwrap() {
            Payload::ShareCode(p) => assert_eq!(p.share_code, "ab12-cd34"),
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn test_file_set_stats_dispatch() {
        let env = FileSetStatsPayload {
            files_size: 100,
            files_number: 1,
            folder_number: 0,
        }
        .into_envelope();

        match env.decode_payload().unwrap() {
            Payload::FileSetStats(p) => {
                assert_eq!(p.files_size, 100);
                assert_eq!(p.files_number, 1);
            }
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn test_file_data_dispatch() {
        let env = FileDataPayload {
            data: vec![9; 64],
            position: 64,
            eof: true,
        }
        .into_envelope();

        match env.decode_payload().unwrap() {
            Payload::FileData(p) => {
                assert_eq!(p.position, 64);
                assert!(p.eof);
            }
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn test_control_kinds_decode_empty() {
        for kind in [
            MessageKind::Ping,
            MessageKind::Cancel,
            MessageKind::Interrupt,
            MessageKind::AgreeReceive,
            MessageKind::FileFinish,
        ] {
            let env = Envelope::control(kind);
            assert_eq!(env.decode_payload().unwrap(), Payload::Empty);
        }
    }

    #[test]
    fn test_malformed_structured_payload_is_an_error() {
        let env = Envelope::with_payload(MessageKind::FileInfo, b"not json".to_vec());
        assert!(matches!(
            env.decode_payload(),
            Err(ProtocolError::Malformed { kind: "file-info", .. })
        ));
    }

    proptest! {
        // Decoding never panics whatever bytes arrive in a structured kind.
        #[test]
        fn test_decode_arbitrary_bytes_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let env = Envelope::with_payload(MessageKind::FileData, bytes);
            let _ = env.decode_payload();
        }
    }
}
