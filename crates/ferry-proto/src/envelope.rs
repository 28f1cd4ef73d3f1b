//! The `Envelope` wire unit and its framing.
//!
//! Frame format, all integers big-endian:
//!
//! ```text
//! len:u32 | kind:u8 | payload:[u8; len-1]
//! ```

use crate::error::ProtocolError;
use crate::kind::MessageKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame size accepted on the wire (8 MiB).
///
/// Chunks are far smaller; the cap bounds memory for a misbehaving peer.
pub const MAX_FRAME_SIZE: usize = 8 * 1024 * 1024;

/// One wire message: a kind plus an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Message kind
    pub kind: MessageKind,
    /// Opaque payload bytes; empty for control-only kinds
    pub payload: Vec<u8>,
}

impl Envelope {
    /// A control-only message with no payload.
    pub fn control(kind: MessageKind) -> Self {
        Self {
            kind,
            payload: Vec::new(),
        }
    }

    /// A message carrying pre-encoded payload bytes.
    pub fn with_payload(kind: MessageKind, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }
}

/// Read one framed envelope from `reader`.
///
/// # Errors
///
/// Returns `ProtocolError::Io` when the stream fails or closes mid-frame,
/// `UnknownKind` for a kind byte outside the closed set, and the frame-size
/// errors for malformed lengths.
pub async fn read_frame<R>(reader: &mut R) -> Result<Envelope, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await? as usize;
    if len < 1 {
        return Err(ProtocolError::FrameTooShort(len));
    }
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            limit: MAX_FRAME_SIZE,
        });
    }

    let kind_byte = reader.read_u8().await?;
    let kind = MessageKind::from_u8(kind_byte).ok_or(ProtocolError::UnknownKind(kind_byte))?;

    let mut payload = vec![0u8; len - 1];
    reader.read_exact(&mut payload).await?;

    Ok(Envelope { kind, payload })
}

/// Write one framed envelope to `writer` and flush it.
///
/// # Errors
///
/// Returns `ProtocolError::Io` if the underlying write fails and
/// `FrameTooLarge` if the payload exceeds the wire limit.
pub async fn write_frame<W>(writer: &mut W, msg: &Envelope) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let len = msg.payload.len() + 1;
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            limit: MAX_FRAME_SIZE,
        });
    }

    writer.write_u32(len as u32).await?;
    writer.write_u8(msg.kind as u8).await?;
    writer.write_all(&msg.payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(1024);

        let msg = Envelope::with_payload(MessageKind::FileData, vec![1, 2, 3, 4]);
        write_frame(&mut a, &msg).await.unwrap();

        let read = read_frame(&mut b).await.unwrap();
        assert_eq!(read, msg);
    }

    #[tokio::test]
    async fn test_control_frame_has_empty_payload() {
        let (mut a, mut b) = tokio::io::duplex(64);

        write_frame(&mut a, &Envelope::control(MessageKind::Ping))
            .await
            .unwrap();

        let read = read_frame(&mut b).await.unwrap();
        assert_eq!(read.kind, MessageKind::Ping);
        assert!(read.payload.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_kind_byte_is_an_error() {
        let (mut a, mut b) = tokio::io::duplex(64);

        // len=1, kind byte 0xEE
        tokio::io::AsyncWriteExt::write_all(&mut a, &[0, 0, 0, 1, 0xEE])
            .await
            .unwrap();

        match read_frame(&mut b).await {
            Err(ProtocolError::UnknownKind(0xEE)) => {}
            other => panic!("expected UnknownKind, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);

        let huge = (MAX_FRAME_SIZE as u32) + 1;
        tokio::io::AsyncWriteExt::write_all(&mut a, &huge.to_be_bytes())
            .await
            .unwrap();

        assert!(matches!(
            read_frame(&mut b).await,
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_length_frame_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);

        tokio::io::AsyncWriteExt::write_all(&mut a, &[0, 0, 0, 0])
            .await
            .unwrap();

        assert!(matches!(
            read_frame(&mut b).await,
            Err(ProtocolError::FrameTooShort(0))
        ));
    }

    #[tokio::test]
    async fn test_frames_preserve_order() {
        let (mut a, mut b) = tokio::io::duplex(4096);

        for i in 0..10u8 {
            let msg = Envelope::with_payload(MessageKind::FileData, vec![i]);
            write_frame(&mut a, &msg).await.unwrap();
        }
        for i in 0..10u8 {
            let read = read_frame(&mut b).await.unwrap();
            assert_eq!(read.payload, vec![i]);
        }
    }
}
