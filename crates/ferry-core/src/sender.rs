//! Sending side of the transfer protocol.
//!
//! States: idle, awaiting pairing, negotiating, per-file, done. The whole
//! machine runs on one driver task; inbound messages arrive through the
//! event queue.

use crate::cancel::CancelToken;
use crate::error::TransferError;
use crate::events::{EventForwarder, EventRx, INTERRUPT_GRACE, next_event, next_from};
use crate::options::{DEFAULT_RELAY_ADDR, SenderOptions};
use crate::ui::Ui;
use ferry_files::{CHUNK_SIZE, FileSet, compress_chunk, human_bytes};
use ferry_proto::{
    Envelope, FileDataPayload, FileInfoPayload, FileMeta, MessageKind, Payload, ShareCodePayload,
};
use ferry_transport::discovery::spawn_broadcast;
use ferry_transport::{Client, Endpoint, Server};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

/// Drives one send run.
pub struct Sender {
    options: SenderOptions,
    ui: Arc<dyn Ui>,
    cancel: CancelToken,
}

impl Sender {
    /// Build a sender from its options, user-interaction seam and
    /// cancellation token.
    pub fn new(options: SenderOptions, ui: Arc<dyn Ui>, cancel: CancelToken) -> Self {
        Self {
            options,
            ui,
            cancel,
        }
    }

    /// Send the files under `paths` to the paired receiver.
    ///
    /// Collects the file set up front, then connects (relay or direct),
    /// pairs, negotiates consent and streams each file. Temporary zip
    /// artifacts are removed on every exit path.
    ///
    /// # Errors
    ///
    /// Returns `TransferError` on any rejection, protocol, transport or
    /// filesystem failure; `TransferError::Interrupted` after cancellation.
    pub async fn run(&self, paths: &[PathBuf]) -> Result<(), TransferError> {
        let mut set = FileSet::collect(paths, self.options.zip)?;
        set.resolve_symlinks();
        let stats = set.stats();
        self.ui.note(&format!(
            "sending {} files ({})",
            stats.files_number,
            human_bytes(stats.files_size.max(0) as u64)
        ));

        let result = self.run_transfer(&set).await;
        set.cleanup_temp_files();
        result
    }

    async fn run_transfer(&self, set: &FileSet) -> Result<(), TransferError> {
        let (endpoint, mut rx) = if self.options.local_network {
            self.serve_local().await?
        } else {
            self.connect_relay().await?
        };

        match self.drive(&endpoint, &mut rx, set).await {
            Err(TransferError::Interrupted) => {
                let _ = endpoint
                    .send(&Envelope::control(MessageKind::Interrupt))
                    .await;
                tokio::time::sleep(INTERRUPT_GRACE).await;
                Err(TransferError::Interrupted)
            }
            other => other,
        }
    }

    async fn connect_relay(&self) -> Result<(Arc<Endpoint>, EventRx), TransferError> {
        let client = Client::connect(&self.options.relay).await?;
        let (forwarder, rx) = EventForwarder::channel();
        client.add_handler(forwarder);
        Ok((client.endpoint(), rx))
    }

    /// Listen on the local port, broadcast the share code, and wait for the
    /// receiver to join directly.
    async fn serve_local(&self) -> Result<(Arc<Endpoint>, EventRx), TransferError> {
        let server = Server::bind(&format!("0.0.0.0:{}", self.options.local_port)).await?;
        let (forwarder, mut rx) = EventForwarder::channel();
        server.add_handler(forwarder);
        tokio::spawn(server.run());

        let broadcast = spawn_broadcast(
            self.options.share_code.clone().into_bytes(),
            Duration::from_secs(1),
        );
        self.print_hint();
        self.ui.note("waiting for the receiver on the local network");

        loop {
            let (ep, msg) = match next_event(&mut rx, &self.cancel).await {
                Ok(ev) => ev,
                Err(e) => {
                    broadcast.abort();
                    return Err(e);
                }
            };
            match msg.kind {
                MessageKind::JoinSession => match msg.decode_payload() {
                    Ok(Payload::ShareCode(p)) if p.share_code == self.options.share_code => {
                        broadcast.abort();
                        ep.send(&Envelope::control(MessageKind::JoinSuccess)).await?;
                        info!(peer = ep.id(), "receiver connected directly");
                        return Ok((ep, rx));
                    }
                    _ => {
                        let _ = ep
                            .send(&Envelope::control(MessageKind::ChannelNotFound))
                            .await;
                    }
                },
                // The receiver announces direct mode before joining.
                MessageKind::LocalNetworkMode => {}
                _ => {}
            }
        }
    }

    async fn drive(
        &self,
        endpoint: &Arc<Endpoint>,
        rx: &mut EventRx,
        set: &FileSet,
    ) -> Result<(), TransferError> {
        if !self.options.local_network {
            self.create_session(endpoint, rx).await?;
            self.print_hint();
        }
        self.negotiate(endpoint, rx, set).await?;
        self.send_files(endpoint, rx, set).await
    }

    async fn create_session(
        &self,
        endpoint: &Arc<Endpoint>,
        rx: &mut EventRx,
    ) -> Result<(), TransferError> {
        endpoint
            .send(
                &ShareCodePayload {
                    share_code: self.options.share_code.clone(),
                }
                .into_envelope(MessageKind::CreateSession),
            )
            .await?;

        loop {
            let msg = next_from(rx, &self.cancel, endpoint).await?;
            match msg.kind {
                MessageKind::CreateSuccess => {
                    info!(code = %self.options.share_code, "session created");
                    return Ok(());
                }
                MessageKind::CreateFailed => return Err(TransferError::CreateRejected),
                MessageKind::Cancel | MessageKind::Failed => return Err(TransferError::Cancelled),
                _ => {}
            }
        }
    }

    fn print_hint(&self) {
        self.ui
            .note(&format!("share code: {}", self.options.share_code));
        let mut hint = format!("ferry receive {}", self.options.share_code);
        if self.options.local_network {
            hint.push_str(" --local");
        } else if self.options.relay != DEFAULT_RELAY_ADDR {
            hint.push_str(&format!(" --relay {}", self.options.relay));
        }
        self.ui.note("on the other computer run:");
        self.ui.note(&format!("  {hint}"));
    }

    async fn negotiate(
        &self,
        endpoint: &Arc<Endpoint>,
        rx: &mut EventRx,
        set: &FileSet,
    ) -> Result<(), TransferError> {
        loop {
            let msg = next_from(rx, &self.cancel, endpoint).await?;
            match msg.kind {
                MessageKind::GetFileSetStats => {
                    endpoint.send(&set.stats().into_envelope()).await?;
                }
                MessageKind::AgreeReceive => return Ok(()),
                MessageKind::RefuseReceive => return Err(TransferError::Refused),
                MessageKind::Cancel | MessageKind::Failed | MessageKind::Interrupt => {
                    return Err(TransferError::Cancelled);
                }
                _ => {}
            }
        }
    }

    async fn send_files(
        &self,
        endpoint: &Arc<Endpoint>,
        rx: &mut EventRx,
        set: &FileSet,
    ) -> Result<(), TransferError> {
        let last = set.files.len().saturating_sub(1);
        let mut finish_sent = false;

        for (i, meta) in set.files.iter().enumerate() {
            endpoint
                .send(
                    &FileInfoPayload {
                        file_info: meta.clone(),
                    }
                    .into_envelope(),
                )
                .await?;

            loop {
                let msg = next_from(rx, &self.cancel, endpoint).await?;
                match msg.kind {
                    MessageKind::SkipFile => {
                        debug!(name = %meta.name, "peer skipped file");
                        if i == last {
                            endpoint
                                .send(&Envelope::control(MessageKind::FileFinish))
                                .await?;
                            finish_sent = true;
                        }
                        break;
                    }
                    MessageKind::ReadyForReceive => {
                        self.stream_file(endpoint, rx, meta).await?;
                        break;
                    }
                    MessageKind::Cancel | MessageKind::Failed | MessageKind::Interrupt => {
                        return Err(TransferError::Cancelled);
                    }
                    _ => {}
                }
            }
        }

        if !finish_sent {
            endpoint
                .send(&Envelope::control(MessageKind::FileFinish))
                .await?;
        }
        self.ui.note("transfer complete");
        Ok(())
    }

    /// Stream one file as compressed chunks.
    ///
    /// The end-of-file flag is set on exactly the chunk whose read came up
    /// short; an empty file still sends one empty eof chunk.
    async fn stream_file(
        &self,
        endpoint: &Arc<Endpoint>,
        rx: &mut EventRx,
        meta: &FileMeta,
    ) -> Result<(), TransferError> {
        let path = FileSet::source_path(meta);
        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| TransferError::file_io(&path, e))?;
        self.ui.begin_file(&meta.name, meta.size.max(0) as u64);

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut position: i64 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(TransferError::Interrupted);
            }
            while let Ok((_, msg)) = rx.try_recv() {
                match msg.kind {
                    MessageKind::Cancel | MessageKind::Failed | MessageKind::Interrupt => {
                        return Err(TransferError::Cancelled);
                    }
                    _ => {}
                }
            }

            let n = read_full(&mut file, &mut buf)
                .await
                .map_err(|e| TransferError::file_io(&path, e))?;
            let eof = n < CHUNK_SIZE;
            position += n as i64;
            let data = compress_chunk(&buf[..n])?;
            endpoint
                .send(&FileDataPayload { data, position, eof }.into_envelope())
                .await?;
            self.ui.advance(n as u64);

            if eof {
                break;
            }
        }

        self.ui.finish_file();
        debug!(name = %meta.name, bytes = position, "file sent");
        Ok(())
    }
}

/// Read until `buf` is full or end of file.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::HeadlessUi;
    use ferry_files::decompress_chunk;
    use ferry_proto::read_frame;
    use std::io::Cursor;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_read_full_short_read_signals_eof() {
        let mut cursor = Cursor::new(vec![7u8; 5]);
        let mut buf = [0u8; 8];
        let n = read_full(&mut cursor, &mut buf).await.unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf[..5], &[7; 5]);
    }

    #[tokio::test]
    async fn test_read_full_fills_whole_buffer() {
        let mut cursor = Cursor::new(vec![1u8; 16]);
        let mut buf = [0u8; 8];
        assert_eq!(read_full(&mut cursor, &mut buf).await.unwrap(), 8);
        assert_eq!(read_full(&mut cursor, &mut buf).await.unwrap(), 8);
        assert_eq!(read_full(&mut cursor, &mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_zero_byte_file_sends_single_eof_chunk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("empty.bin"), b"").unwrap();
        let meta = FileMeta {
            name: "empty.bin".into(),
            folder_source: dir.path().to_str().unwrap().into(),
            ..FileMeta::default()
        };

        let (local, mut remote) = tokio::io::duplex(64 * 1024);
        let (_r, w) = tokio::io::split(local);
        let endpoint = Arc::new(Endpoint::new("peer", Box::new(w)));
        let (_tx, mut rx) = mpsc::channel(4);

        let sender = Sender::new(
            SenderOptions::default(),
            Arc::new(HeadlessUi { accept: true }),
            CancelToken::new(),
        );
        sender.stream_file(&endpoint, &mut rx, &meta).await.unwrap();

        let frame = read_frame(&mut remote).await.unwrap();
        assert_eq!(frame.kind, MessageKind::FileData);
        let Payload::FileData(chunk) = frame.decode_payload().unwrap() else {
            panic!("not a chunk");
        };
        assert!(chunk.eof);
        assert_eq!(chunk.position, 0);
        assert!(decompress_chunk(&chunk.data).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stream_file_final_position_matches_size() {
        let dir = tempfile::tempdir().unwrap();
        let content = vec![9u8; CHUNK_SIZE + 100];
        std::fs::write(dir.path().join("big.bin"), &content).unwrap();
        let meta = FileMeta {
            name: "big.bin".into(),
            folder_source: dir.path().to_str().unwrap().into(),
            size: content.len() as i64,
            ..FileMeta::default()
        };

        let (local, mut remote) = tokio::io::duplex(256 * 1024);
        let (_r, w) = tokio::io::split(local);
        let endpoint = Arc::new(Endpoint::new("peer", Box::new(w)));
        let (_tx, mut rx) = mpsc::channel(4);

        let sender = Sender::new(
            SenderOptions::default(),
            Arc::new(HeadlessUi { accept: true }),
            CancelToken::new(),
        );
        sender.stream_file(&endpoint, &mut rx, &meta).await.unwrap();

        let mut rebuilt = Vec::new();
        loop {
            let frame = read_frame(&mut remote).await.unwrap();
            let Payload::FileData(chunk) = frame.decode_payload().unwrap() else {
                panic!("not a chunk");
            };
            rebuilt.extend(decompress_chunk(&chunk.data).unwrap());
            assert_eq!(chunk.position, rebuilt.len() as i64);
            if chunk.eof {
                break;
            }
        }
        assert_eq!(rebuilt, content);
    }
}
