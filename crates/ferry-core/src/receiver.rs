//! Receiving side of the transfer protocol.

use crate::cancel::CancelToken;
use crate::error::TransferError;
use crate::events::{EventForwarder, EventRx, INTERRUPT_GRACE, next_from};
use crate::options::ReceiverOptions;
use crate::ui::Ui;
use ferry_files::{decompress_chunk, human_bytes};
use ferry_proto::{Envelope, FileMeta, MessageKind, Payload, ShareCodePayload};
use ferry_transport::discovery::discover;
use ferry_transport::{Client, Endpoint};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// How long the receiver listens for a broadcasting sender in
/// local-network mode.
const DISCOVER_TIME_LIMIT: Duration = Duration::from_secs(30);

/// Drives one receive run.
pub struct Receiver {
    options: ReceiverOptions,
    ui: Arc<dyn Ui>,
    cancel: CancelToken,
}

impl Receiver {
    /// Build a receiver from its options, user-interaction seam and
    /// cancellation token.
    pub fn new(options: ReceiverOptions, ui: Arc<dyn Ui>, cancel: CancelToken) -> Self {
        Self {
            options,
            ui,
            cancel,
        }
    }

    /// Join the session and receive every offered file under the output
    /// path.
    ///
    /// # Errors
    ///
    /// Returns `TransferError` on any rejection, protocol, transport or
    /// filesystem failure; `TransferError::Interrupted` after cancellation.
    /// Declining the transfer at the consent prompt is a successful run.
    pub async fn run(&self) -> Result<(), TransferError> {
        let (endpoint, mut rx) = self.connect().await?;

        match self.drive(&endpoint, &mut rx).await {
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

    async fn connect(&self) -> Result<(Arc<Endpoint>, EventRx), TransferError> {
        let addr = if self.options.local_network {
            self.ui.note("looking for the sender on the local network");
            let found = discover(self.options.share_code.as_bytes(), 1, DISCOVER_TIME_LIMIT).await?;
            let peer = found.first().ok_or(TransferError::NoPeerFound)?;
            info!(address = %peer.address, "sender found");
            format!("{}:{}", peer.address, self.options.local_port)
        } else {
            self.options.relay.clone()
        };

        let client = Client::connect(&addr).await?;
        let (forwarder, rx) = EventForwarder::channel();
        client.add_handler(forwarder);
        let endpoint = client.endpoint();

        if self.options.local_network {
            endpoint
                .send(&Envelope::control(MessageKind::LocalNetworkMode))
                .await?;
        }
        Ok((endpoint, rx))
    }

    async fn drive(&self, endpoint: &Arc<Endpoint>, rx: &mut EventRx) -> Result<(), TransferError> {
        self.join_session(endpoint, rx).await?;

        let stats = self.fetch_stats(endpoint, rx).await?;
        let summary = format!(
            "receive {} files ({}) into {}?",
            stats.files_number,
            human_bytes(stats.files_size.max(0) as u64),
            self.options.out_path.display()
        );
        if !self.options.assume_yes && !self.ui.confirm(&summary).await {
            endpoint
                .send(&Envelope::control(MessageKind::RefuseReceive))
                .await?;
            self.ui.note("transfer declined");
            return Ok(());
        }
        endpoint
            .send(&Envelope::control(MessageKind::AgreeReceive))
            .await?;

        let mut completed: i64 = 0;
        loop {
            if stats.files_number > 0 && completed >= stats.files_number {
                break;
            }
            let msg = next_from(rx, &self.cancel, endpoint).await?;
            match msg.kind {
                MessageKind::FileFinish => break,
                MessageKind::FileInfo => {
                    let Payload::FileInfo(p) = msg.decode_payload()? else {
                        continue;
                    };
                    if self.receive_file(endpoint, rx, &p.file_info).await? {
                        completed += 1;
                    }
                }
                MessageKind::Cancel | MessageKind::Failed | MessageKind::Interrupt => {
                    return Err(TransferError::Cancelled);
                }
                _ => {}
            }
        }

        self.ui.note(&format!("received {completed} files"));
        Ok(())
    }

    async fn join_session(
        &self,
        endpoint: &Arc<Endpoint>,
        rx: &mut EventRx,
    ) -> Result<(), TransferError> {
        endpoint
            .send(
                &ShareCodePayload {
                    share_code: self.options.share_code.clone(),
                }
                .into_envelope(MessageKind::JoinSession),
            )
            .await?;

        loop {
            let msg = next_from(rx, &self.cancel, endpoint).await?;
            match msg.kind {
                MessageKind::JoinSuccess => {
                    info!(code = %self.options.share_code, "session joined");
                    return Ok(());
                }
                MessageKind::ChannelNotFound => return Err(TransferError::SessionNotFound),
                MessageKind::ChannelFull => return Err(TransferError::SessionFull),
                MessageKind::JoinFailed => return Err(TransferError::JoinRejected),
                MessageKind::Cancel | MessageKind::Failed => return Err(TransferError::Cancelled),
                _ => {}
            }
        }
    }

    async fn fetch_stats(
        &self,
        endpoint: &Arc<Endpoint>,
        rx: &mut EventRx,
    ) -> Result<ferry_proto::FileSetStatsPayload, TransferError> {
        endpoint
            .send(&Envelope::control(MessageKind::GetFileSetStats))
            .await?;

        loop {
            let msg = next_from(rx, &self.cancel, endpoint).await?;
            match msg.kind {
                MessageKind::FileSetStats => {
                    let Payload::FileSetStats(stats) = msg.decode_payload()? else {
                        continue;
                    };
                    return Ok(stats);
                }
                MessageKind::Cancel | MessageKind::Failed | MessageKind::Interrupt => {
                    return Err(TransferError::Cancelled);
                }
                _ => {}
            }
        }
    }

    /// Receive one announced file. Returns whether the file completed
    /// (skips do not count).
    async fn receive_file(
        &self,
        endpoint: &Arc<Endpoint>,
        rx: &mut EventRx,
        meta: &FileMeta,
    ) -> Result<bool, TransferError> {
        let dir = self.options.out_path.join(&meta.folder_remote);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| TransferError::file_io(&dir, e))?;
        let dest = dir.join(&meta.name);

        if !meta.symlink.is_empty() {
            // Symlinked entries carry no bytes; recreate the link locally.
            make_symlink(&meta.symlink, &dest);
            endpoint
                .send(&Envelope::control(MessageKind::SkipFile))
                .await?;
            return Ok(false);
        }

        let exists = tokio::fs::try_exists(&dest).await.unwrap_or(false);
        if exists && !self.options.assume_yes {
            let prompt = format!("{} exists, overwrite?", dest.display());
            if !self.ui.confirm(&prompt).await {
                debug!(name = %meta.name, "overwrite declined, skipping");
                endpoint
                    .send(&Envelope::control(MessageKind::SkipFile))
                    .await?;
                return Ok(false);
            }
        }

        let mut file = tokio::fs::File::create(&dest)
            .await
            .map_err(|e| TransferError::file_io(&dest, e))?;
        file.set_len(meta.size.max(0) as u64)
            .await
            .map_err(|e| TransferError::file_io(&dest, e))?;
        self.ui.begin_file(&meta.name, meta.size.max(0) as u64);
        endpoint
            .send(&Envelope::control(MessageKind::ReadyForReceive))
            .await?;

        let mut offset: i64 = 0;
        loop {
            let msg = next_from(rx, &self.cancel, endpoint).await?;
            match msg.kind {
                MessageKind::FileData => {
                    let Payload::FileData(chunk) = msg.decode_payload()? else {
                        continue;
                    };
                    let bytes = decompress_chunk(&chunk.data)?;
                    if let Err(e) = file.write_all(&bytes).await {
                        drop(file);
                        let _ = tokio::fs::remove_file(&dest).await;
                        return Err(TransferError::file_io(&dest, e));
                    }
                    offset += bytes.len() as i64;
                    self.ui.advance(bytes.len() as u64);

                    if chunk.eof {
                        if let Err(e) = file.flush().await {
                            drop(file);
                            let _ = tokio::fs::remove_file(&dest).await;
                            return Err(TransferError::file_io(&dest, e));
                        }
                        break;
                    }
                }
                MessageKind::Cancel | MessageKind::Failed | MessageKind::Interrupt => {
                    return Err(TransferError::Cancelled);
                }
                _ => {}
            }
        }

        drop(file);
        apply_mode(&dest, meta.mode);
        self.ui.finish_file();
        debug!(name = %meta.name, bytes = offset, "file received");
        Ok(true)
    }
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if mode != 0 {
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777));
    }
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: u32) {}

#[cfg(unix)]
fn make_symlink(target: &str, dest: &Path) {
    let _ = std::fs::remove_file(dest);
    let _ = std::os::unix::fs::symlink(target, dest);
}

#[cfg(not(unix))]
fn make_symlink(_target: &str, _dest: &Path) {}
