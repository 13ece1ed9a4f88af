//! Transfer service
//!
//! Drives the three calls against storage. Each call first takes a ticket
//! from the limiter of its class, then runs a strictly sequential streaming
//! loop. Tickets and file handles are owned by the call's scope and are
//! released on every exit path by drop.

use log::{info, warn};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::TransferError;
use crate::middleware::{AdmissionLimits, AdmissionTicket};
use crate::storage::{Storage, WriteHandle, validate_filename};
use crate::transfer::results::{DownloadSummary, FileInfo, UploadReply};
use crate::transfer::stream::{ChunkSink, ChunkSource};

pub const UPLOAD_SUCCESS_MESSAGE: &str = "file uploaded successfully";

/// Run `fut` unless `cancel` fires first.
async fn or_cancelled<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, TransferError>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransferError::Cancelled),
        value = fut => Ok(value),
    }
}

/// Upload state: the name is bound by the first chunk and never changes.
enum UploadState {
    AwaitingFirstChunk,
    Writing { filename: String, handle: WriteHandle },
}

pub struct TransferService {
    storage: Storage,
    limits: Arc<AdmissionLimits>,
    buffer_size: usize,
}

impl TransferService {
    pub fn new(storage: Storage, limits: Arc<AdmissionLimits>, buffer_size: usize) -> Self {
        Self {
            storage,
            limits,
            buffer_size: buffer_size.max(1),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            Storage::new(config.storage_root_path()),
            Arc::new(AdmissionLimits::from_config(config)),
            config.download_buffer_size,
        )
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn limits(&self) -> &AdmissionLimits {
        &self.limits
    }

    /// Receive a file chunk by chunk.
    ///
    /// The first chunk names the file, which is validated and created before
    /// anything is written. A failure after creation leaves the partially
    /// written file in place.
    pub async fn upload<S: ChunkSource>(
        &self,
        source: &mut S,
        cancel: &CancellationToken,
    ) -> Result<UploadReply, TransferError> {
        let ticket = self.limits.upload.acquire(cancel).await?;
        self.upload_admitted(ticket, source, cancel).await
    }

    /// Run an upload under a ticket the caller already holds.
    ///
    /// Lets a transport take the ticket itself while it watches the
    /// connection. The ticket is released when this returns.
    pub async fn upload_admitted<S: ChunkSource>(
        &self,
        _ticket: AdmissionTicket,
        source: &mut S,
        cancel: &CancellationToken,
    ) -> Result<UploadReply, TransferError> {
        let mut state = UploadState::AwaitingFirstChunk;

        loop {
            let message = or_cancelled(cancel, source.recv())
                .await?
                .map_err(TransferError::Transport)?;

            let Some(message) = message else {
                break;
            };

            if let UploadState::AwaitingFirstChunk = state {
                let name = validate_filename(&message.filename)?;
                let handle = self.storage.create(&name).await?;
                info!("Receiving upload '{}'", name);
                state = UploadState::Writing {
                    filename: name.to_string(),
                    handle,
                };
            }

            if let UploadState::Writing { handle, .. } = &mut state {
                or_cancelled(cancel, handle.write(&message.chunk)).await??;
            }
        }

        match state {
            UploadState::AwaitingFirstChunk => {
                warn!("Upload stream ended before any chunk arrived");
            }
            UploadState::Writing { filename, handle } => {
                let bytes = handle.close().await?;
                info!("Upload '{}' complete ({} bytes)", filename, bytes);
            }
        }

        Ok(UploadReply {
            message: UPLOAD_SUCCESS_MESSAGE.to_string(),
        })
    }

    /// List the files in the storage root.
    pub async fn list(&self, cancel: &CancellationToken) -> Result<Vec<FileInfo>, TransferError> {
        let _ticket = self.limits.list.acquire(cancel).await?;

        let entries = or_cancelled(cancel, self.storage.list_entries()).await??;
        let files: Vec<FileInfo> = entries.iter().map(FileInfo::from).collect();

        info!(
            "Listed {} files ({} bytes total)",
            files.len(),
            entries.iter().map(|e| e.size).sum::<u64>()
        );
        Ok(files)
    }

    /// Stream a file to `sink` in reads of the configured buffer size.
    ///
    /// Completion is signalled by returning; no terminal chunk is sent.
    pub async fn download<K: ChunkSink>(
        &self,
        filename: &str,
        sink: &mut K,
        cancel: &CancellationToken,
    ) -> Result<DownloadSummary, TransferError> {
        let _ticket = self.limits.download.acquire(cancel).await?;

        let name = validate_filename(filename)?;
        let mut handle = self.storage.open(&name).await?;
        let mut buffer = vec![0u8; self.buffer_size];
        let mut summary = DownloadSummary { chunks: 0, bytes: 0 };

        loop {
            let n = or_cancelled(cancel, handle.read(&mut buffer)).await??;
            if n == 0 {
                break;
            }

            or_cancelled(cancel, sink.send(&buffer[..n]))
                .await?
                .map_err(TransferError::Transport)?;

            summary.chunks += 1;
            summary.bytes += n as u64;
        }

        info!(
            "Download '{}' complete ({} bytes in {} chunks)",
            name, summary.bytes, summary.chunks
        );
        Ok(summary)
    }
}
