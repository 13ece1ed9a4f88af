//! Stream seams
//!
//! The transfer service consumes upload chunks from a [`ChunkSource`] and
//! emits download chunks into a [`ChunkSink`]. Any transport that can offer
//! these two shapes can drive the service.

use std::future::Future;
use std::io;
use tokio::sync::mpsc;

/// One upload message: the target name plus a slice of payload.
///
/// Only the first message's `filename` is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadChunk {
    pub filename: String,
    pub chunk: Vec<u8>,
}

impl UploadChunk {
    pub fn new(filename: impl Into<String>, chunk: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            chunk: chunk.into(),
        }
    }
}

/// Inbound side of an upload stream
pub trait ChunkSource: Send {
    /// Next chunk, or `None` once the client signalled end of input.
    fn recv(&mut self) -> impl Future<Output = io::Result<Option<UploadChunk>>> + Send;
}

/// Outbound side of a download stream
pub trait ChunkSink: Send {
    fn send(&mut self, chunk: &[u8]) -> impl Future<Output = io::Result<()>> + Send;
}

/// Channel adapter: a closed channel is end of input, an `Err` item is a
/// transport failure.
impl ChunkSource for mpsc::Receiver<io::Result<UploadChunk>> {
    async fn recv(&mut self) -> io::Result<Option<UploadChunk>> {
        mpsc::Receiver::recv(self).await.transpose()
    }
}

/// Channel adapter: a dropped receiver fails the send.
impl ChunkSink for mpsc::Sender<Vec<u8>> {
    async fn send(&mut self, chunk: &[u8]) -> io::Result<()> {
        mpsc::Sender::send(self, chunk.to_vec())
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "download receiver dropped"))
    }
}
