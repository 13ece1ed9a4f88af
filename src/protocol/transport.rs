//! Frame-backed stream adapters
//!
//! Bridges a socket half onto the transfer service's [`ChunkSource`] and
//! [`ChunkSink`] seams.

use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::protocol::frames::{Frame, read_frame, write_frame};
use crate::transfer::{ChunkSink, ChunkSource, UploadChunk};

/// Upload input read from frames.
///
/// `UploadEnd` is end of input. A peer that closes before sending it, or
/// that sends any other frame, fails the stream.
pub struct FrameSource<R> {
    reader: R,
    pending: Option<Frame>,
    max_body: usize,
}

impl<R> FrameSource<R> {
    /// `first` is the frame already consumed to route the call.
    pub fn new(reader: R, first: Option<Frame>, max_body: usize) -> Self {
        Self {
            reader,
            pending: first,
            max_body,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: AsyncRead + Unpin + Send> ChunkSource for FrameSource<R> {
    async fn recv(&mut self) -> io::Result<Option<UploadChunk>> {
        let frame = match self.pending.take() {
            Some(frame) => Some(frame),
            None => read_frame(&mut self.reader, self.max_body).await?,
        };

        match frame {
            Some(Frame::UploadChunk { filename, chunk }) => Ok(Some(UploadChunk { filename, chunk })),
            Some(Frame::UploadEnd) => Ok(None),
            Some(other) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected {} frame in upload stream", other.kind()),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream closed before end of upload",
            )),
        }
    }
}

/// Download output written as `DownloadChunk` frames
pub struct FrameSink<W> {
    writer: W,
}

impl<W> FrameSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Unpin + Send> ChunkSink for FrameSink<W> {
    async fn send(&mut self, chunk: &[u8]) -> io::Result<()> {
        write_frame(
            &mut self.writer,
            &Frame::DownloadChunk {
                chunk: chunk.to_vec(),
            },
        )
        .await
    }
}
