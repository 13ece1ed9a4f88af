//! Transfer client
//!
//! Opens one connection per call and speaks the frame protocol.

use log::debug;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::DEFAULT_MAX_MESSAGE_BYTES;
use crate::protocol::frames::{Frame, read_frame, write_frame};
use crate::protocol::status::Status;
use crate::transfer::FileInfo;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("server returned {0}")]
    Status(Status),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    /// The server status, if the call failed with one
    pub fn status(&self) -> Option<&Status> {
        match self {
            ClientError::Status(status) => Some(status),
            _ => None,
        }
    }
}

pub struct FileClient {
    addr: String,
    max_message_bytes: usize,
}

impl FileClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }

    async fn connect(&self) -> Result<TcpStream, ClientError> {
        let stream = TcpStream::connect(&self.addr).await?;
        debug!("Connected to {}", self.addr);
        Ok(stream)
    }

    async fn next_frame<R: AsyncRead + Unpin>(&self, reader: &mut R) -> Result<Frame, ClientError> {
        read_frame(reader, self.max_message_bytes)
            .await?
            .ok_or_else(|| ClientError::Protocol("connection closed before status".into()))
    }

    async fn expect_ok<R: AsyncRead + Unpin>(&self, reader: &mut R) -> Result<(), ClientError> {
        match self.next_frame(reader).await? {
            Frame::Status(status) if status.is_ok() => Ok(()),
            Frame::Status(status) => Err(ClientError::Status(status)),
            other => Err(ClientError::Protocol(format!(
                "expected status, got {}",
                other.kind()
            ))),
        }
    }

    /// Upload `chunks` under `filename`, returning the server's message.
    ///
    /// Every chunk carries the filename; the server binds the first one.
    pub async fn upload<I>(&self, filename: &str, chunks: I) -> Result<String, ClientError>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let stream = self.connect().await?;
        let (mut reader, mut writer) = stream.into_split();

        let mut sent = Ok(());
        for chunk in chunks {
            let frame = Frame::UploadChunk {
                filename: filename.to_string(),
                chunk,
            };
            sent = write_frame(&mut writer, &frame).await;
            if sent.is_err() {
                break;
            }
        }
        if sent.is_ok() {
            sent = write_frame(&mut writer, &Frame::UploadEnd).await;
        }

        // A rejected call closes early; its status is still readable
        let reply = match self.next_frame(&mut reader).await {
            Ok(frame) => frame,
            Err(e) => return Err(sent.err().map(ClientError::from).unwrap_or(e)),
        };
        let _ = writer.shutdown().await;

        match reply {
            Frame::UploadReply { message } => {
                self.expect_ok(&mut reader).await?;
                Ok(message)
            }
            Frame::Status(status) if !status.is_ok() => Err(ClientError::Status(status)),
            other => Err(ClientError::Protocol(format!(
                "expected upload reply, got {}",
                other.kind()
            ))),
        }
    }

    /// Fetch the listing of stored files.
    pub async fn list(&self) -> Result<Vec<FileInfo>, ClientError> {
        let stream = self.connect().await?;
        let (mut reader, mut writer) = stream.into_split();
        write_frame(&mut writer, &Frame::ListRequest).await?;

        match self.next_frame(&mut reader).await? {
            Frame::ListReply { files } => {
                self.expect_ok(&mut reader).await?;
                Ok(files)
            }
            Frame::Status(status) if !status.is_ok() => Err(ClientError::Status(status)),
            other => Err(ClientError::Protocol(format!(
                "expected list reply, got {}",
                other.kind()
            ))),
        }
    }

    /// Download `filename`, returning the chunks as received.
    pub async fn download(&self, filename: &str) -> Result<Vec<Vec<u8>>, ClientError> {
        let stream = self.connect().await?;
        let (mut reader, mut writer) = stream.into_split();
        write_frame(
            &mut writer,
            &Frame::DownloadRequest {
                filename: filename.to_string(),
            },
        )
        .await?;

        let mut chunks = Vec::new();
        loop {
            match self.next_frame(&mut reader).await? {
                Frame::DownloadChunk { chunk } => chunks.push(chunk),
                Frame::Status(status) if status.is_ok() => return Ok(chunks),
                Frame::Status(status) => return Err(ClientError::Status(status)),
                other => {
                    return Err(ClientError::Protocol(format!(
                        "unexpected {} frame in download",
                        other.kind()
                    )));
                }
            }
        }
    }
}
