//! Wire frames
//!
//! Each frame is a one byte tag, a big-endian `u32` body length and the body.
//! Strings and byte fields inside a body carry their own `u32` length prefix.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::status::{Code, Status};
use crate::transfer::FileInfo;

const TAG_UPLOAD_CHUNK: u8 = 1;
const TAG_UPLOAD_END: u8 = 2;
const TAG_LIST_REQUEST: u8 = 3;
const TAG_DOWNLOAD_REQUEST: u8 = 4;
const TAG_UPLOAD_REPLY: u8 = 16;
const TAG_LIST_REPLY: u8 = 17;
const TAG_DOWNLOAD_CHUNK: u8 = 18;
const TAG_STATUS: u8 = 32;

/// Length prefix carried by every string and byte field.
pub const FIELD_PREFIX_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    // client → server
    UploadChunk { filename: String, chunk: Vec<u8> },
    UploadEnd,
    ListRequest,
    DownloadRequest { filename: String },
    // server → client
    UploadReply { message: String },
    ListReply { files: Vec<FileInfo> },
    DownloadChunk { chunk: Vec<u8> },
    Status(Status),
}

impl Frame {
    fn tag(&self) -> u8 {
        match self {
            Frame::UploadChunk { .. } => TAG_UPLOAD_CHUNK,
            Frame::UploadEnd => TAG_UPLOAD_END,
            Frame::ListRequest => TAG_LIST_REQUEST,
            Frame::DownloadRequest { .. } => TAG_DOWNLOAD_REQUEST,
            Frame::UploadReply { .. } => TAG_UPLOAD_REPLY,
            Frame::ListReply { .. } => TAG_LIST_REPLY,
            Frame::DownloadChunk { .. } => TAG_DOWNLOAD_CHUNK,
            Frame::Status(_) => TAG_STATUS,
        }
    }

    /// Body size of a `DownloadChunk` carrying `chunk_len` bytes
    pub fn download_chunk_body_len(chunk_len: usize) -> usize {
        FIELD_PREFIX_LEN + chunk_len
    }

    /// Short name for log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::UploadChunk { .. } => "upload chunk",
            Frame::UploadEnd => "upload end",
            Frame::ListRequest => "list request",
            Frame::DownloadRequest { .. } => "download request",
            Frame::UploadReply { .. } => "upload reply",
            Frame::ListReply { .. } => "list reply",
            Frame::DownloadChunk { .. } => "download chunk",
            Frame::Status(_) => "status",
        }
    }
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> io::Result<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| invalid("field too large"))?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Serialize a frame, header included.
pub fn encode(frame: &Frame) -> io::Result<Vec<u8>> {
    let mut body = Vec::new();
    match frame {
        Frame::UploadChunk { filename, chunk } => {
            put_bytes(&mut body, filename.as_bytes())?;
            put_bytes(&mut body, chunk)?;
        }
        Frame::UploadEnd | Frame::ListRequest => {}
        Frame::DownloadRequest { filename } => put_bytes(&mut body, filename.as_bytes())?,
        Frame::UploadReply { message } => put_bytes(&mut body, message.as_bytes())?,
        Frame::ListReply { files } => {
            let count = u32::try_from(files.len()).map_err(|_| invalid("too many files"))?;
            body.extend_from_slice(&count.to_be_bytes());
            for file in files {
                put_bytes(&mut body, file.filename.as_bytes())?;
                put_bytes(&mut body, file.created_at.as_bytes())?;
                put_bytes(&mut body, file.updated_at.as_bytes())?;
            }
        }
        Frame::DownloadChunk { chunk } => put_bytes(&mut body, chunk)?,
        Frame::Status(status) => {
            body.push(status.code as u8);
            put_bytes(&mut body, status.message.as_bytes())?;
        }
    }

    let len = u32::try_from(body.len()).map_err(|_| invalid("frame too large"))?;
    let mut out = Vec::with_capacity(5 + body.len());
    out.push(frame.tag());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Cursor over a received frame body
struct Body<'a> {
    rest: &'a [u8],
}

impl<'a> Body<'a> {
    fn take(&mut self, n: usize) -> io::Result<&'a [u8]> {
        if self.rest.len() < n {
            return Err(invalid("truncated frame body"));
        }
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        Ok(head)
    }

    fn u8(&mut self) -> io::Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> io::Result<u32> {
        let raw = self.take(4)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn bytes(&mut self) -> io::Result<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn string(&mut self) -> io::Result<String> {
        String::from_utf8(self.bytes()?).map_err(|_| invalid("string field is not UTF-8"))
    }

    fn finish(self) -> io::Result<()> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(invalid("trailing bytes in frame body"))
        }
    }
}

fn decode(tag: u8, body: &[u8]) -> io::Result<Frame> {
    let mut body = Body { rest: body };
    let frame = match tag {
        TAG_UPLOAD_CHUNK => Frame::UploadChunk {
            filename: body.string()?,
            chunk: body.bytes()?,
        },
        TAG_UPLOAD_END => Frame::UploadEnd,
        TAG_LIST_REQUEST => Frame::ListRequest,
        TAG_DOWNLOAD_REQUEST => Frame::DownloadRequest {
            filename: body.string()?,
        },
        TAG_UPLOAD_REPLY => Frame::UploadReply {
            message: body.string()?,
        },
        TAG_LIST_REPLY => {
            let count = body.u32()?;
            let mut files = Vec::new();
            for _ in 0..count {
                files.push(FileInfo {
                    filename: body.string()?,
                    created_at: body.string()?,
                    updated_at: body.string()?,
                });
            }
            Frame::ListReply { files }
        }
        TAG_DOWNLOAD_CHUNK => Frame::DownloadChunk {
            chunk: body.bytes()?,
        },
        TAG_STATUS => {
            let raw = body.u8()?;
            let code = Code::from_u8(raw).ok_or_else(|| invalid(format!("unknown status code {raw}")))?;
            Frame::Status(Status::new(code, body.string()?))
        }
        other => return Err(invalid(format!("unknown frame tag {other}"))),
    };
    body.finish()?;
    Ok(frame)
}

/// Read the next frame.
///
/// Returns `Ok(None)` when the peer closed the stream on a frame boundary.
/// Bodies larger than `max_body` are refused before being read.
pub async fn read_frame<R>(reader: &mut R, max_body: usize) -> io::Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let tag = match reader.read_u8().await {
        Ok(tag) => tag,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };

    let len = reader.read_u32().await? as usize;
    if len > max_body {
        return Err(invalid(format!(
            "frame body of {len} bytes exceeds limit of {max_body}"
        )));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    decode(tag, &body).map(Some)
}

/// Write one frame.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode(frame)?;
    writer.write_all(&bytes).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 1024;

    #[tokio::test]
    async fn frames_survive_the_wire() {
        let frames = vec![
            Frame::UploadChunk {
                filename: "a.txt".into(),
                chunk: b"hel".to_vec(),
            },
            Frame::UploadEnd,
            Frame::ListReply {
                files: vec![FileInfo {
                    filename: "a.txt".into(),
                    created_at: "2024-01-01T00:00:00Z".into(),
                    updated_at: "2024-01-01T00:00:00Z".into(),
                }],
            },
            Frame::Status(Status::new(Code::NotFound, "file not found: b.txt")),
        ];

        let mut wire = Vec::new();
        for frame in &frames {
            write_frame(&mut wire, frame).await.unwrap();
        }

        let mut reader = wire.as_slice();
        for expected in &frames {
            let got = read_frame(&mut reader, LIMIT).await.unwrap().unwrap();
            assert_eq!(&got, expected);
        }
        assert!(read_frame(&mut reader, LIMIT).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_body_is_refused() {
        let frame = Frame::DownloadChunk {
            chunk: vec![0u8; LIMIT + 1],
        };
        let wire = encode(&frame).unwrap();

        let err = read_frame(&mut wire.as_slice(), LIMIT).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn download_chunk_body_len_matches_encoding() {
        let wire = encode(&Frame::DownloadChunk {
            chunk: vec![1u8; 100],
        })
        .unwrap();
        assert_eq!(wire.len() - 5, Frame::download_chunk_body_len(100));

        let limit = Frame::download_chunk_body_len(100);
        assert!(read_frame(&mut wire.as_slice(), limit).await.unwrap().is_some());
        assert!(read_frame(&mut wire.as_slice(), limit - 1).await.is_err());
    }

    #[tokio::test]
    async fn truncated_frame_is_an_error() {
        let wire = encode(&Frame::DownloadRequest {
            filename: "a.txt".into(),
        })
        .unwrap();

        let err = read_frame(&mut &wire[..wire.len() - 2], LIMIT)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn unknown_tag_is_rejected() {
        let wire = [99u8, 0, 0, 0, 0];
        let err = read_frame(&mut wire.as_slice(), LIMIT).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn trailing_body_bytes_are_rejected() {
        // UploadEnd carries an empty body
        let wire = [TAG_UPLOAD_END, 0, 0, 0, 1, 7];
        let err = read_frame(&mut wire.as_slice(), LIMIT).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
