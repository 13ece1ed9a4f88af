//! Transfer module
//!
//! Admission-controlled chunked upload, download and listing, independent of
//! the transport carrying the streams.

pub mod results;
pub mod service;
pub mod stream;

pub use results::{DownloadSummary, FileInfo, UploadReply};
pub use service::{TransferService, UPLOAD_SUCCESS_MESSAGE};
pub use stream::{ChunkSink, ChunkSource, UploadChunk};
