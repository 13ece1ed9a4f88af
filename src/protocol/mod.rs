//! Transfer protocol implementation
//!
//! Frame encoding, call status, socket adapters for the transfer service,
//! and a client speaking the same frames.

pub mod client;
pub mod frames;
pub mod status;
pub mod transport;

pub use client::{ClientError, FileClient};
pub use frames::{Frame, read_frame, write_frame};
pub use status::{Code, Status};
pub use transport::{FrameSink, FrameSource};
