//! Error types
//!
//! Defines domain-specific error types for each layer of the transfer server.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::middleware::OperationClass;

/// Filename validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("file name is empty")]
    Empty,

    #[error("file name {name:?} contains disallowed character {found:?}")]
    DisallowedCharacter { name: String, found: char },

    #[error("file name {0:?} is reserved")]
    Reserved(String),
}

/// Storage accessor errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file not found: {name}: {source}")]
    NotFound { name: String, source: io::Error },

    #[error("failed to {op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        source: io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        StorageError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Admission limiter errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("too many concurrent {0} operations: cancelled while waiting for a slot")]
    Cancelled(OperationClass),
}

/// Transfer service error covering every way a call can fail
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("invalid file name: {0}")]
    InvalidName(#[from] NameError),

    #[error(transparent)]
    ResourceExhausted(#[from] AdmissionError),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("transport error: {0}")]
    Transport(io::Error),

    #[error("call cancelled")]
    Cancelled,
}

impl From<StorageError> for TransferError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound { name, .. } => TransferError::NotFound(name),
            other => TransferError::Storage(other),
        }
    }
}
