//! Transfer result types
//!
//! Defines result structures returned by transfer operations.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::storage::StoredEntry;

/// Acknowledgement sent once an upload stream completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReply {
    pub message: String,
}

/// One listing record.
///
/// Storage only tracks a modification time, so `created_at` and
/// `updated_at` always carry the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub filename: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&StoredEntry> for FileInfo {
    fn from(entry: &StoredEntry) -> Self {
        let stamp = DateTime::<Utc>::from(entry.modified).to_rfc3339_opts(SecondsFormat::Secs, true);
        Self {
            filename: entry.name.clone(),
            created_at: stamp.clone(),
            updated_at: stamp,
        }
    }
}

/// Totals for a finished download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSummary {
    pub chunks: u64,
    pub bytes: u64,
}
