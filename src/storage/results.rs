//! Storage result types
//!
//! Defines result structures returned by storage operations.

use std::time::SystemTime;

/// One direct child of the storage root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub name: String,
    pub modified: SystemTime,
    pub size: u64,
}
