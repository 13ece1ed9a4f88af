//! File system storage management
//!
//! Handles filename validation and raw file operations under the storage root.

pub mod filesystem;
pub mod results;
pub mod validation;

pub use filesystem::{ReadHandle, Storage, WriteHandle};
pub use results::StoredEntry;
pub use validation::{FileName, validate_filename};
