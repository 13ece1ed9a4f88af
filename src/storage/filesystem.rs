//! File system operations
//!
//! Raw byte I/O under the storage root. No business logic beyond joining the
//! root with an already validated name.

use log::{debug, warn};
use std::path::PathBuf;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::StorageError;
use crate::storage::results::StoredEntry;
use crate::storage::validation::FileName;

/// Accessor for the flat storage directory
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &FileName) -> PathBuf {
        self.root.join(name.as_str())
    }

    /// Create the file, truncating any previous content.
    pub async fn create(&self, name: &FileName) -> Result<WriteHandle, StorageError> {
        let path = self.path_for(name);
        let file = File::create(&path)
            .await
            .map_err(|e| StorageError::io("create", &path, e))?;

        debug!("Created {}", path.display());
        Ok(WriteHandle {
            file,
            path,
            written: 0,
        })
    }

    /// Open an existing file for reading.
    ///
    /// Any failure, including permission problems, is reported as not found.
    pub async fn open(&self, name: &FileName) -> Result<ReadHandle, StorageError> {
        let path = self.path_for(name);
        let not_found = |source| StorageError::NotFound {
            name: name.to_string(),
            source,
        };

        let file = File::open(&path).await.map_err(not_found)?;
        let metadata = file.metadata().await.map_err(not_found)?;
        if metadata.is_dir() {
            return Err(not_found(std::io::Error::other("is a directory")));
        }

        Ok(ReadHandle { file, path })
    }

    /// List the direct children of the storage root, sorted by name.
    ///
    /// Entries whose name is not UTF-8 or whose metadata cannot be read are
    /// skipped. Failing to read the directory itself fails the whole listing.
    pub async fn list_entries(&self) -> Result<Vec<StoredEntry>, StorageError> {
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|e| StorageError::io("read directory", &self.root, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StorageError::io("read directory", &self.root, e))?
        {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!("Skipping {:?}: name is not valid UTF-8", raw);
                    continue;
                }
            };

            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Skipping '{}': cannot read metadata: {}", name, e);
                    continue;
                }
            };

            let modified = match metadata.modified() {
                Ok(modified) => modified,
                Err(e) => {
                    warn!("Skipping '{}': no modification time: {}", name, e);
                    continue;
                }
            };

            entries.push(StoredEntry {
                name,
                modified,
                size: metadata.len(),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

/// Open write handle for an upload
#[derive(Debug)]
pub struct WriteHandle {
    file: File,
    path: PathBuf,
    written: u64,
}

impl WriteHandle {
    /// Append bytes in call order.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        self.file
            .write_all(bytes)
            .await
            .map_err(|e| StorageError::io("write", &self.path, e))?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Flush outstanding writes and close the file.
    pub async fn close(mut self) -> Result<u64, StorageError> {
        self.file
            .flush()
            .await
            .map_err(|e| StorageError::io("flush", &self.path, e))?;
        Ok(self.written)
    }
}

/// Open read handle for a download
#[derive(Debug)]
pub struct ReadHandle {
    file: File,
    path: PathBuf,
}

impl ReadHandle {
    /// Fill `buffer` with the next bytes. Returns 0 at end of file.
    pub async fn read(&mut self, buffer: &mut [u8]) -> Result<usize, StorageError> {
        self.file
            .read(buffer)
            .await
            .map_err(|e| StorageError::io("read", &self.path, e))
    }
}
