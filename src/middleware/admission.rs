//! Admission control
//!
//! One counting semaphore per operation class caps how many calls of that
//! class run at once. Capacity is held through an [`AdmissionTicket`] and
//! handed back when the ticket is dropped.

use log::debug;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::AdmissionError;

/// Operation classes competing for separate capacity pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    Upload,
    Download,
    List,
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationClass::Upload => "upload",
            OperationClass::Download => "download",
            OperationClass::List => "list",
        };
        f.write_str(name)
    }
}

/// Counting gate for a single operation class
#[derive(Debug)]
pub struct AdmissionLimiter {
    class: OperationClass,
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionLimiter {
    pub fn new(class: OperationClass, capacity: usize) -> Self {
        Self {
            class,
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn class(&self) -> OperationClass {
        self.class
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of free slots.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Number of tickets currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }

    /// Wait for a free slot.
    ///
    /// Fails with [`AdmissionError::Cancelled`] when `cancel` is already
    /// fired or fires before a slot frees up. Waiters are served in FIFO
    /// order by the underlying semaphore.
    pub async fn acquire(
        &self,
        cancel: &CancellationToken,
    ) -> Result<AdmissionTicket, AdmissionError> {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AdmissionError::Cancelled(self.class)),
            // The semaphore is never closed, so a failed acquire only
            // happens while the limiter is being torn down.
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                permit.map_err(|_| AdmissionError::Cancelled(self.class))?
            }
        };

        debug!(
            "Admitted {} operation ({}/{} in flight)",
            self.class,
            self.in_flight(),
            self.capacity
        );

        Ok(AdmissionTicket {
            class: self.class,
            _permit: permit,
        })
    }
}

/// Capacity held against one limiter for the duration of one operation.
///
/// Dropping the ticket releases the slot, so every exit path releases it
/// exactly once.
#[derive(Debug)]
pub struct AdmissionTicket {
    class: OperationClass,
    _permit: OwnedSemaphorePermit,
}

impl AdmissionTicket {
    pub fn class(&self) -> OperationClass {
        self.class
    }
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        debug!("Released {} ticket", self.class);
    }
}

/// The three limiters, built once at startup and shared by every call
#[derive(Debug)]
pub struct AdmissionLimits {
    pub upload: AdmissionLimiter,
    pub download: AdmissionLimiter,
    pub list: AdmissionLimiter,
}

impl AdmissionLimits {
    pub fn new(uploads: usize, downloads: usize, lists: usize) -> Self {
        Self {
            upload: AdmissionLimiter::new(OperationClass::Upload, uploads),
            download: AdmissionLimiter::new(OperationClass::Download, downloads),
            list: AdmissionLimiter::new(OperationClass::List, lists),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.max_concurrent_uploads,
            config.max_concurrent_downloads,
            config.max_list_requests,
        )
    }

    pub fn limiter(&self, class: OperationClass) -> &AdmissionLimiter {
        match class {
            OperationClass::Upload => &self.upload,
            OperationClass::Download => &self.download,
            OperationClass::List => &self.list,
        }
    }
}
