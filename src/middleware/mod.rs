//! Server middleware
//!
//! Provides admission control and logging middleware.

pub mod admission;
pub mod logging;

pub use admission::{AdmissionLimiter, AdmissionLimits, AdmissionTicket, OperationClass};
