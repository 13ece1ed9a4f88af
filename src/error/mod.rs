//! Error handling
//!
//! Defines error types and maps them onto wire statuses.

pub mod handlers;
pub mod types;

pub use types::*;
