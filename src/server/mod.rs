//! Server core functionality
//!
//! This module contains the listener, the per-connection call routing and
//! the shutdown handling for the transfer server.

pub mod core;

pub use core::Server;
