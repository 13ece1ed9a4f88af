//! Logging middleware
//!
//! Provides connection and call logging functionality.

use log::info;
use std::net::SocketAddr;

use crate::error::handlers::handle_error;
use crate::error::TransferError;
use crate::middleware::OperationClass;

/// Log a client connection
pub fn log_connection(client_addr: &SocketAddr) {
    info!("Client connected: {}", client_addr);
}

/// Log the start of a call
pub fn log_call(client_addr: &SocketAddr, class: OperationClass) {
    info!("Client {} started {}", client_addr, class);
}

/// Log how a call ended
pub fn log_outcome<T>(
    client_addr: &SocketAddr,
    class: OperationClass,
    result: &Result<T, TransferError>,
) {
    match result {
        Ok(_) => info!("Client {} finished {}", client_addr, class),
        Err(e) => handle_error(e),
    }
}
