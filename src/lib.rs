pub mod config;
pub mod error;
pub mod middleware;
pub mod protocol;
pub mod server;
pub mod storage;
pub mod transfer;

pub use crate::config::ServerConfig;
pub use protocol::FileClient;
pub use server::Server;
pub use transfer::TransferService;
