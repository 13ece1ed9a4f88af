//! Configuration management for the RAX transfer server
//!
//! Settings come from an optional `config.toml` with environment overrides
//! (`RAX_TRANSFER_*`). Every key has a default, so the server also starts
//! with no configuration file at all.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::Frame;

/// Default size of the buffer used to read files for download.
pub const DEFAULT_DOWNLOAD_BUFFER_SIZE: usize = 1024;

/// Default upper bound for a single frame body on the wire (4 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

/// Complete server configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// IP address the listener binds to
    pub bind_address: String,

    /// Port for the transfer listener (0 lets the OS pick one)
    pub port: u16,

    /// Flat directory holding every stored file
    pub storage_root: String,

    // ═══ ADMISSION LIMITS ═══
    /// Maximum number of uploads in flight at once
    pub max_concurrent_uploads: usize,

    /// Maximum number of downloads in flight at once
    pub max_concurrent_downloads: usize,

    /// Maximum number of list requests in flight at once
    pub max_list_requests: usize,

    // ═══ TRANSFER BEHAVIOR ═══
    /// Bytes read from storage per download chunk
    pub download_buffer_size: usize,

    /// Largest frame body accepted from or sent to a peer
    pub max_message_bytes: usize,

    /// Per-call deadline in seconds, 0 disables it
    pub call_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 50051,
            storage_root: "storage".to_string(),
            max_concurrent_uploads: 10,
            max_concurrent_downloads: 10,
            max_list_requests: 100,
            download_buffer_size: DEFAULT_DOWNLOAD_BUFFER_SIZE,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            call_timeout_secs: 0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from config.toml with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        // Packaged layout first, then the working directory
        let config_paths = ["rax-transfer-server/config", "config"];

        let mut builder = Config::builder();
        for config_path in config_paths {
            builder = builder.add_source(File::with_name(config_path).required(false));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("RAX_TRANSFER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.storage_root.is_empty() {
            return Err(config::ConfigError::Message(
                "storage_root cannot be empty".into(),
            ));
        }

        for (key, value) in [
            ("max_concurrent_uploads", self.max_concurrent_uploads),
            ("max_concurrent_downloads", self.max_concurrent_downloads),
            ("max_list_requests", self.max_list_requests),
            ("download_buffer_size", self.download_buffer_size),
        ] {
            if value == 0 {
                return Err(config::ConfigError::Message(format!(
                    "{key} must be greater than 0"
                )));
            }
        }

        // A full read buffer must fit in one download chunk frame
        if Frame::download_chunk_body_len(self.download_buffer_size) > self.max_message_bytes {
            return Err(config::ConfigError::Message(format!(
                "download_buffer_size {} does not fit in a frame of max_message_bytes {}",
                self.download_buffer_size, self.max_message_bytes
            )));
        }

        Ok(())
    }

    /// Bind address and port as a socket address string
    pub fn listen_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Storage root as PathBuf
    pub fn storage_root_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_root)
    }

    /// Per-call deadline, if one is configured
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_secs > 0).then(|| Duration::from_secs(self.call_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let config = ServerConfig::default();
        assert_eq!(config.max_concurrent_uploads, 10);
        assert_eq!(config.max_concurrent_downloads, 10);
        assert_eq!(config.max_list_requests, 100);
        assert_eq!(config.download_buffer_size, 1024);
        assert_eq!(config.listen_socket(), "127.0.0.1:50051");
        assert!(config.call_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = ServerConfig {
            max_list_requests: 0,
            ..ServerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_list_requests"));
    }

    #[test]
    fn buffer_larger_than_message_limit_is_rejected() {
        let config = ServerConfig {
            download_buffer_size: 2048,
            max_message_bytes: 1024,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn buffer_must_leave_room_for_the_chunk_prefix() {
        let at_limit = ServerConfig {
            download_buffer_size: 1024,
            max_message_bytes: 1024,
            ..ServerConfig::default()
        };
        assert!(at_limit.validate().is_err());

        let fits = ServerConfig {
            download_buffer_size: 1020,
            max_message_bytes: 1024,
            ..ServerConfig::default()
        };
        assert!(fits.validate().is_ok());
    }

    #[test]
    fn empty_storage_root_is_rejected() {
        let config = ServerConfig {
            storage_root: String::new(),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn call_timeout_is_enabled_by_positive_value() {
        let config = ServerConfig {
            call_timeout_secs: 5,
            ..ServerConfig::default()
        };
        assert_eq!(config.call_timeout(), Some(Duration::from_secs(5)));
    }
}
