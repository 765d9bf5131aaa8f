//! Common error types for Zenamp

use thiserror::Error;

/// Common result type for Zenamp operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the Zenamp crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed playlist or session sidecar
    #[error("Session format error: {0}")]
    SessionFormat(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}
