//! Common error types for the recon services

use thiserror::Error;

/// Common result type for recon operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the recon binaries
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML config file did not parse
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Request to a remote service never completed (connect, timeout, reset)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Remote service answered with a non-success status
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Entity payload failed boundary validation
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),
}

impl Error {
    /// True for failures worth retrying after a pause (network or 5xx)
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
