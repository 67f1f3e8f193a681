//! Domain-specific error types following panic-free policy.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Handshake line was empty once the line terminator was stripped
    #[error("Username must not be empty")]
    EmptyUsername,

    /// Username would break the line-oriented wire format
    #[error("Username must not contain line breaks: {0:?}")]
    UsernameContainsNewline(String),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file exists but could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for the expected schema
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value parsed but is out of range
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
