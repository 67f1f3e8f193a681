//! Configuration for the chat server and client.
//!
//! Both sides read the same optional TOML file:
//!
//! ```toml
//! [server]
//! addr = "0.0.0.0:8333"
//! framing = "line"        # or "chunk"
//! max_frame_size = 1024
//! write_timeout_secs = 10
//! evict_after_secs = 300
//! cleanup_interval_secs = 30
//!
//! [client]
//! addr = "127.0.0.1:8333"
//! ```
//!
//! Lookup order: explicit path, then `<config dir>/tcpchat/config.toml`,
//! then built-in defaults. The `TCPCHAT_ADDR` environment variable overrides
//! the address on both sides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Default listen address for the server
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8333";

/// Default address the client dials
pub const DEFAULT_CLIENT_ADDR: &str = "127.0.0.1:8333";

/// Largest frame read from a client in one go
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024;

/// Environment variable overriding the address
pub const ADDR_ENV_VAR: &str = "TCPCHAT_ADDR";

/// How the server splits a client's byte stream into messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// One message per newline-terminated line. Lines longer than the
    /// frame size are split.
    #[default]
    Line,

    /// One message per read, verbatim, whatever bytes it happened to return.
    Chunk,
}

/// Server-side settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub addr: String,

    /// Message framing for client input
    pub framing: Framing,

    /// Maximum bytes per frame (and per handshake line)
    pub max_frame_size: usize,

    /// Per-peer write deadline during a broadcast
    pub write_timeout_secs: u64,

    /// How long an inactive session stays registered
    pub evict_after_secs: u64,

    /// Interval between eviction sweeps
    pub cleanup_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_SERVER_ADDR.to_string(),
            framing: Framing::default(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            write_timeout_secs: 10,
            evict_after_secs: 300,
            cleanup_interval_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn evict_after(&self) -> Duration {
        Duration::from_secs(self.evict_after_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Rejects values that would make the server unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frame_size == 0 {
            return Err(ConfigError::Invalid {
                field: "max_frame_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.write_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "write_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.cleanup_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "cleanup_interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Client-side settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address to dial
    pub addr: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_CLIENT_ADDR.to_string(),
        }
    }
}

/// Contents of a config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub server: ServerConfig,
    pub client: ClientConfig,
}

impl ConfigFile {
    /// Loads configuration, falling back to defaults when no file exists.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.server.validate()?;
        Ok(config)
    }

    /// Parses a config file from disk.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Applies environment overrides through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(ADDR_ENV_VAR).filter(|a| !a.is_empty()) {
            debug!(addr = %addr, "Address overridden from environment");
            self.server.addr = addr.clone();
            self.client.addr = addr;
        }
    }
}

/// Returns `<config dir>/tcpchat/config.toml`, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tcpchat").join("config.toml"))
}
