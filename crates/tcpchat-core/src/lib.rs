//! TCPChat Core - Shared types for the chat server and client
//!
//! This crate provides the domain types shared between
//! the server (tcpchatd) and the terminal client (tcpchat-client).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod config;
pub mod error;
pub mod peer;

// Re-exports for convenience
pub use config::{ClientConfig, ConfigFile, Framing, ServerConfig, DEFAULT_MAX_FRAME_SIZE};
pub use error::{ConfigError, DomainError, DomainResult};
pub use peer::{PeerAddr, Username};
