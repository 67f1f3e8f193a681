//! Peer identity value objects.

use std::fmt;
use std::net::SocketAddr;

use crate::error::{DomainError, DomainResult};

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Identity of a connected peer, derived from its remote endpoint.
///
/// Wraps the `ip:port` form of the socket address. Unique per live socket,
/// so it is used as the registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddr(String);

impl PeerAddr {
    /// Creates a new PeerAddr from any string form.
    ///
    /// Note: This does not validate the `ip:port` format. In-memory
    /// transports used by tests have no socket address to derive from.
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SocketAddr> for PeerAddr {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.to_string())
    }
}

impl From<&str> for PeerAddr {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for PeerAddr {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Display name chosen by a client during the handshake.
///
/// Set once from the first line the client sends. Never empty and never
/// contains a line break.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Creates a username, rejecting empty names and embedded line breaks.
    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(DomainError::EmptyUsername);
        }
        if name.contains(['\n', '\r']) {
            return Err(DomainError::UsernameContainsNewline(name));
        }
        Ok(Self(name))
    }

    /// Builds a username from a raw handshake line.
    ///
    /// Strips the trailing line terminator (`\n` or `\r\n`) before
    /// validating. Inner whitespace is kept as typed.
    pub fn from_handshake_line(line: &str) -> DomainResult<Self> {
        Self::new(line.trim_end_matches(['\r', '\n']))
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
