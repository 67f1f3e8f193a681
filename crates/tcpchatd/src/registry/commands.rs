//! Registry actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `SessionEvent`: Events published by the registry for subscribers
//!
//! All types are designed for async message passing and follow the panic-free policy.

use tcpchat_core::{PeerAddr, Username};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::session::Session;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Request-style commands carry a oneshot channel for the response, so
/// callers can await the result without holding any shared lock.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Add a session, replacing any entry with the same address.
    ///
    /// The session is boxed to reduce enum size variance.
    Insert {
        session: Box<Session>,
        respond_to: oneshot::Sender<()>,
    },

    /// Clear a session's active flag.
    ///
    /// Responds `true` if the flag flipped, `false` if the address is
    /// unknown or the session was already inactive.
    MarkInactive {
        addr: PeerAddr,
        reason: DeactivationReason,
        respond_to: oneshot::Sender<bool>,
    },

    /// Look up one session.
    Get {
        addr: PeerAddr,
        respond_to: oneshot::Sender<Option<Session>>,
    },

    /// Point-in-time copy of every registered session.
    Snapshot {
        respond_to: oneshot::Sender<Vec<Session>>,
    },

    /// Drop inactive sessions past their grace period.
    ///
    /// This is a fire-and-forget command used by the cleanup task.
    EvictInactive,
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The actor stopped before answering.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Session Events
// ============================================================================

/// Events published by the registry to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session completed its handshake.
    Registered { addr: PeerAddr, username: Username },

    /// A session's active flag was cleared.
    Deactivated {
        addr: PeerAddr,
        reason: DeactivationReason,
    },

    /// An inactive session was dropped from the registry.
    Evicted { addr: PeerAddr },
}

/// Why a session stopped being active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeactivationReason {
    /// The client closed its end of the connection.
    Disconnected,

    /// Reading from the client failed.
    ReadError,

    /// A write to the client failed or timed out.
    WriteFailed,

    /// The server is shutting down.
    Shutdown,
}

impl std::fmt::Display for DeactivationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "peer disconnected"),
            Self::ReadError => write!(f, "read error"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::Shutdown => write!(f, "server shutdown"),
        }
    }
}
