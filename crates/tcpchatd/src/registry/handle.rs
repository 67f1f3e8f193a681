//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending commands
//! to the registry actor and subscribing to session events.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `RegistryError::ChannelClosed` or to an
//!   empty/absent result

use tokio::sync::{broadcast, mpsc, oneshot};

use tcpchat_core::PeerAddr;

use super::commands::{DeactivationReason, RegistryCommand, RegistryError, SessionEvent};
use crate::session::Session;

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// All methods are async and communicate with the actor via channels.
///
/// # Usage
///
/// ```ignore
/// let handle = registry_handle.clone();
///
/// handle.insert(session).await?;
/// handle.mark_inactive(addr, DeactivationReason::Disconnected).await;
///
/// for session in handle.snapshot().await {
///     // ...
/// }
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,

    /// Event broadcaster for subscribing to updates
    event_sender: broadcast::Sender<SessionEvent>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    ///
    /// # Arguments
    ///
    /// * `sender` - The command channel sender for communicating with the actor
    /// * `event_sender` - The broadcast sender for subscribing to events
    pub fn new(
        sender: mpsc::Sender<RegistryCommand>,
        event_sender: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Register a session, replacing any entry with the same address.
    ///
    /// Resolves once the actor has applied the insert, so a subsequent
    /// snapshot from any task includes it.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn insert(&self, session: Session) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Insert {
                session: Box::new(session),
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Clear a session's active flag.
    ///
    /// Returns `true` if this call flipped the flag. Unknown addresses,
    /// already-inactive sessions and a stopped actor all yield `false`.
    pub async fn mark_inactive(&self, addr: PeerAddr, reason: DeactivationReason) -> bool {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::MarkInactive {
                addr,
                reason,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return false;
        }

        rx.await.unwrap_or(false)
    }

    /// Get a single session by address.
    ///
    /// Returns `None` if the session doesn't exist or if communication
    /// with the actor fails.
    pub async fn get(&self, addr: PeerAddr) -> Option<Session> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Get {
                addr,
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Point-in-time copy of all registered sessions, active or not.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn snapshot(&self) -> Vec<Session> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Snapshot { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Trigger eviction of expired inactive sessions.
    ///
    /// This is a fire-and-forget operation.
    pub async fn evict_inactive(&self) {
        // Ignore send errors (actor may be shutting down)
        let _ = self.sender.send(RegistryCommand::EvictInactive).await;
    }

    /// Subscribe to registry events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_sender.subscribe()
    }

    /// Check if the actor is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
