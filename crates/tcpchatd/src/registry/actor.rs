//! Registry actor - owns all session state and processes commands.
//!
//! The RegistryActor is the single owner of the connection registry.
//! It receives commands via an mpsc channel and publishes events via broadcast.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel send failures are ignored or logged, never panicked on

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use tcpchat_core::PeerAddr;

use super::commands::{DeactivationReason, RegistryCommand, SessionEvent};
use crate::session::Session;

// ============================================================================
// Registry Actor
// ============================================================================

/// The registry actor - owns the address → session map.
///
/// Implements the actor pattern: receives commands via mpsc channel,
/// processes them sequentially, and publishes events to subscribers.
///
/// # Thread Safety
///
/// The actor runs in a single task and processes commands one at a time,
/// so no handler ever observes a half-applied insert or flag change and a
/// snapshot is always a consistent view.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Registered sessions keyed by remote address
    sessions: HashMap<PeerAddr, Session>,

    /// Event publisher for registry observers
    event_publisher: broadcast::Sender<SessionEvent>,

    /// How long an inactive session is kept before eviction
    evict_after: Duration,
}

impl RegistryActor {
    /// Creates a new registry actor.
    ///
    /// # Arguments
    ///
    /// * `receiver` - Channel for receiving commands
    /// * `event_publisher` - Broadcast channel for publishing events
    /// * `evict_after` - Grace period before inactive sessions are dropped
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        event_publisher: broadcast::Sender<SessionEvent>,
        evict_after: Duration,
    ) -> Self {
        Self {
            receiver,
            sessions: HashMap::new(),
            event_publisher,
            evict_after,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            "Registry actor stopped (sessions: {})",
            self.sessions.len()
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Insert {
                session,
                respond_to,
            } => {
                self.handle_insert(*session);
                // Ignore send error - caller may have dropped the receiver
                let _ = respond_to.send(());
            }
            RegistryCommand::MarkInactive {
                addr,
                reason,
                respond_to,
            } => {
                let flipped = self.handle_mark_inactive(addr, reason);
                let _ = respond_to.send(flipped);
            }
            RegistryCommand::Get { addr, respond_to } => {
                let _ = respond_to.send(self.sessions.get(&addr).cloned());
            }
            RegistryCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.sessions.values().cloned().collect());
            }
            RegistryCommand::EvictInactive => {
                self.handle_evict_inactive();
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_insert(&mut self, session: Session) {
        let addr = session.addr.clone();
        let username = session.username.clone();

        if self.sessions.insert(addr.clone(), session).is_some() {
            debug!(peer = %addr, "Replaced existing registry entry");
        }

        info!(
            peer = %addr,
            username = %username,
            total_sessions = self.sessions.len(),
            "Session registered"
        );

        // Publish event (ignore if no subscribers)
        let _ = self
            .event_publisher
            .send(SessionEvent::Registered { addr, username });
    }

    fn handle_mark_inactive(&mut self, addr: PeerAddr, reason: DeactivationReason) -> bool {
        let Some(session) = self.sessions.get_mut(&addr) else {
            debug!(peer = %addr, "Mark inactive for unknown peer, ignoring");
            return false;
        };

        if !session.deactivate() {
            return false;
        }

        info!(
            peer = %addr,
            username = %session.username,
            reason = %reason,
            "Session marked inactive"
        );

        let _ = self
            .event_publisher
            .send(SessionEvent::Deactivated { addr, reason });
        true
    }

    /// Removes inactive sessions whose grace period has elapsed.
    fn handle_evict_inactive(&mut self) {
        // An unrepresentable grace period means "never evict"
        let cutoff = chrono::Duration::from_std(self.evict_after)
            .ok()
            .and_then(|grace| Utc::now().checked_sub_signed(grace));

        let expired: Vec<PeerAddr> = self
            .sessions
            .values()
            .filter(|s| !s.active)
            .filter(|s| match (s.disconnected_at, cutoff) {
                (Some(at), Some(cutoff)) => at <= cutoff,
                _ => false,
            })
            .map(|s| s.addr.clone())
            .collect();

        for addr in expired {
            self.sessions.remove(&addr);
            debug!(peer = %addr, "Evicted inactive session");
            let _ = self.event_publisher.send(SessionEvent::Evicted { addr });
        }
    }

    /// Returns the number of registered sessions (for testing).
    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
