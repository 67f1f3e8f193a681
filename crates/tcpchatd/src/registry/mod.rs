//! Connection registry using the Actor pattern.
//!
//! The registry maps each handshaked connection's remote address to its
//! `Session`. It receives commands via a tokio mpsc channel and is the only
//! owner of that map, so concurrent connection handlers never race on it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │ConnectionHandler│────▶│  RegistryActor  │────▶│ Broadcast Channel│
//! └─────────────────┘     └─────────────────┘     └──────────────────┘
//!         │                       │                       │
//!         │   RegistryCommand     │   SessionEvent        │
//!         │   (mpsc channel)      │   (broadcast)         │
//!         ▼                       ▼                       ▼
//!  Insert/MarkInactive       HashMap<PeerAddr,       Observers (tests,
//!  Snapshot                  Session>                logging)
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - Channel operations handle closure gracefully

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::debug;

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{DeactivationReason, RegistryCommand, RegistryError, SessionEvent};
pub use handle::RegistryHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 100;

/// Registry timing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// How long inactive sessions stay registered
    pub evict_after: Duration,

    /// Interval between eviction sweeps
    pub cleanup_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            evict_after: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

impl From<&tcpchat_core::ServerConfig> for RegistryConfig {
    fn from(config: &tcpchat_core::ServerConfig) -> Self {
        Self {
            evict_after: config.evict_after(),
            cleanup_interval: config.cleanup_interval(),
        }
    }
}

/// Spawn the registry actor with default settings.
///
/// # Example
///
/// ```no_run
/// use tcpchatd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry();
///     let sessions = handle.snapshot().await;
///     assert!(sessions.is_empty());
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    spawn_registry_with(RegistryConfig::default())
}

/// Spawn the registry actor and return a handle for interaction.
///
/// This function:
/// 1. Creates command and event channels
/// 2. Spawns the RegistryActor on a tokio task
/// 3. Spawns a background eviction task
/// 4. Returns a RegistryHandle for client use
pub fn spawn_registry_with(config: RegistryConfig) -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = RegistryActor::new(cmd_rx, event_tx.clone(), config.evict_after);
    tokio::spawn(actor.run());

    let handle = RegistryHandle::new(cmd_tx.clone(), event_tx);

    spawn_cleanup_task(cmd_tx.downgrade(), config.cleanup_interval);

    handle
}

/// Spawn a background task that triggers periodic eviction.
///
/// Holds only a weak sender so the actor stops once every handle is gone.
fn spawn_cleanup_task(sender: mpsc::WeakSender<RegistryCommand>, period: Duration) {
    tokio::spawn(async move {
        // interval() panics on a zero period
        let mut ticker = interval(period.max(Duration::from_millis(1)));
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(sender) = sender.upgrade() else {
                debug!("Cleanup task stopping: registry dropped");
                break;
            };

            if sender.send(RegistryCommand::EvictInactive).await.is_err() {
                debug!("Cleanup task stopping: registry channel closed");
                break;
            }
        }
    });
}
