//! Fan-out of one frame to every other active session.
//!
//! Each recipient gets its own delivery task with a write deadline, so a
//! slow or dead peer only delays its own copy. Failed peers are marked
//! inactive and their handlers are told to stop; delivery to everyone
//! else carries on.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use tcpchat_core::PeerAddr;
use tcpchat_protocol::ServerFrame;

use crate::registry::{DeactivationReason, RegistryHandle};
use crate::session::{Session, WriteError};

/// Outcome of a single broadcast.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Peers that received the frame
    pub delivered: usize,

    /// Peers whose write failed or timed out
    pub failed: Vec<PeerAddr>,
}

impl BroadcastReport {
    /// Total number of peers a delivery was attempted to.
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed.len()
    }
}

/// Delivers frames from one session to all others in the registry.
#[derive(Clone)]
pub struct Broadcaster {
    registry: RegistryHandle,
    write_timeout: Duration,
}

impl Broadcaster {
    pub fn new(registry: RegistryHandle, write_timeout: Duration) -> Self {
        Self {
            registry,
            write_timeout,
        }
    }

    /// Sends `frame` to every active session except `from`.
    ///
    /// Works on a registry snapshot taken at call time; sessions registered
    /// after that point do not get this frame. Never fails as a whole.
    pub async fn broadcast(&self, frame: &ServerFrame, from: &Session) -> BroadcastReport {
        let payload: Arc<[u8]> = frame.encode().into();

        let mut deliveries = JoinSet::new();
        for peer in self
            .registry
            .snapshot()
            .await
            .into_iter()
            .filter(|s| s.is_recipient_for(&from.addr))
        {
            let payload = Arc::clone(&payload);
            let limit = self.write_timeout;
            deliveries.spawn(async move {
                let result = peer.writer.send(&payload, limit).await;
                (peer, result)
            });
        }

        let mut report = BroadcastReport::default();
        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok((_, Ok(()))) => report.delivered += 1,
                Ok((peer, Err(e))) => {
                    self.drop_peer(&peer, &e).await;
                    report.failed.push(peer.addr);
                }
                Err(e) => {
                    error!(error = %e, "Delivery task failed");
                }
            }
        }

        debug!(
            from = %from.addr,
            delivered = report.delivered,
            failed = report.failed.len(),
            "Broadcast complete"
        );
        report
    }

    /// Marks an unreachable peer inactive and stops its handler.
    async fn drop_peer(&self, peer: &Session, err: &WriteError) {
        warn!(
            peer = %peer.addr,
            username = %peer.username,
            error = %err,
            "Failed to deliver to peer, marking inactive"
        );

        self.registry
            .mark_inactive(peer.addr.clone(), DeactivationReason::WriteFailed)
            .await;
        peer.close_token.cancel();
    }
}
