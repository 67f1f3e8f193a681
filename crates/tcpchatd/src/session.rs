//! Per-connection session state.
//!
//! A `Session` is created once a connection completes its username
//! handshake. The connection handler keeps the read half of the transport;
//! the write half lives behind a `SessionWriter` so broadcasts from any
//! handler can reach it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use tcpchat_core::{PeerAddr, Username};

/// Type-erased write half of a client transport.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Shared handle to a client's write half.
///
/// The mutex serializes writes, so two concurrent broadcasts never
/// interleave bytes on the same socket.
#[derive(Clone)]
pub struct SessionWriter {
    inner: Arc<Mutex<BoxedWriter>>,
}

impl SessionWriter {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Writes and flushes `payload`.
    ///
    /// The deadline covers waiting for the lock as well as the write itself,
    /// so a peer stuck behind another slow write also gives up in time.
    pub async fn send(&self, payload: &[u8], limit: Duration) -> Result<(), WriteError> {
        let result = timeout(limit, async {
            let mut writer = self.inner.lock().await;
            writer.write_all(payload).await?;
            writer.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await;

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(WriteError::Io(e.to_string())),
            Err(_) => Err(WriteError::Timeout(limit)),
        }
    }

    /// Shuts the write half down, ignoring errors.
    pub async fn shutdown(&self, limit: Duration) {
        let _ = timeout(limit, async {
            let mut writer = self.inner.lock().await;
            writer.shutdown().await
        })
        .await;
    }
}

impl fmt::Debug for SessionWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionWriter").finish_non_exhaustive()
    }
}

/// Errors from writing to a single peer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("write timed out after {0:?}")]
    Timeout(Duration),
}

/// Server-side state for one handshaked client.
#[derive(Debug, Clone)]
pub struct Session {
    /// Remote endpoint, the registry key
    pub addr: PeerAddr,

    /// Name chosen during the handshake
    pub username: Username,

    /// False once the client disconnected or became unreachable
    pub active: bool,

    /// When the handshake completed
    pub connected_at: DateTime<Utc>,

    /// When the session was marked inactive
    pub disconnected_at: Option<DateTime<Utc>>,

    /// Write half of the transport
    pub writer: SessionWriter,

    /// Cancelled to make this session's handler stop reading
    pub close_token: CancellationToken,
}

impl Session {
    /// Creates an active session.
    pub fn new(
        addr: PeerAddr,
        username: Username,
        writer: SessionWriter,
        close_token: CancellationToken,
    ) -> Self {
        Self {
            addr,
            username,
            active: true,
            connected_at: Utc::now(),
            disconnected_at: None,
            writer,
            close_token,
        }
    }

    /// Flips the liveness flag off. Returns false if already inactive.
    pub fn deactivate(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.disconnected_at = Some(Utc::now());
        true
    }

    /// Whether this session should receive a broadcast sent by `from`.
    pub fn is_recipient_for(&self, from: &PeerAddr) -> bool {
        self.active && &self.addr != from
    }
}
