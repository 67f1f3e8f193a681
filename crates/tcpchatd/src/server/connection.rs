//! Connection handler for individual client connections.
//!
//! Each client connection gets its own `ConnectionHandler` that walks the
//! state machine `AwaitingUsername → Active → Disconnected`:
//! - reads the username line and registers the session
//! - announces the newcomer and sends it the welcome banner
//! - relays every frame it reads to the other sessions
//! - on EOF or error, marks the session inactive and announces the departure
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Connection errors end this handler only; they never reach the listener

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tcpchat_core::{DomainError, Framing, PeerAddr, ServerConfig, Username};
use tcpchat_protocol::{parse_username, Notice, ServerFrame};

use crate::broadcast::Broadcaster;
use crate::registry::{DeactivationReason, RegistryHandle};
use crate::session::{Session, SessionWriter};

/// Per-connection settings taken from the server config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub framing: Framing,
    pub max_frame_size: usize,
    pub write_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for ConnectionSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            framing: config.framing,
            max_frame_size: config.max_frame_size.max(1),
            write_timeout: config.write_timeout(),
        }
    }
}

/// How a connection handler finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The peer never completed the handshake and was never registered.
    NotRegistered,

    /// The peer was registered and its session ended for `reason`.
    Ended {
        addr: PeerAddr,
        reason: DeactivationReason,
    },
}

/// Connection handler for a single client.
pub struct ConnectionHandler<R> {
    /// Buffered read half, owned exclusively by this handler
    reader: BufReader<R>,

    /// Write half, shared with broadcasts once registered
    writer: SessionWriter,

    /// Remote endpoint of this connection
    addr: PeerAddr,

    /// Handle to the connection registry
    registry: RegistryHandle,

    /// Fan-out to other sessions
    broadcaster: Broadcaster,

    settings: ConnectionSettings,

    /// Server-wide shutdown signal
    shutdown: CancellationToken,

    /// The last line read was cut at `max_frame_size` before its newline
    line_cut: bool,
}

impl<R> ConnectionHandler<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `reader` - Read half of the client transport
    /// * `writer` - Write half of the client transport
    /// * `addr` - Remote address, used as the registry key
    /// * `registry` - Handle to the connection registry
    /// * `settings` - Framing and timeout settings
    /// * `shutdown` - Cancelled when the server stops
    pub fn new(
        reader: R,
        writer: SessionWriter,
        addr: PeerAddr,
        registry: RegistryHandle,
        settings: ConnectionSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let broadcaster = Broadcaster::new(registry.clone(), settings.write_timeout);
        Self {
            reader: BufReader::new(reader),
            writer,
            addr,
            registry,
            broadcaster,
            settings,
            shutdown,
            line_cut: false,
        }
    }

    /// Runs the connection handler to completion.
    pub async fn run(mut self) -> HandlerOutcome {
        debug!(peer = %self.addr, "New client connected");

        // AwaitingUsername
        let shutdown = self.shutdown.clone();
        let handshake = tokio::select! {
            _ = shutdown.cancelled() => return HandlerOutcome::NotRegistered,
            result = self.read_username() => result,
        };

        let username = match handshake {
            Ok(name) => name,
            Err(ConnectionError::Eof) => {
                debug!(peer = %self.addr, "Peer closed before sending a username");
                return HandlerOutcome::NotRegistered;
            }
            Err(e) => {
                warn!(peer = %self.addr, error = %e, "Handshake failed");
                return HandlerOutcome::NotRegistered;
            }
        };

        let session = Session::new(
            self.addr.clone(),
            username,
            self.writer.clone(),
            self.shutdown.child_token(),
        );

        if let Err(e) = self.registry.insert(session.clone()).await {
            warn!(peer = %self.addr, error = %e, "Failed to register session");
            return HandlerOutcome::NotRegistered;
        }

        info!(
            peer = %self.addr,
            username = %session.username,
            "Client handshake completed"
        );

        // Active
        self.broadcaster
            .broadcast(
                &ServerFrame::notice(session.username.clone(), Notice::Connected),
                &session,
            )
            .await;

        let reason = match session
            .writer
            .send(&ServerFrame::Welcome.encode(), self.settings.write_timeout)
            .await
        {
            Ok(()) => self.process_messages(&session).await,
            Err(e) => {
                warn!(peer = %self.addr, error = %e, "Failed to send welcome banner");
                DeactivationReason::WriteFailed
            }
        };

        // Disconnected
        self.finish(&session, reason).await;

        HandlerOutcome::Ended {
            addr: self.addr,
            reason,
        }
    }

    /// Reads and relays frames until the session ends.
    async fn process_messages(&mut self, session: &Session) -> DeactivationReason {
        let close = session.close_token.clone();
        let shutdown = self.shutdown.clone();

        loop {
            let frame = tokio::select! {
                _ = close.cancelled() => {
                    return if shutdown.is_cancelled() {
                        DeactivationReason::Shutdown
                    } else {
                        DeactivationReason::WriteFailed
                    };
                }
                result = self.read_frame() => result,
            };

            match frame {
                Ok(body) => {
                    debug!(peer = %self.addr, bytes = body.len(), "Received frame");
                    self.broadcaster
                        .broadcast(&ServerFrame::chat(session.username.clone(), body), session)
                        .await;
                }
                Err(ConnectionError::Eof) => {
                    debug!(peer = %self.addr, "Client sent EOF");
                    return DeactivationReason::Disconnected;
                }
                Err(e) => {
                    warn!(peer = %self.addr, error = %e, "Read failed, closing connection");
                    return DeactivationReason::ReadError;
                }
            }
        }
    }

    /// Marks the session inactive and tells the others it left.
    async fn finish(&self, session: &Session, reason: DeactivationReason) {
        // No-op if a failed broadcast already did it
        self.registry
            .mark_inactive(session.addr.clone(), reason)
            .await;

        if reason != DeactivationReason::Shutdown {
            self.broadcaster
                .broadcast(
                    &ServerFrame::notice(session.username.clone(), Notice::Disconnected),
                    session,
                )
                .await;
        }

        // The registry keeps a clone of the writer, so close it explicitly
        session.writer.shutdown(self.settings.write_timeout).await;

        info!(
            peer = %self.addr,
            username = %session.username,
            reason = %reason,
            "Client disconnected"
        );
    }

    /// Reads the handshake line.
    async fn read_username(&mut self) -> Result<Username, ConnectionError> {
        let line = self.read_line().await?;
        Ok(parse_username(&line)?)
    }

    /// Reads one frame according to the configured framing.
    async fn read_frame(&mut self) -> Result<String, ConnectionError> {
        let buf = match self.settings.framing {
            Framing::Line => {
                let mut line = self.read_line().await?;
                if line.last() == Some(&b'\n') {
                    line.pop();
                }
                // Also covers a CR left at the end of a piece cut at the cap
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                line
            }
            Framing::Chunk => loop {
                let mut chunk = vec![0u8; self.settings.max_frame_size];
                let n = self
                    .reader
                    .read(&mut chunk)
                    .await
                    .map_err(|e| ConnectionError::Io(e.to_string()))?;
                if n == 0 {
                    return Err(ConnectionError::Eof);
                }
                chunk.truncate(n);

                // Terminator of a handshake line that filled the whole cap
                if std::mem::take(&mut self.line_cut) {
                    let skip = terminator_len(&chunk);
                    chunk.drain(..skip);
                    if chunk.is_empty() {
                        continue;
                    }
                }
                break chunk;
            },
        };

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Reads up to and including the next `\n`, capped at the frame size.
    ///
    /// A line longer than the cap comes back in pieces on later calls. When a
    /// piece is cut right before its terminator, the bare `\n` or `\r\n`
    /// that follows is dropped instead of becoming an empty line.
    async fn read_line(&mut self) -> Result<Vec<u8>, ConnectionError> {
        let limit = self.settings.max_frame_size as u64;

        loop {
            let mut line = Vec::new();
            let bytes_read = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut line)
                .await
                .map_err(|e| ConnectionError::Io(e.to_string()))?;

            if bytes_read == 0 {
                return Err(ConnectionError::Eof);
            }

            let after_cut = std::mem::take(&mut self.line_cut);
            if after_cut && terminator_len(&line) == line.len() {
                continue;
            }

            self.line_cut = line.last() != Some(&b'\n') && bytes_read as u64 == limit;
            return Ok(line);
        }
    }
}

/// Length of a leading `\n` or `\r\n`, or 0.
fn terminator_len(buf: &[u8]) -> usize {
    if buf.starts_with(b"\r\n") {
        2
    } else if buf.starts_with(b"\n") {
        1
    } else {
        0
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Invalid handshake: {0}")]
    Handshake(#[from] DomainError),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed")]
    Eof,
}
