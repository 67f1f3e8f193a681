//! TCP listener for the chat server.
//!
//! The server:
//! - Listens on a TCP address for client connections
//! - Spawns a ConnectionHandler for each client without waiting on it
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ChatServer    │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RegistryHandle │
//! │   (per client)  │     │                 │
//! └─────────────────┘     └─────────────────┘
//!         │
//!         │ Broadcaster
//!         ▼
//! ┌─────────────────┐
//! │  other clients  │
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Only bind and accept failures end the server

mod connection;

pub use connection::{ConnectionError, ConnectionHandler, ConnectionSettings, HandlerOutcome};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use tcpchat_core::{PeerAddr, ServerConfig};

use crate::registry::RegistryHandle;
use crate::session::SessionWriter;

/// TCP chat server.
///
/// Owns the bound listener; every accepted connection runs in its own task.
pub struct ChatServer {
    /// Bound listener
    listener: TcpListener,

    /// Address actually bound (resolves port 0)
    local_addr: SocketAddr,

    /// Handle to the connection registry
    registry: RegistryHandle,

    /// Settings handed to every connection handler
    settings: ConnectionSettings,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Number of connections accepted so far
    connection_counter: AtomicU64,
}

impl ChatServer {
    /// Binds the listener.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration (address, framing, timeouts)
    /// * `registry` - Handle to the connection registry
    /// * `cancel_token` - Token for graceful shutdown
    ///
    /// # Errors
    ///
    /// - `ServerError::Bind` if the address cannot be bound
    pub async fn bind(
        config: &ServerConfig,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let bind_error = |e: std::io::Error| ServerError::Bind {
            addr: config.addr.clone(),
            error: e.to_string(),
        };

        let listener = TcpListener::bind(&config.addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        Ok(Self {
            listener,
            local_addr,
            registry,
            settings: ConnectionSettings::from(config),
            cancel_token,
            connection_counter: AtomicU64::new(0),
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the number of connections accepted so far.
    pub fn connections_accepted(&self) -> u64 {
        self.connection_counter.load(Ordering::Relaxed)
    }

    /// Runs the accept loop.
    ///
    /// Accepts connections until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// - `ServerError::Accept` if accepting fails; the loop does not retry
    pub async fn run(&self) -> Result<(), ServerError> {
        info!(addr = %self.local_addr, "Chat server listening");

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, remote)) => {
                            self.handle_connection(stream, remote);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            return Err(ServerError::Accept(e.to_string()));
                        }
                    }
                }
            }
        }

        info!(
            accepted = self.connections_accepted(),
            "Chat server stopped"
        );
        Ok(())
    }

    /// Spawns a handler task for a new connection.
    fn handle_connection(&self, stream: TcpStream, remote: SocketAddr) {
        let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %remote, error = %e, "Failed to set TCP_NODELAY");
        }

        let (reader, writer) = stream.into_split();
        let handler = ConnectionHandler::new(
            reader,
            SessionWriter::new(writer),
            PeerAddr::from(remote),
            self.registry.clone(),
            self.settings,
            self.cancel_token.child_token(),
        );

        debug!(peer = %remote, connection = conn_num, "Accepted connection");

        tokio::spawn(async move {
            let outcome = handler.run().await;
            debug!(connection = conn_num, outcome = ?outcome, "Connection handler finished");
        });
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: String, error: String },

    #[error("Failed to accept connection: {0}")]
    Accept(String),
}
