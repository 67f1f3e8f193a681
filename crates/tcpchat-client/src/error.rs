//! Error types for the chat client.

use thiserror::Error;

/// Chat client errors.
///
/// A server closing the connection is not an error; it ends the relay with
/// `ExitReason::ServerClosed` instead.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Failed to connect to the server.
    ///
    /// Usually means no server is listening at `addr`.
    #[error("Failed to connect to {addr}: {error}")]
    Connect { addr: String, error: String },

    /// Reading the terminal or writing to the server failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
