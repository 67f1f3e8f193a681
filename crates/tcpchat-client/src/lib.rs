//! TCPChat Client - terminal relay for the chat server
//!
//! The client connects to a server, asks the user for a username, then runs
//! two flows side by side until one of them ends:
//!
//! 1. **Input → socket**: each line typed is sent to the server, until the
//!    `!exit` sentinel or end of input
//! 2. **Socket → output**: everything the server sends is copied verbatim
//!
//! The relay is generic over its transport and terminal streams, so tests
//! drive it with in-memory pipes.

pub mod client;
pub mod error;

// Re-export commonly used types
pub use client::{relay, ChatClient, ExitReason};
pub use error::{ClientError, Result};
