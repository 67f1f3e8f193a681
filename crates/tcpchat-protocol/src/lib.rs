//! TCPChat Protocol - Wire format shared by server and client
//!
//! The protocol is plain text over TCP:
//! - the first line a client sends is its username
//! - every later frame is relayed to the other clients as `"<username>: <body>"`
//! - the server injects `[connected]` / `[disconnected]` notices and a
//!   one-time welcome banner

pub mod handshake;
pub mod message;

pub use handshake::{encode_client_line, parse_username, ClientInput, EXIT_COMMAND, USERNAME_PROMPT};
pub use message::{Notice, ServerFrame, WELCOME_BANNER};
