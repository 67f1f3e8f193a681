//! Client side of the wire format: the username handshake and typed input.

use tcpchat_core::{DomainResult, Username};

/// Prompt shown before the client reads a username.
pub const USERNAME_PROMPT: &str = "Please enter your username > ";

/// Typed line that makes the client leave.
pub const EXIT_COMMAND: &str = "!exit";

/// Parses the first bytes a client sent as its username.
///
/// Non-UTF-8 bytes are replaced rather than rejected.
pub fn parse_username(raw: &[u8]) -> DomainResult<Username> {
    Username::from_handshake_line(&String::from_utf8_lossy(raw))
}

/// Terminates a line typed by the user for sending.
pub fn encode_client_line(line: &str) -> String {
    format!("{}\n", line.trim_end_matches(['\r', '\n']))
}

/// A line read from the user's terminal after the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientInput {
    /// The exit sentinel
    Exit,

    /// Anything else, to be sent to the server
    Message(String),
}

impl ClientInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        if line == EXIT_COMMAND {
            Self::Exit
        } else {
            Self::Message(line.to_string())
        }
    }
}
