//! Frames the server writes to clients.

use std::fmt;

use tcpchat_core::Username;

/// Banner sent once to a freshly registered client.
pub const WELCOME_BANNER: &str = "#### Welcome to TCPChat! ####";

/// Synthetic membership notices injected by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// A client completed its handshake
    Connected,

    /// A registered client went away
    Disconnected,
}

impl Notice {
    /// Literal body relayed to other clients.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "[connected]",
            Self::Disconnected => "[disconnected]",
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of output from the server to one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    /// The welcome banner, for the new client only
    Welcome,

    /// A message relayed from another client
    Chat { from: Username, body: String },

    /// A membership change of another client
    Notice { from: Username, notice: Notice },
}

impl ServerFrame {
    pub fn chat(from: Username, body: impl Into<String>) -> Self {
        Self::Chat {
            from,
            body: body.into(),
        }
    }

    pub fn notice(from: Username, notice: Notice) -> Self {
        Self::Notice { from, notice }
    }

    /// Encodes the frame for the wire.
    ///
    /// Every frame ends in exactly one `\n` unless the body already ended
    /// in one, so terminal clients can print frames as they arrive.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.to_string();
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.into_bytes()
    }
}

impl fmt::Display for ServerFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Welcome => f.write_str(WELCOME_BANNER),
            Self::Chat { from, body } => write!(f, "{from}: {body}"),
            Self::Notice { from, notice } => write!(f, "{from}: {notice}"),
        }
    }
}
