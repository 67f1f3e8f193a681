//! Server connection and terminal relay for the chat client.
//!
//! This module provides the `ChatClient` which handles:
//! - Connection to the server over TCP
//! - The username prompt and handshake line
//! - Relaying input lines out and server frames back until either side ends
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use tcpchat_core::ClientConfig;
use tcpchat_protocol::{encode_client_line, ClientInput, USERNAME_PROMPT};

use crate::error::{ClientError, Result};

/// How long background tasks get to finish once the relay has ended
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// Why the relay stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The user typed the exit sentinel.
    UserExit,

    /// Input reached end of file.
    InputClosed,

    /// The server closed the connection or stopped accepting writes.
    ServerClosed,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserExit => write!(f, "user exit"),
            Self::InputClosed => write!(f, "input closed"),
            Self::ServerClosed => write!(f, "server closed the connection"),
        }
    }
}

/// Client for a chat server.
///
/// # Example
///
/// ```rust,ignore
/// use tcpchat_client::ChatClient;
/// use tcpchat_core::ClientConfig;
/// use tokio::io::BufReader;
///
/// let client = ChatClient::new(ClientConfig::default());
/// let reason = client
///     .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
///     .await?;
/// ```
pub struct ChatClient {
    config: ClientConfig,
}

impl ChatClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Address this client dials.
    pub fn addr(&self) -> &str {
        &self.config.addr
    }

    /// Connects and relays between the terminal streams and the server.
    ///
    /// # Errors
    ///
    /// - `ClientError::Connect` if the server is unreachable
    /// - `ClientError::Io` if reading input or writing output fails
    pub async fn run<I, O>(&self, input: I, output: O) -> Result<ExitReason>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin + Send + 'static,
    {
        let stream = TcpStream::connect(&self.config.addr)
            .await
            .map_err(|e| ClientError::Connect {
                addr: self.config.addr.clone(),
                error: e.to_string(),
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }

        info!(addr = %self.config.addr, "Connected to chat server");

        let reason = relay(stream, input, output).await?;
        info!(reason = %reason, "Chat session ended");
        Ok(reason)
    }

    /// Runs the client on a runtime of its own and returns when the relay ends.
    ///
    /// A read from `tokio::io::stdin()` parks a blocking-pool thread that
    /// cannot be cancelled. The runtime is therefore shut down without
    /// waiting for it, so the process can exit while the terminal is idle.
    pub fn run_blocking<I, O>(&self, input: I, output: O) -> Result<ExitReason>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin + Send + 'static,
    {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;

        let result = runtime.block_on(self.run(input, output));
        runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
        result
    }
}

/// Runs the prompt, handshake and two-way relay over `stream`.
///
/// Server frames are copied to `output` on their own task, so incoming chat
/// keeps flowing while the user is typing.
pub async fn relay<S, I, O>(stream: S, input: I, mut output: O) -> Result<ExitReason>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin + Send + 'static,
{
    let (mut socket_rx, mut socket_tx) = tokio::io::split(stream);
    let mut lines = input.lines();

    output.write_all(USERNAME_PROMPT.as_bytes()).await?;
    output.flush().await?;

    let Some(username) = lines.next_line().await? else {
        debug!("Input closed before a username was entered");
        return Ok(ExitReason::InputClosed);
    };

    if let Err(e) = send_line(&mut socket_tx, &username).await {
        warn!(error = %e, "Failed to send username");
        return Ok(ExitReason::ServerClosed);
    }

    let mut inbound = tokio::spawn(async move {
        let copied = tokio::io::copy(&mut socket_rx, &mut output).await;
        let _ = output.flush().await;
        copied
    });

    let reason = loop {
        tokio::select! {
            joined = &mut inbound => {
                match joined {
                    Ok(Ok(bytes)) => debug!(bytes, "Server closed the connection"),
                    Ok(Err(e)) => warn!(error = %e, "Lost connection to server"),
                    Err(e) => warn!(error = %e, "Inbound relay task failed"),
                }
                return Ok(ExitReason::ServerClosed);
            }

            next = lines.next_line() => {
                let Some(line) = next? else {
                    break ExitReason::InputClosed;
                };

                match ClientInput::parse(&line) {
                    ClientInput::Exit => break ExitReason::UserExit,
                    ClientInput::Message(text) => {
                        if let Err(e) = send_line(&mut socket_tx, &text).await {
                            warn!(error = %e, "Failed to send message");
                            break ExitReason::ServerClosed;
                        }
                    }
                }
            }
        }
    };

    let _ = socket_tx.shutdown().await;
    inbound.abort();
    Ok(reason)
}

async fn send_line<W>(socket: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    socket.write_all(encode_client_line(line).as_bytes()).await?;
    socket.flush().await
}
