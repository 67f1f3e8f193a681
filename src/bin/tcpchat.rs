//! TCPChat - line-oriented TCP chat server and terminal client
//!
//! One binary, two modes: `server` runs the broadcast server in the
//! foreground, `client` connects to one and relays the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Start a server on the default address (0.0.0.0:8333)
//! tcpchat server
//!
//! # Start a server elsewhere
//! tcpchat server --addr 127.0.0.1:9000
//!
//! # Join a chat
//! tcpchat client --addr 127.0.0.1:9000
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tcpchat_client::ChatClient;
use tcpchat_core::ConfigFile;
use tcpchatd::registry::{spawn_registry_with, RegistryConfig};
use tcpchatd::server::ChatServer;

/// TCPChat - minimal multi-user chat over plain TCP
#[derive(Parser, Debug)]
#[command(name = "tcpchat", version, about)]
struct Args {
    /// Which side to run
    #[arg(value_enum)]
    mode: Mode,

    /// Config file (defaults to the user config dir, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on or connect to, overriding config and environment
    #[arg(short, long)]
    addr: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// Run the chat server
    Server,
    /// Connect to a chat server
    Client,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ConfigFile::load(args.config.as_deref()).context("Failed to load config")?;
    if let Some(addr) = args.addr {
        config.server.addr = addr.clone();
        config.client.addr = addr;
    }

    match args.mode {
        Mode::Server => run_server(config),
        Mode::Client => run_client(config),
    }
}

#[tokio::main]
async fn run_server(config: ConfigFile) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tcpchatd=info".parse()?)
                .add_directive("tcpchat_core=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "TCPChat server starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let registry = spawn_registry_with(RegistryConfig::from(&config.server));
    info!("Connection registry started");

    let server = ChatServer::bind(&config.server, registry, cancel_token)
        .await
        .context("Failed to start server")?;

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("TCPChat server stopped");
    Ok(())
}

fn run_client(config: ConfigFile) -> Result<()> {
    // Chat output owns stdout; logs go to stderr and stay quiet by default
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let client = ChatClient::new(config.client);

    // Owns its runtime so a pending stdin read cannot keep the process alive
    client
        .run_blocking(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .with_context(|| format!("Chat session with {} failed", client.addr()))?;

    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
