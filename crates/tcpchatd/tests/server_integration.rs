//! Integration tests for the TCP chat server.
//!
//! These tests run a ChatServer on an ephemeral loopback port and talk to it
//! over real sockets: handshake, relay, join/leave notices, and shutdown.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.
//! The panic-free behavior of production code is checked through assertions.

use std::net::SocketAddr;
use std::time::Duration;

use tcpchat_core::{Framing, ServerConfig};
use tcpchat_protocol::WELCOME_BANNER;
use tcpchatd::registry::{spawn_registry, RegistryHandle};
use tcpchatd::server::ChatServer;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

/// Maximum time to wait for a frame that should arrive
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to wait before concluding nothing will arrive
const SILENCE_WINDOW: Duration = Duration::from_millis(150);

/// Grace period for server shutdown
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_millis(100);

// ============================================================================
// Test Helpers
// ============================================================================

/// Test server context that manages server lifecycle.
struct TestServer {
    addr: SocketAddr,
    registry: RegistryHandle,
    cancel_token: CancellationToken,
}

impl TestServer {
    /// Spawns a server with default settings on an ephemeral port.
    async fn spawn() -> Self {
        Self::spawn_with(ServerConfig::default()).await
    }

    /// Spawns a server with custom settings; the address is always overridden.
    async fn spawn_with(config: ServerConfig) -> Self {
        let config = ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            ..config
        };
        let registry = spawn_registry();
        let cancel_token = CancellationToken::new();

        let server = ChatServer::bind(&config, registry.clone(), cancel_token.clone())
            .await
            .expect("bind test server");
        let addr = server.local_addr();

        tokio::spawn(async move {
            let _ = server.run().await;
        });

        Self {
            addr,
            registry,
            cancel_token,
        }
    }

    /// Opens a raw connection without performing the handshake.
    async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr).await.expect("connect to server");
        TestClient::new(stream)
    }

    /// Connects and completes the handshake as `name`.
    async fn join(&self, name: &str) -> TestClient {
        let mut client = self.connect().await;
        client.send_line(name).await;
        assert_eq!(client.recv_line().await, format!("{WELCOME_BANNER}\n"));
        client
    }

    /// Shuts down the server gracefully.
    async fn shutdown(self) {
        self.cancel_token.cancel();
        sleep(SHUTDOWN_GRACE_PERIOD).await;
    }
}

/// Test client connection with line helpers.
struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Sends `text` followed by a newline.
    async fn send_line(&mut self, text: &str) {
        self.send_raw(format!("{text}\n").as_bytes()).await;
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Receives one newline-terminated frame.
    async fn recv_line(&mut self) -> String {
        let mut line = String::new();
        timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a frame")
            .unwrap();
        line
    }

    /// Asserts that nothing arrives within the silence window.
    async fn expect_silence(&mut self) {
        let mut buf = [0u8; 64];
        match timeout(SILENCE_WINDOW, self.reader.read(&mut buf)).await {
            Err(_) => {}
            Ok(Ok(n)) => panic!(
                "expected silence, got {:?}",
                String::from_utf8_lossy(&buf[..n])
            ),
            Ok(Err(e)) => panic!("expected silence, got error {e}"),
        }
    }

    /// Returns true once the server has closed this connection.
    async fn is_closed_by_server(&mut self) -> bool {
        let mut buf = [0u8; 64];
        matches!(
            timeout(RECV_TIMEOUT, self.reader.read(&mut buf)).await,
            Ok(Ok(0)) | Ok(Err(_))
        )
    }
}

// ============================================================================
// Connection Tests
// ============================================================================

#[tokio::test]
async fn test_server_accepts_connection() {
    let server = TestServer::spawn().await;

    let _client = server.connect().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_handshake_sends_welcome_banner() {
    let server = TestServer::spawn().await;

    let mut client = server.connect().await;
    client.send_line("alice").await;

    assert_eq!(
        client.recv_line().await,
        "#### Welcome to TCPChat! ####\n"
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_handshake_registers_session() {
    let server = TestServer::spawn().await;

    let _alice = server.join("alice").await;

    let sessions = server.registry.snapshot().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].username.as_str(), "alice");
    assert!(sessions[0].active);

    server.shutdown().await;
}

#[tokio::test]
async fn test_handshake_strips_crlf() {
    let server = TestServer::spawn().await;

    let mut client = server.connect().await;
    client.send_raw(b"alice\r\n").await;
    client.recv_line().await;

    let sessions = server.registry.snapshot().await;
    assert_eq!(sessions[0].username.as_str(), "alice");

    server.shutdown().await;
}

#[tokio::test]
async fn test_empty_username_is_rejected() {
    let server = TestServer::spawn().await;

    let mut client = server.connect().await;
    client.send_line("").await;

    assert!(client.is_closed_by_server().await);
    assert!(server.registry.snapshot().await.is_empty());

    server.shutdown().await;
}

// ============================================================================
// Relay Tests
// ============================================================================

#[tokio::test]
async fn test_message_relayed_to_other_client_only() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;
    assert_eq!(alice.recv_line().await, "bob: [connected]\n");

    alice.send_line("hello").await;

    assert_eq!(bob.recv_line().await, "alice: hello\n");
    alice.expect_silence().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_connect_notice_not_sent_to_newcomer() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;

    assert_eq!(alice.recv_line().await, "bob: [connected]\n");
    bob.expect_silence().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_notice_on_eof() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("alice").await;
    let bob = server.join("bob").await;
    assert_eq!(alice.recv_line().await, "bob: [connected]\n");

    drop(bob);

    assert_eq!(alice.recv_line().await, "bob: [disconnected]\n");

    server.shutdown().await;
}

#[tokio::test]
async fn test_disconnected_session_stays_registered_inactive() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("alice").await;
    let bob = server.join("bob").await;
    alice.recv_line().await;

    drop(bob);
    alice.recv_line().await;

    let sessions = server.registry.snapshot().await;
    assert_eq!(sessions.len(), 2);
    let bob_entry = sessions
        .iter()
        .find(|s| s.username.as_str() == "bob")
        .expect("bob still registered");
    assert!(!bob_entry.active);
    assert!(bob_entry.disconnected_at.is_some());

    server.shutdown().await;
}

#[tokio::test]
async fn test_messages_keep_per_sender_order() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;
    alice.recv_line().await;

    for i in 0..10 {
        alice.send_line(&format!("msg {i}")).await;
    }

    for i in 0..10 {
        assert_eq!(bob.recv_line().await, format!("alice: msg {i}\n"));
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_chunk_framing_relays_raw_bytes() {
    let server = TestServer::spawn_with(ServerConfig {
        framing: Framing::Chunk,
        ..Default::default()
    })
    .await;

    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;
    alice.recv_line().await;

    alice.send_raw(b"hello\n").await;

    // Body already ends in a newline, so no second one is added
    assert_eq!(bob.recv_line().await, "alice: hello\n");

    server.shutdown().await;
}

// ============================================================================
// Shutdown Tests
// ============================================================================

#[tokio::test]
async fn test_shutdown_closes_connections() {
    let server = TestServer::spawn().await;
    let mut alice = server.join("alice").await;
    let registry = server.registry.clone();

    server.shutdown().await;

    assert!(alice.is_closed_by_server().await);
    let sessions = registry.snapshot().await;
    assert!(sessions.iter().all(|s| !s.active));
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let server = TestServer::spawn().await;
    let addr = server.addr;

    server.shutdown().await;

    // The listener is dropped with the server task
    let result = timeout(RECV_TIMEOUT, TcpStream::connect(addr)).await;
    assert!(matches!(result, Ok(Err(_))));
}
