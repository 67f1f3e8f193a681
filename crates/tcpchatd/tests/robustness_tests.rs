//! Robustness tests for the chat server.
//!
//! These tests poke at the edges: clients that vanish mid-handshake, rapid
//! connect/disconnect churn, odd payloads, and many simultaneous clients.
//! The server must keep serving everyone else through all of it.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.
//! The panic-free behavior of production code is checked through assertions.

use std::net::SocketAddr;
use std::time::Duration;

use tcpchat_core::ServerConfig;
use tcpchat_protocol::WELCOME_BANNER;
use tcpchatd::registry::{spawn_registry, RegistryHandle};
use tcpchatd::server::ChatServer;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Time for the server to notice a closed connection
const SETTLE_TIME: Duration = Duration::from_millis(100);

// ============================================================================
// Test Helpers
// ============================================================================

struct TestServer {
    addr: SocketAddr,
    registry: RegistryHandle,
    cancel_token: CancellationToken,
}

impl TestServer {
    async fn spawn() -> Self {
        let config = ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            ..Default::default()
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

    async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr).await.expect("connect to server");
        let (reader, writer) = stream.into_split();
        TestClient {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn join(&self, name: &str) -> TestClient {
        let mut client = self.connect().await;
        client.send_raw(format!("{name}\n").as_bytes()).await;
        assert_eq!(client.recv_line().await, format!("{WELCOME_BANNER}\n"));
        client
    }

    async fn active_count(&self) -> usize {
        self.registry
            .snapshot()
            .await
            .iter()
            .filter(|s| s.active)
            .count()
    }

    /// Polls until `expected` sessions are active or the timeout passes.
    async fn wait_active(&self, expected: usize) {
        let start = tokio::time::Instant::now();
        while start.elapsed() < RECV_TIMEOUT {
            if self.active_count().await == expected {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {expected} active sessions, have {}",
            self.active_count().await
        );
    }

    fn shutdown(self) {
        self.cancel_token.cancel();
    }
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn recv_line(&mut self) -> String {
        let mut line = String::new();
        timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a frame")
            .unwrap();
        line
    }
}

// ============================================================================
// Handshake Edge Cases
// ============================================================================

#[tokio::test]
async fn test_close_before_handshake_leaves_no_entry() {
    let server = TestServer::spawn().await;

    let client = server.connect().await;
    drop(client);
    sleep(SETTLE_TIME).await;

    assert!(server.registry.snapshot().await.is_empty());

    // Server still serving
    let _alice = server.join("alice").await;
    assert_eq!(server.active_count().await, 1);

    server.shutdown();
}

#[tokio::test]
async fn test_partial_username_then_close() {
    let server = TestServer::spawn().await;

    let mut client = server.connect().await;
    client.send_raw(b"ali").await;
    drop(client);
    sleep(SETTLE_TIME).await;

    // A username without its newline still counts once the peer hangs up
    let sessions = server.registry.snapshot().await;
    assert!(sessions.iter().all(|s| !s.active));

    let _bob = server.join("bob").await;
    server.wait_active(1).await;

    server.shutdown();
}

#[tokio::test]
async fn test_non_utf8_payload_is_relayed_lossily() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;
    alice.recv_line().await;

    alice.send_raw(b"caf\xe9\n").await;

    assert_eq!(bob.recv_line().await, "alice: caf\u{fffd}\n");

    server.shutdown();
}

#[tokio::test]
async fn test_oversized_line_is_split() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;
    alice.recv_line().await;

    let long = "x".repeat(1500);
    alice.send_raw(format!("{long}\n").as_bytes()).await;

    assert_eq!(bob.recv_line().await, format!("alice: {}\n", "x".repeat(1024)));
    assert_eq!(bob.recv_line().await, format!("alice: {}\n", "x".repeat(476)));

    server.shutdown();
}

// ============================================================================
// Churn Tests
// ============================================================================

#[tokio::test]
async fn test_rapid_connect_disconnect() {
    let server = TestServer::spawn().await;

    for _ in 0..50 {
        let client = server.connect().await;
        drop(client);
    }

    for i in 0..10 {
        let client = server.join(&format!("user{i}")).await;
        drop(client);
    }

    server.wait_active(0).await;

    // Still accepting after the churn
    let _alice = server.join("alice").await;
    server.wait_active(1).await;

    server.shutdown();
}

#[tokio::test]
async fn test_vanished_peer_does_not_affect_others() {
    let server = TestServer::spawn().await;

    let mut alice = server.join("alice").await;
    let bob = server.join("bob").await;
    assert_eq!(alice.recv_line().await, "bob: [connected]\n");
    let mut carol = server.join("carol").await;
    assert_eq!(alice.recv_line().await, "carol: [connected]\n");

    drop(bob);
    assert_eq!(alice.recv_line().await, "bob: [disconnected]\n");
    assert_eq!(carol.recv_line().await, "bob: [disconnected]\n");

    alice.send_raw(b"still here?\n").await;
    assert_eq!(carol.recv_line().await, "alice: still here?\n");

    carol.send_raw(b"yes\n").await;
    assert_eq!(alice.recv_line().await, "carol: yes\n");

    server.shutdown();
}

// ============================================================================
// Fan-out Tests
// ============================================================================

#[tokio::test]
async fn test_many_clients_all_receive() {
    const CLIENTS: usize = 10;

    let server = TestServer::spawn().await;

    let mut sender = server.join("sender").await;
    let mut receivers = Vec::new();
    for i in 0..CLIENTS {
        receivers.push(server.join(&format!("user{i}")).await);
        sender.recv_line().await;
    }
    server.wait_active(CLIENTS + 1).await;

    // Drain join notices each receiver saw from later joiners
    for (i, receiver) in receivers.iter_mut().enumerate() {
        for _ in (i + 1)..CLIENTS {
            receiver.recv_line().await;
        }
    }

    sender.send_raw(b"hello all\n").await;

    for receiver in &mut receivers {
        assert_eq!(receiver.recv_line().await, "sender: hello all\n");
    }

    server.shutdown();
}

#[tokio::test]
async fn test_concurrent_handshakes_register_everyone() {
    const CLIENTS: usize = 20;

    let server = TestServer::spawn().await;
    let addr = server.addr;

    let mut tasks = Vec::new();
    for i in 0..CLIENTS {
        tasks.push(tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.unwrap();
            let (reader, mut writer) = stream.into_split();
            writer
                .write_all(format!("user{i}\n").as_bytes())
                .await
                .unwrap();
            (BufReader::new(reader), writer)
        }));
    }

    let mut clients = Vec::new();
    for task in tasks {
        clients.push(task.await.unwrap());
    }

    server.wait_active(CLIENTS).await;
    assert_eq!(server.registry.snapshot().await.len(), CLIENTS);

    server.shutdown();
}
