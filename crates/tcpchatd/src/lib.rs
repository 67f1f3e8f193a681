//! TCPChat Server - Connection registry and broadcast loop
//!
//! This crate provides the core infrastructure for the chat server:
//! - `registry` - Actor owning the address → session map
//! - `session` - Per-connection state and the shared writer
//! - `broadcast` - Fan-out of one frame to every other active session
//! - `server` - TCP listener and per-connection handlers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      tcpchat server                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   ChatServer    │     │     RegistryActor           │   │
//! │  │  (TcpListener)  │     │  (session state owner)      │   │
//! │  └────────┬────────┘     └──────────────▲──────────────┘   │
//! │           │                             │                   │
//! │           │ spawn per connection        │ insert/snapshot   │
//! │           ▼                             │                   │
//! │  ┌─────────────────┐     ┌──────────────┴──────────────┐   │
//! │  │ConnectionHandler│────▶│        Broadcaster          │   │
//! │  │  (per client)   │     │  (per-peer write tasks)     │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod broadcast;
pub mod registry;
pub mod server;
pub mod session;
