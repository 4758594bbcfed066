//! # EmberKV - An Off-Heap Key-Value Store
//!
//! EmberKV is a small Redis-like key-value server written in Rust. Scalar
//! values live in memory regions mapped straight from the OS rather than on
//! the process heap, and small sets and lists use compact encodings.
//!
//! The server speaks a plain-text line protocol (`set k v`, `get k`,
//! `push list x`, `sadd ids 7`, ...) that can be typed straight into `nc`.
//! Keys may carry a TTL, and a `volatile-random` eviction policy keeps
//! off-heap usage under a configurable budget.
//!
//! ## Layers
//!
//! ```text
//!  TcpListener (main.rs)
//!      │ one task per client
//!      ▼
//!  connection::Connection ── protocol::LineParser / protocol::Reply
//!      │
//!      ▼
//!  commands::CommandHandler
//!      │
//!      ▼
//!  storage::StorageEngine ──── Evictor (after each write)
//!      │   N shards, each Mutex<values + expires>
//!      │                 ▲
//!      ▼                 └── ExpirySweeper (periodic task)
//!  Allocator ── Region (anonymous mmap, freed on drop)
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use emberkv::storage::{StorageEngine, start_expiry_sweeper};
//! use emberkv::commands::CommandHandler;
//! use emberkv::connection::{handle_connection, ConnectionStats};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let storage = Arc::new(StorageEngine::new());
//!     let _sweeper = start_expiry_sweeper(Arc::clone(&storage));
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind(("127.0.0.1", emberkv::DEFAULT_PORT)).await?;
//!     while let Ok((stream, peer)) = listener.accept().await {
//!         let commands = CommandHandler::new(Arc::clone(&storage));
//!         tokio::spawn(handle_connection(stream, peer, commands, Arc::clone(&stats)));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: off-heap regions, value encodings, the sharded key space
//! - [`protocol`]: line framing and reply text
//! - [`commands`]: token vectors to engine calls
//! - [`connection`]: per-client sessions

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod storage;

pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionSnapshot, ConnectionStats};
pub use protocol::{LineParser, ParseError, Reply};
pub use storage::{
    start_expiry_sweeper, EngineConfig, EvictionConfig, EvictionPolicy, ExpiryConfig,
    ExpirySweeper, StorageEngine,
};

/// The default port EmberKV listens on
pub const DEFAULT_PORT: u16 = 9000;

/// The default host EmberKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of EmberKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
