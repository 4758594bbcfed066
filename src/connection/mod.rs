//! Client Sessions
//!
//! `main.rs` accepts sockets and spawns [`handle_connection`] for each one.
//! A session reads lines, runs them through its own
//! [`CommandHandler`](crate::commands::CommandHandler) against the shared
//! engine, and writes the replies back in order. Sessions never coordinate
//! with each other; the engine's shard locks are the only shared state
//! besides [`ConnectionStats`].

pub mod handler;

pub use handler::{
    handle_connection, Connection, ConnectionError, ConnectionSnapshot, ConnectionStats,
};
