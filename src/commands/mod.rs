//! Command Dispatch
//!
//! [`CommandHandler`] turns one tokenized line into one [`Reply`]. The first
//! token names the command (case-insensitive); the rest are its arguments.
//! Argument errors, type mismatches and missing keys all come back as reply
//! values, so a bad command never ends the session.
//!
//! [`Reply`]: crate::protocol::Reply

pub mod handler;

pub use handler::{is_quit, parse_member, CommandHandler};
