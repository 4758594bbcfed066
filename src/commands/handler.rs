//! Command Handler Module
//!
//! This module implements the EmberKV command set. It receives tokenized
//! command lines, executes them against the storage engine and returns the
//! reply to send back.
//!
//! ## Supported Commands
//!
//! Command names are case-insensitive.
//!
//! ### Scalar Commands
//! - `set key value` - Store a value (integer, text or raw encoding)
//! - `get key` - Fetch a value of any type
//! - `del key [key ...]` - Delete keys
//! - `incr key [delta]` - Add to an integer (default 1)
//! - `exists key [key ...]` - Count existing keys
//! - `type key` - Value type ("string", "list", "set" or "none")
//!
//! ### Expiry Commands
//! - `expire key milliseconds` - Set a TTL, replying with the deadline in
//!   unix milliseconds (0 clears it and replies `OK`)
//! - `ttl key` - Remaining TTL in ms (-1 without TTL, -2 if missing)
//! - `persist key` - Remove the TTL
//!
//! ### List Commands
//! - `push|rpush key value` - Append to the tail
//! - `pop|rpop key` - Remove from the tail
//! - `len|llen key` - List length
//!
//! ### Set Commands
//! - `sadd key member` - Add an integer member
//! - `sdel|srem key member` - Remove a member
//! - `slen|scard key` - Set size
//! - `sismember key member` - Membership test
//!
//! ### Server Commands
//! - `ping [message]`, `dbsize`, `info`, `flushdb`, `quit`
//!
//! ## Set Members
//!
//! Members are parsed as base-10 `i64`. Anything else of at most 8 bytes is
//! read as a big-endian integer, left-padded with zero bytes, so `sadd k ab`
//! stores `0x6162`. Longer members are rejected.

use crate::protocol::Reply;
use crate::storage::{Snapshot, StorageEngine, StorageError, StorageResult};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// Handles commands by dispatching them to the storage engine.
#[derive(Clone)]
pub struct CommandHandler {
    /// The storage engine
    storage: Arc<StorageEngine>,
    /// Server start time for the info command
    start_time: Instant,
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self {
            storage,
            start_time: Instant::now(),
        }
    }

    /// Executes a command and returns the reply.
    ///
    /// # Arguments
    ///
    /// * `command` - The tokens of one command line, name first
    pub fn execute(&self, command: &[Bytes]) -> Reply {
        let Some((name, args)) = command.split_first() else {
            return Reply::error("empty command");
        };

        let cmd = match std::str::from_utf8(name) {
            Ok(s) => s.to_ascii_lowercase(),
            Err(_) => return Reply::error("invalid command name"),
        };

        trace!(command = %cmd, args = args.len(), "Dispatching command");
        self.dispatch(&cmd, args)
    }

    /// Dispatches a command to its handler.
    fn dispatch(&self, cmd: &str, args: &[Bytes]) -> Reply {
        match cmd {
            // Scalar commands
            "set" => self.cmd_set(args),
            "get" => self.cmd_get(args),
            "del" => self.cmd_del(args),
            "incr" => self.cmd_incr(args),
            "exists" => self.cmd_exists(args),
            "type" => self.cmd_type(args),

            // Expiry commands
            "expire" => self.cmd_expire(args),
            "ttl" => self.cmd_ttl(args),
            "persist" => self.cmd_persist(args),

            // List commands
            "push" | "rpush" => self.cmd_push(cmd, args),
            "pop" | "rpop" => self.cmd_pop(cmd, args),
            "len" | "llen" => self.cmd_len(cmd, args),

            // Set commands
            "sadd" => self.cmd_sadd(args),
            "sdel" | "srem" => self.cmd_srem(cmd, args),
            "slen" | "scard" => self.cmd_scard(cmd, args),
            "sismember" => self.cmd_sismember(args),

            // Server commands
            "ping" => self.cmd_ping(args),
            "dbsize" => Reply::Integer(self.storage.len() as i64),
            "info" => self.cmd_info(),
            "flushdb" => {
                self.storage.flush();
                Reply::Ok
            }
            "quit" => Reply::Ok,

            _ => Reply::error(format!("unknown command '{}'", cmd)),
        }
    }

    // ========================================================================
    // Scalar Commands
    // ========================================================================

    /// set key value
    fn cmd_set(&self, args: &[Bytes]) -> Reply {
        let [key, value] = args else {
            return Reply::wrong_arity("set");
        };
        self.storage.set(key.clone(), value);
        Reply::Ok
    }

    /// get key
    fn cmd_get(&self, args: &[Bytes]) -> Reply {
        let [key] = args else {
            return Reply::wrong_arity("get");
        };

        match self.storage.get(key) {
            Ok(Snapshot::Raw(data)) | Ok(Snapshot::Text(data)) => Reply::Bulk(data),
            Ok(Snapshot::Integer(n)) => Reply::Integer(n),
            Ok(Snapshot::List(values)) => Reply::List(values),
            Ok(Snapshot::Set { members, .. }) => Reply::Members(members),
            Err(StorageError::NotFound) => Reply::Nil,
            Err(e) => storage_error(e),
        }
    }

    /// del key [key ...]
    fn cmd_del(&self, args: &[Bytes]) -> Reply {
        if args.is_empty() {
            return Reply::wrong_arity("del");
        }
        let deleted = args.iter().filter(|key| self.storage.delete(key)).count();
        Reply::Integer(deleted as i64)
    }

    /// incr key [delta]
    fn cmd_incr(&self, args: &[Bytes]) -> Reply {
        let (key, delta) = match args {
            [key] => (key, 1),
            [key, delta] => match parse_i64(delta) {
                Some(delta) => (key, delta),
                None => return Reply::error("value is not an integer or out of range"),
            },
            _ => return Reply::wrong_arity("incr"),
        };

        match self.storage.incr(key, delta) {
            Ok(n) => Reply::Integer(n),
            Err(e) => storage_error(e),
        }
    }

    /// exists key [key ...]
    fn cmd_exists(&self, args: &[Bytes]) -> Reply {
        if args.is_empty() {
            return Reply::wrong_arity("exists");
        }
        let count = args.iter().filter(|key| self.storage.exists(key)).count();
        Reply::Integer(count as i64)
    }

    /// type key
    fn cmd_type(&self, args: &[Bytes]) -> Reply {
        let [key] = args else {
            return Reply::wrong_arity("type");
        };
        match self.storage.key_type(key) {
            Ok(name) => Reply::Status(name.to_string()),
            Err(_) => Reply::Status("none".to_string()),
        }
    }

    // ========================================================================
    // Expiry Commands
    // ========================================================================

    /// expire key milliseconds
    fn cmd_expire(&self, args: &[Bytes]) -> Reply {
        let [key, ttl] = args else {
            return Reply::wrong_arity("expire");
        };

        let ttl_ms = match parse_i64(ttl) {
            Some(ms) if ms >= 0 => ms as u64,
            Some(_) => return storage_error(StorageError::invalid_argument("invalid expire time")),
            None => return Reply::error("value is not an integer or out of range"),
        };

        match self.storage.expire(key, ttl_ms) {
            Ok(Some(deadline)) => Reply::Integer(deadline as i64),
            Ok(None) => Reply::Ok,
            Err(e) => storage_error(e),
        }
    }

    /// ttl key
    fn cmd_ttl(&self, args: &[Bytes]) -> Reply {
        let [key] = args else {
            return Reply::wrong_arity("ttl");
        };

        match self.storage.ttl(key) {
            Ok(Some(ms)) => Reply::Integer(ms as i64),
            Ok(None) => Reply::Integer(-1),
            Err(_) => Reply::Integer(-2),
        }
    }

    /// persist key
    fn cmd_persist(&self, args: &[Bytes]) -> Reply {
        let [key] = args else {
            return Reply::wrong_arity("persist");
        };

        match self.storage.clear_expiry(key) {
            Ok(true) => Reply::Integer(1),
            Ok(false) | Err(_) => Reply::Integer(0),
        }
    }

    // ========================================================================
    // List Commands
    // ========================================================================

    /// push key value
    fn cmd_push(&self, cmd: &str, args: &[Bytes]) -> Reply {
        let [key, value] = args else {
            return Reply::wrong_arity(cmd);
        };
        match self.storage.push(key.clone(), value) {
            Ok(len) => Reply::Size(len),
            Err(e) => storage_error(e),
        }
    }

    /// pop key
    fn cmd_pop(&self, cmd: &str, args: &[Bytes]) -> Reply {
        let [key] = args else {
            return Reply::wrong_arity(cmd);
        };
        match self.storage.pop(key) {
            Ok(Some(value)) => Reply::Bulk(value),
            Ok(None) => Reply::Empty,
            Err(StorageError::NotFound) => Reply::Nil,
            Err(e) => storage_error(e),
        }
    }

    /// len key
    fn cmd_len(&self, cmd: &str, args: &[Bytes]) -> Reply {
        let [key] = args else {
            return Reply::wrong_arity(cmd);
        };
        size_reply(self.storage.list_len(key))
    }

    // ========================================================================
    // Set Commands
    // ========================================================================

    /// sadd key member
    fn cmd_sadd(&self, args: &[Bytes]) -> Reply {
        let [key, member] = args else {
            return Reply::wrong_arity("sadd");
        };
        size_reply(parse_member(member).and_then(|m| self.storage.sadd(key.clone(), m)))
    }

    /// sdel key member
    fn cmd_srem(&self, cmd: &str, args: &[Bytes]) -> Reply {
        let [key, member] = args else {
            return Reply::wrong_arity(cmd);
        };
        size_reply(parse_member(member).and_then(|m| self.storage.srem(key, m)))
    }

    /// slen key
    fn cmd_scard(&self, cmd: &str, args: &[Bytes]) -> Reply {
        let [key] = args else {
            return Reply::wrong_arity(cmd);
        };
        size_reply(self.storage.scard(key))
    }

    /// sismember key member
    fn cmd_sismember(&self, args: &[Bytes]) -> Reply {
        let [key, member] = args else {
            return Reply::wrong_arity("sismember");
        };
        match parse_member(member).and_then(|m| self.storage.sismember(key, m)) {
            Ok(found) => Reply::Integer(found as i64),
            Err(e) => storage_error(e),
        }
    }

    // ========================================================================
    // Server Commands
    // ========================================================================

    /// ping [message]
    fn cmd_ping(&self, args: &[Bytes]) -> Reply {
        match args {
            [] => Reply::pong(),
            [message] => Reply::Bulk(message.clone()),
            _ => Reply::wrong_arity("ping"),
        }
    }

    /// info
    fn cmd_info(&self) -> Reply {
        let stats = self.storage.stats();
        let mem = self.storage.memory_info();
        let uptime = self.start_time.elapsed().as_secs();

        let info = format!(
            "# Server\n\
             emberkv_version:{}\n\
             os:{}\n\
             uptime_in_seconds:{}\n\
             shards:{}\n\
             \n\
             # Keyspace\n\
             keys:{}\n\
             \n\
             # Memory\n\
             off_heap_used:{}\n\
             off_heap_regions:{}\n\
             peak_off_heap_used:{}\n\
             max_off_heap_size:{}\n\
             eviction_policy:{}\n\
             \n\
             # Operations\n\
             get_ops:{}\n\
             set_ops:{}\n\
             del_ops:{}\n\
             expired_keys:{}\n\
             evicted_keys:{}",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            uptime,
            self.storage.shard_count(),
            stats.keys,
            mem.off_heap_used,
            mem.regions,
            mem.peak_off_heap_used,
            mem.max_off_heap_size,
            self.storage.eviction_config().policy,
            stats.get_ops,
            stats.set_ops,
            stats.del_ops,
            stats.expired,
            stats.evicted,
        );

        Reply::Bulk(Bytes::from(info))
    }
}

/// Returns true if the command asks the server to close the connection.
pub fn is_quit(command: &[Bytes]) -> bool {
    command
        .first()
        .is_some_and(|name| name.eq_ignore_ascii_case(b"quit"))
}

/// Maps an engine error to its reply.
fn storage_error(err: StorageError) -> Reply {
    match err {
        StorageError::NotFound => Reply::error("no such key"),
        StorageError::WrongType => Reply::wrong_type(),
        StorageError::InvalidArgument(msg) => Reply::error(msg),
    }
}

fn size_reply(result: StorageResult<usize>) -> Reply {
    match result {
        Ok(n) => Reply::Size(n),
        Err(e) => storage_error(e),
    }
}

fn parse_i64(token: &[u8]) -> Option<i64> {
    std::str::from_utf8(token).ok()?.parse().ok()
}

/// Parses a set member.
///
/// Base-10 integers are taken as-is; other tokens of up to 8 bytes are read
/// as big-endian integers padded with leading zero bytes.
pub fn parse_member(token: &[u8]) -> StorageResult<i64> {
    if let Some(n) = parse_i64(token) {
        return Ok(n);
    }
    if token.len() > 8 {
        return Err(StorageError::invalid_argument(format!(
            "set member longer than 8 bytes ({} bytes)",
            token.len()
        )));
    }

    let mut buf = [0u8; 8];
    buf[8 - token.len()..].copy_from_slice(token);
    Ok(i64::from_be_bytes(buf))
}
