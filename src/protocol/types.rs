//! Line Protocol Reply Types
//!
//! Every reply is one or more `\n`-terminated text lines, meant to be read by
//! a human at a `nc`/`telnet` prompt.
//!
//! ## Reply Formats
//!
//! | Reply          | Wire form                        |
//! |----------------|----------------------------------|
//! | `Ok`           | `OK`                             |
//! | `Integer(n)`   | `42 (integer)`                   |
//! | `Size(n)`      | `(3)`                            |
//! | `Bulk(b)`      | the bytes as-is                  |
//! | `List(v)`      | `[a, b, c]`                      |
//! | `Members(v)`   | `[1, 2, 3]` then `(3)`           |
//! | `Nil`          | `(nil)`                          |
//! | `Empty`        | `(empty)`                        |
//! | `Error(msg)`   | `ERR msg` / `WRONGTYPE msg`      |

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// The line terminator written after every reply line
pub const LF: &[u8] = b"\n";

/// A reply to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Generic success
    Ok,

    /// A bare status word such as `PONG`
    Status(String),

    /// A signed integer result, suffixed with `(integer)`
    Integer(i64),

    /// A collection size, in parentheses
    Size(usize),

    /// A stored byte string, written verbatim
    Bulk(Bytes),

    /// List elements in order
    List(Vec<Bytes>),

    /// Set members followed by their count
    Members(Vec<i64>),

    /// The key does not exist
    Nil,

    /// The collection had nothing to return
    Empty,

    /// A full error line, including its `ERR`/`WRONGTYPE` prefix
    Error(String),
}

impl Reply {
    /// Creates a generic error reply (`ERR <msg>`).
    pub fn error(msg: impl fmt::Display) -> Self {
        Reply::Error(format!("ERR {}", msg))
    }

    /// The reply for an operation against a key of the wrong kind.
    pub fn wrong_type() -> Self {
        Reply::Error("WRONGTYPE Operation against a key holding the wrong kind of value".into())
    }

    /// The reply for a command called with the wrong number of arguments.
    pub fn wrong_arity(cmd: &str) -> Self {
        Reply::error(format!("wrong number of arguments for '{}' command", cmd))
    }

    pub fn pong() -> Self {
        Reply::Status("PONG".to_string())
    }

    /// Serializes the reply to bytes for sending over the wire.
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.serialize_into(&mut buf);
        buf.freeze()
    }

    /// Serializes the reply into an existing buffer.
    pub fn serialize_into(&self, buf: &mut BytesMut) {
        match self {
            Reply::Ok => buf.put_slice(b"OK"),
            Reply::Status(s) | Reply::Error(s) => buf.put_slice(s.as_bytes()),
            Reply::Integer(n) => buf.put_slice(format!("{} (integer)", n).as_bytes()),
            Reply::Size(n) => buf.put_slice(format!("({})", n).as_bytes()),
            Reply::Bulk(data) => buf.put_slice(data),
            Reply::List(values) => {
                buf.put_u8(b'[');
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        buf.put_slice(b", ");
                    }
                    buf.put_slice(value);
                }
                buf.put_u8(b']');
            }
            Reply::Members(members) => {
                let joined = members
                    .iter()
                    .map(i64::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                buf.put_slice(format!("[{}]", joined).as_bytes());
                buf.put_slice(LF);
                buf.put_slice(format!("({})", members.len()).as_bytes());
            }
            Reply::Nil => buf.put_slice(b"(nil)"),
            Reply::Empty => buf.put_slice(b"(empty)"),
        }
        buf.put_slice(LF);
    }

    /// Returns true if this reply is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.serialize();
        let text = String::from_utf8_lossy(&bytes);
        f.write_str(text.trim_end_matches('\n'))
    }
}
