//! Line Protocol Implementation
//!
//! EmberKV speaks a plain text protocol: one command per line, tokens
//! separated by spaces, and human-readable replies.
//!
//! ## Modules
//!
//! - `types`: Defines the `Reply` enum and serialization
//! - `parser`: Line framing and tokenization for incoming data
//!
//! ## Example
//!
//! ```
//! use emberkv::protocol::{parse_line, Reply};
//!
//! // Parsing incoming data
//! let (tokens, consumed) = parse_line(b"get name\n").unwrap().unwrap();
//! assert_eq!(tokens.len(), 2);
//! assert_eq!(consumed, 9);
//!
//! // Creating replies
//! assert_eq!(&Reply::Integer(7).serialize()[..], b"7 (integer)\n");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_line, LineParser, ParseError, ParseResult, MAX_LINE_LENGTH};
pub use types::Reply;
