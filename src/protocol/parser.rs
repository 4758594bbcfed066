//! Line Protocol Parser
//!
//! A command is a single line of space-separated tokens:
//!
//! ```text
//! set name Ariz\n
//! sadd ids 42\r\n
//! ```
//!
//! The parser works on a byte buffer that may hold a partial line, one line,
//! or several pipelined lines. It returns either:
//! - `Ok(Some((tokens, consumed)))` - a full line was parsed, `consumed` bytes were used
//! - `Ok(Some((vec![], consumed)))` - only blank lines were buffered; drop them
//! - `Ok(None)` - no complete line yet, read more data
//! - `Err(ParseError)` - the pending line is longer than the limit
//!
//! Blank lines are skipped, but always reported as consumed so the caller
//! can discard them. A trailing `\r` is stripped, and runs of spaces count
//! as a single separator.

use bytes::Bytes;
use thiserror::Error;

/// Maximum length of a single command line (64 KiB)
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Errors that can occur while framing command lines.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line exceeds the maximum allowed size
    #[error("line too long: {len} bytes (max: {max})")]
    LineTooLong { len: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Splits a byte stream into tokenized command lines.
///
/// # Example
///
/// ```
/// use emberkv::protocol::LineParser;
///
/// let parser = LineParser::new();
/// let (tokens, consumed) = parser.parse(b"get name\nset").unwrap().unwrap();
///
/// assert_eq!(tokens, vec!["get", "name"]);
/// assert_eq!(consumed, 9);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LineParser {
    max_line: usize,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    /// Creates a parser with the default line limit.
    pub fn new() -> Self {
        Self::with_max_line(MAX_LINE_LENGTH)
    }

    /// Creates a parser that rejects lines longer than `max_line` bytes.
    pub fn with_max_line(max_line: usize) -> Self {
        Self { max_line }
    }

    /// Attempts to parse one command line from the buffer.
    ///
    /// Leading blank lines are folded into the returned `consumed` count. If
    /// nothing but blank lines is complete, the token vector is empty.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(Vec<Bytes>, usize)>> {
        let mut consumed = 0;

        loop {
            let rest = &buf[consumed..];
            let end = match rest.iter().position(|&b| b == b'\n') {
                Some(end) => end,
                None => {
                    if rest.len() > self.max_line {
                        return Err(ParseError::LineTooLong {
                            len: rest.len(),
                            max: self.max_line,
                        });
                    }
                    if consumed > 0 {
                        return Ok(Some((Vec::new(), consumed)));
                    }
                    return Ok(None);
                }
            };

            if end > self.max_line {
                return Err(ParseError::LineTooLong {
                    len: end,
                    max: self.max_line,
                });
            }

            let line = strip_cr(&rest[..end]);
            consumed += end + 1;

            let tokens = tokenize(line);
            if !tokens.is_empty() {
                return Ok(Some((tokens, consumed)));
            }
        }
    }
}

#[inline]
fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Splits a line on spaces, skipping empty tokens.
fn tokenize(line: &[u8]) -> Vec<Bytes> {
    line.split(|&b| b == b' ')
        .filter(|token| !token.is_empty())
        .map(Bytes::copy_from_slice)
        .collect()
}

/// Parses a single command line.
///
/// Convenience wrapper around [`LineParser::parse`] with the default limit.
pub fn parse_line(buf: &[u8]) -> ParseResult<Option<(Vec<Bytes>, usize)>> {
    LineParser::new().parse(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(parts: &[&str]) -> Vec<Bytes> {
        parts.iter().map(|s| Bytes::from(s.to_string())).collect()
    }

    #[test]
    fn test_parse_simple_line() {
        let result = parse_line(b"set name Ariz\n").unwrap();
        assert_eq!(result, Some((tokens(&["set", "name", "Ariz"]), 14)));
    }

    #[test]
    fn test_parse_crlf() {
        let result = parse_line(b"get name\r\n").unwrap();
        assert_eq!(result, Some((tokens(&["get", "name"]), 10)));
    }

    #[test]
    fn test_parse_incomplete() {
        assert_eq!(parse_line(b"set name Ar").unwrap(), None);
        assert_eq!(parse_line(b"").unwrap(), None);
    }

    #[test]
    fn test_collapses_repeated_spaces() {
        let result = parse_line(b"  sadd   ids  42 \n").unwrap();
        assert_eq!(result, Some((tokens(&["sadd", "ids", "42"]), 18)));
    }

    #[test]
    fn test_skips_blank_lines() {
        let result = parse_line(b"\n\r\n   \nping\n").unwrap();
        assert_eq!(result, Some((tokens(&["ping"]), 12)));

        // only blank lines: nothing to run, but the bytes are reported
        assert_eq!(parse_line(b"\n\n").unwrap(), Some((vec![], 2)));
        assert_eq!(parse_line(b"\r\n\nset a").unwrap(), Some((vec![], 3)));
    }

    #[test]
    fn test_long_run_of_blank_lines_is_consumed() {
        let buf = vec![b'\n'; 4 * MAX_LINE_LENGTH];
        assert_eq!(parse_line(&buf).unwrap(), Some((vec![], buf.len())));
    }

    #[test]
    fn test_pipelined_lines() {
        let buf = b"set a 1\nset b 2\nget a\n";
        let parser = LineParser::new();
        let mut offset = 0;
        let mut commands = Vec::new();

        while let Some((tokens, consumed)) = parser.parse(&buf[offset..]).unwrap() {
            commands.push(tokens);
            offset += consumed;
        }

        assert_eq!(offset, buf.len());
        assert_eq!(
            commands,
            vec![
                tokens(&["set", "a", "1"]),
                tokens(&["set", "b", "2"]),
                tokens(&["get", "a"]),
            ]
        );
    }

    #[test]
    fn test_binary_tokens() {
        let result = parse_line(b"set k \xff\xfe\n").unwrap().unwrap();
        assert_eq!(&result.0[2][..], &[0xff, 0xfe]);
    }

    #[test]
    fn test_line_too_long() {
        let parser = LineParser::with_max_line(8);

        assert!(parser.parse(b"get abc\n").unwrap().is_some());
        assert_eq!(
            parser.parse(b"get abcdefgh\n"),
            Err(ParseError::LineTooLong { len: 12, max: 8 })
        );
        // no newline yet, but already over the limit
        assert_eq!(
            parser.parse(b"get abcdefgh"),
            Err(ParseError::LineTooLong { len: 12, max: 8 })
        );
    }
}
