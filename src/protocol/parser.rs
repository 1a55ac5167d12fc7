//! Incremental RESP parser.
//!
//! The parser consumes at most one complete value per call from a byte
//! buffer the caller owns. It returns:
//!
//! - `Ok(Some((value, consumed)))` — a full value was parsed; the caller
//!   should advance its buffer by `consumed` bytes
//! - `Ok(None)` — the buffer holds an incomplete value; read more bytes
//!   and call again
//! - `Err(ParseError)` — the bytes are not valid RESP
//!
//! TCP delivers a byte stream, so a single read may contain half a command
//! or several pipelined ones. This interface lets the connection loop
//! append incoming bytes to a `BytesMut` and drain complete values as they
//! become available, leaving any trailing bytes for the next call. The
//! parser never looks beyond the value it is currently decoding.

use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors produced while decoding RESP from a client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Unknown type prefix byte
    #[error("unknown type prefix: {0:#04x}")]
    UnknownPrefix(u8),

    /// Non-numeric text where a length or integer was required
    #[error("invalid integer")]
    InvalidInteger,

    /// Invalid UTF-8 in a simple string or error line
    #[error("invalid UTF-8")]
    InvalidUtf8,

    /// Bulk string length below -1, or a bulk body not terminated by CRLF
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array length below -1
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Structural violation (empty line, nesting too deep)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A declared bulk length above the allowed maximum
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size of a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array nesting depth; bounds recursion against hostile input
pub const MAX_NESTING_DEPTH: usize = 32;

/// An incremental RESP parser.
///
/// Stateless between calls; all buffering lives with the caller.
///
/// # Example
///
/// ```
/// use flintkv::protocol::RespParser;
///
/// let mut parser = RespParser::new();
/// let buf = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
/// let (value, consumed) = parser.parse(buf).unwrap().unwrap();
/// assert_eq!(consumed, buf.len());
/// ```
#[derive(Debug, Default)]
pub struct RespParser;

impl RespParser {
    /// Creates a new parser.
    pub fn new() -> Self {
        Self
    }

    /// Attempts to decode one value from the front of `buf`.
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        self.parse_value(buf, 0)
    }

    fn parse_value(&mut self, buf: &[u8], depth: usize) -> ParseResult<Option<(RespValue, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }

        if depth > MAX_NESTING_DEPTH {
            return Err(ParseError::Protocol(format!(
                "maximum nesting depth exceeded: {}",
                MAX_NESTING_DEPTH
            )));
        }

        match buf[0] {
            prefix::SIMPLE_STRING => self.parse_line(buf, RespValue::SimpleString),
            prefix::ERROR => self.parse_line(buf, RespValue::Error),
            prefix::INTEGER => self.parse_integer(buf),
            prefix::BULK_STRING => self.parse_bulk_string(buf),
            prefix::ARRAY => self.parse_array(buf, depth),
            other => Err(ParseError::UnknownPrefix(other)),
        }
    }

    /// Parses a one-line value (`+…\r\n` or `-…\r\n`).
    fn parse_line(
        &mut self,
        buf: &[u8],
        build: fn(String) -> RespValue,
    ) -> ParseResult<Option<(RespValue, usize)>> {
        match find_crlf(&buf[1..]) {
            Some(pos) => {
                let s = std::str::from_utf8(&buf[1..1 + pos]).map_err(|_| ParseError::InvalidUtf8)?;
                // 1 for the prefix, 2 for CRLF
                Ok(Some((build(s.to_string()), 1 + pos + 2)))
            }
            None => Ok(None),
        }
    }

    /// Parses an integer: `:<n>\r\n`
    fn parse_integer(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        match find_crlf(&buf[1..]) {
            Some(pos) => {
                let n = parse_decimal(&buf[1..1 + pos])?;
                Ok(Some((RespValue::Integer(n), 1 + pos + 2)))
            }
            None => Ok(None),
        }
    }

    /// Parses a bulk string: `$<len>\r\n<data>\r\n`
    fn parse_bulk_string(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let length_end = match find_crlf(&buf[1..]) {
            Some(pos) => pos,
            None => return Ok(None),
        };

        let length = parse_decimal(&buf[1..1 + length_end])?;

        // $-1\r\n is the null bulk
        if length == -1 {
            return Ok(Some((RespValue::Null, 1 + length_end + 2)));
        }

        if length < 0 {
            return Err(ParseError::InvalidBulkLength(length));
        }

        let length = length as usize;
        if length > MAX_BULK_SIZE {
            return Err(ParseError::MessageTooLarge {
                size: length,
                max: MAX_BULK_SIZE,
            });
        }

        let data_start = 1 + length_end + 2;
        let total_needed = data_start + length + 2;
        if buf.len() < total_needed {
            return Ok(None);
        }

        if &buf[data_start + length..data_start + length + 2] != CRLF {
            return Err(ParseError::InvalidBulkLength(length as i64));
        }

        let data = Bytes::copy_from_slice(&buf[data_start..data_start + length]);
        Ok(Some((RespValue::BulkString(data), total_needed)))
    }

    /// Parses an array: `*<count>\r\n<elements...>`
    fn parse_array(&mut self, buf: &[u8], depth: usize) -> ParseResult<Option<(RespValue, usize)>> {
        let count_end = match find_crlf(&buf[1..]) {
            Some(pos) => pos,
            None => return Ok(None),
        };

        let count = parse_decimal(&buf[1..1 + count_end])?;

        // *-1\r\n is the null array
        if count == -1 {
            return Ok(Some((RespValue::Null, 1 + count_end + 2)));
        }

        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        let count = count as usize;
        let mut elements = Vec::with_capacity(count.min(64));
        let mut consumed = 1 + count_end + 2;

        for _ in 0..count {
            if consumed >= buf.len() {
                return Ok(None);
            }
            match self.parse_value(&buf[consumed..], depth + 1)? {
                Some((value, element_consumed)) => {
                    elements.push(value);
                    consumed += element_consumed;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((RespValue::Array(elements), consumed)))
    }
}

/// Finds the position of the first CRLF, returning the index of the `\r`.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    // memchr scans for '\r' a word at a time; verify the '\n' follows and
    // keep scanning past bare carriage returns.
    let mut pos = 0;
    while let Some(offset) = memchr::memchr(b'\r', &buf[pos..]) {
        let cr = pos + offset;
        if cr + 1 < buf.len() {
            if buf[cr + 1] == b'\n' {
                return Some(cr);
            }
            pos = cr + 1;
        } else {
            return None;
        }
    }
    None
}

/// Parses a signed decimal from raw bytes without allocating.
fn parse_decimal(buf: &[u8]) -> ParseResult<i64> {
    if buf.is_empty() {
        return Err(ParseError::InvalidInteger);
    }

    let (negative, digits) = if buf[0] == b'-' {
        (true, &buf[1..])
    } else {
        (false, buf)
    };

    if digits.is_empty() {
        return Err(ParseError::InvalidInteger);
    }

    let mut n: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(ParseError::InvalidInteger);
        }
        n = n
            .checked_mul(10)
            .and_then(|n| n.checked_add((b - b'0') as i64))
            .ok_or(ParseError::InvalidInteger)?;
    }

    Ok(if negative { -n } else { n })
}

/// Parses a single RESP value from a byte slice.
///
/// Convenience wrapper for one-shot use.
pub fn parse_message(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    RespParser::new().parse(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_string() {
        let (value, consumed) = parse_message(b"+OK\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::SimpleString("OK".to_string()));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn parse_simple_string_incomplete() {
        assert!(parse_message(b"+OK").unwrap().is_none());
        assert!(parse_message(b"+OK\r").unwrap().is_none());
    }

    #[test]
    fn parse_error_value() {
        let (value, consumed) = parse_message(b"-ERR unknown command\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::Error("ERR unknown command".to_string()));
        assert_eq!(consumed, 22);
    }

    #[test]
    fn parse_integer() {
        let (value, consumed) = parse_message(b":1000\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::Integer(1000));
        assert_eq!(consumed, 7);

        let (value, _) = parse_message(b":-42\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::Integer(-42));
    }

    #[test]
    fn parse_integer_extremes() {
        let (value, _) = parse_message(b":9223372036854775807\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::Integer(i64::MAX));
    }

    #[test]
    fn parse_bulk_string() {
        let (value, consumed) = parse_message(b"$5\r\nhello\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::BulkString(Bytes::from("hello")));
        assert_eq!(consumed, 11);
    }

    #[test]
    fn parse_null_bulk_string() {
        let (value, consumed) = parse_message(b"$-1\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::Null);
        assert_eq!(consumed, 5);
    }

    #[test]
    fn parse_empty_bulk_string() {
        let (value, consumed) = parse_message(b"$0\r\n\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::BulkString(Bytes::from("")));
        assert_eq!(consumed, 6);
    }

    #[test]
    fn parse_bulk_string_incomplete() {
        assert!(parse_message(b"$5\r\nhel").unwrap().is_none());
        assert!(parse_message(b"$5\r\nhello").unwrap().is_none());
    }

    #[test]
    fn parse_bulk_string_bad_terminator() {
        let err = parse_message(b"$5\r\nhelloXX").unwrap_err();
        assert!(matches!(err, ParseError::InvalidBulkLength(5)));
    }

    #[test]
    fn parse_bulk_string_negative_length() {
        let err = parse_message(b"$-2\r\n").unwrap_err();
        assert_eq!(err, ParseError::InvalidBulkLength(-2));
    }

    #[test]
    fn parse_binary_safe_bulk_string() {
        let (value, _) = parse_message(b"$5\r\nhel\x00o\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::BulkString(Bytes::from(&b"hel\x00o"[..])));
    }

    #[test]
    fn parse_array() {
        let (value, consumed) = parse_message(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(
            value,
            RespValue::Array(vec![
                RespValue::BulkString(Bytes::from("GET")),
                RespValue::BulkString(Bytes::from("name")),
            ])
        );
        assert_eq!(consumed, 23);
    }

    #[test]
    fn parse_null_array() {
        let (value, _) = parse_message(b"*-1\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::Null);
    }

    #[test]
    fn parse_empty_array() {
        let (value, _) = parse_message(b"*0\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::Array(vec![]));
    }

    #[test]
    fn parse_array_negative_length() {
        let err = parse_message(b"*-3\r\n").unwrap_err();
        assert_eq!(err, ParseError::InvalidArrayLength(-3));
    }

    #[test]
    fn parse_array_incomplete() {
        assert!(parse_message(b"*2\r\n$3\r\nGET\r\n").unwrap().is_none());
    }

    #[test]
    fn parse_nested_array() {
        let (value, _) = parse_message(b"*2\r\n:1\r\n*2\r\n:2\r\n:3\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(
            value,
            RespValue::Array(vec![
                RespValue::Integer(1),
                RespValue::Array(vec![RespValue::Integer(2), RespValue::Integer(3)]),
            ])
        );
    }

    #[test]
    fn parse_mixed_array() {
        let (value, _) = parse_message(b"*3\r\n+OK\r\n:100\r\n$5\r\nhello\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(
            value,
            RespValue::Array(vec![
                RespValue::SimpleString("OK".to_string()),
                RespValue::Integer(100),
                RespValue::BulkString(Bytes::from("hello")),
            ])
        );
    }

    #[test]
    fn unknown_prefix_is_rejected() {
        let err = parse_message(b"@bogus\r\n").unwrap_err();
        assert_eq!(err, ParseError::UnknownPrefix(b'@'));
    }

    #[test]
    fn invalid_integer_is_rejected() {
        let err = parse_message(b":not_a_number\r\n").unwrap_err();
        assert_eq!(err, ParseError::InvalidInteger);
        let err = parse_message(b":\r\n").unwrap_err();
        assert_eq!(err, ParseError::InvalidInteger);
        let err = parse_message(b":-\r\n").unwrap_err();
        assert_eq!(err, ParseError::InvalidInteger);
    }

    #[test]
    fn nesting_depth_is_capped() {
        let mut buf = Vec::new();
        for _ in 0..MAX_NESTING_DEPTH + 2 {
            buf.extend_from_slice(b"*1\r\n");
        }
        buf.extend_from_slice(b":1\r\n");
        let err = parse_message(&buf).unwrap_err();
        assert!(matches!(err, ParseError::Protocol(_)));
    }

    #[test]
    fn trailing_bytes_are_left_in_buffer() {
        let buf = b"+OK\r\ntrailing";
        let (value, consumed) = parse_message(buf).unwrap().unwrap();
        assert_eq!(value, RespValue::SimpleString("OK".to_string()));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn pipelined_values_parse_one_at_a_time() {
        let buf = b"+OK\r\n:1\r\n";
        let (first, consumed) = parse_message(buf).unwrap().unwrap();
        assert_eq!(first, RespValue::SimpleString("OK".to_string()));
        let (second, _) = parse_message(&buf[consumed..]).unwrap().unwrap();
        assert_eq!(second, RespValue::Integer(1));
    }

    #[test]
    fn roundtrip_through_writer() {
        let original = RespValue::Array(vec![
            RespValue::bulk_string(Bytes::from("SET")),
            RespValue::bulk_string(Bytes::from("key")),
            RespValue::bulk_string(Bytes::from("value")),
        ]);
        let serialized = original.serialize();
        let (parsed, consumed) = parse_message(&serialized).unwrap().unwrap();
        assert_eq!(parsed, original);
        assert_eq!(consumed, serialized.len());
    }

    #[test]
    fn null_roundtrip() {
        let serialized = RespValue::null().serialize();
        let (parsed, _) = parse_message(&serialized).unwrap().unwrap();
        assert_eq!(parsed, RespValue::Null);
    }
}
