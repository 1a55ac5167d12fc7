//! RESP wire value types.
//!
//! RESP frames every value as a line prefixed by one type byte and
//! terminated by CRLF:
//!
//! - `+` simple string: `+OK\r\n`
//! - `-` error: `-ERR unknown command\r\n`
//! - `:` integer: `:1000\r\n`
//! - `$` bulk string: `$5\r\nhello\r\n` (null bulk: `$-1\r\n`)
//! - `*` array: `*2\r\n$3\r\nGET\r\n$4\r\nname\r\n` (null array: `*-1\r\n`)
//!
//! Bulk strings are binary-safe; everything else is text. Null and the
//! empty string are distinct values: an empty bulk serializes as
//! `$0\r\n\r\n`, null as `$-1\r\n`.

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used throughout the protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP type prefix bytes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A single RESP value, used both for parsed requests and for responses
/// on their way back to the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Non-binary-safe status line, e.g. `+OK\r\n`.
    SimpleString(String),

    /// Error line, e.g. `-ERR unknown command\r\n`.
    Error(String),

    /// 64-bit signed integer, e.g. `:42\r\n`.
    Integer(i64),

    /// Binary-safe string with a length prefix, e.g. `$5\r\nhello\r\n`.
    BulkString(Bytes),

    /// The null value. Written as the null bulk `$-1\r\n`; parsed from
    /// either `$-1\r\n` or `*-1\r\n`.
    Null,

    /// Ordered sequence of values, possibly nested.
    Array(Vec<RespValue>),
}

/// Appends one `<prefix><payload>\r\n` header line.
///
/// Every RESP value starts with exactly one of these; bulk strings and
/// arrays follow it with a body, the rest are the line alone.
fn put_header(buf: &mut Vec<u8>, prefix: u8, payload: &[u8]) {
    buf.reserve(payload.len() + 3);
    buf.push(prefix);
    buf.extend_from_slice(payload);
    buf.extend_from_slice(CRLF);
}

impl RespValue {
    /// Creates a simple string response.
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Creates an error response.
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    /// Creates an integer response.
    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    /// Creates a bulk string response.
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    /// Creates the null response.
    pub fn null() -> Self {
        RespValue::Null
    }

    /// Creates an array response.
    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(values)
    }

    /// The `+OK\r\n` status reply.
    pub fn ok() -> Self {
        Self::simple_string("OK")
    }

    /// The `+PONG\r\n` reply.
    pub fn pong() -> Self {
        Self::simple_string("PONG")
    }

    /// Serializes this value into its wire form.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes this value into an existing buffer, recursing through
    /// arrays.
    ///
    /// Each value is one header line plus, for bulk strings, the raw body
    /// and its CRLF, and for arrays, the recursively written elements.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => put_header(buf, prefix::SIMPLE_STRING, s.as_bytes()),
            RespValue::Error(s) => put_header(buf, prefix::ERROR, s.as_bytes()),
            RespValue::Integer(n) => {
                put_header(buf, prefix::INTEGER, n.to_string().as_bytes())
            }
            RespValue::BulkString(data) => {
                put_header(buf, prefix::BULK_STRING, data.len().to_string().as_bytes());
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            // null is spelled as a bulk of length -1
            RespValue::Null => put_header(buf, prefix::BULK_STRING, b"-1"),
            RespValue::Array(values) => {
                put_header(buf, prefix::ARRAY, values.len().to_string().as_bytes());
                for value in values {
                    value.serialize_into(buf);
                }
            }
        }
    }

    /// Returns true if this value is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Returns the text of a simple or bulk string, if this is one and it
    /// holds valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RespValue::SimpleString(s) => Some(s),
            RespValue::BulkString(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }
}

/// Log-friendly rendering: arrays inline in brackets, binary bulks by
/// length. Not a wire format.
impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => f.write_str(s),
            RespValue::Error(s) => write!(f, "(error) {s}"),
            RespValue::Integer(n) => write!(f, "(integer) {n}"),
            RespValue::BulkString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{s}\""),
                Err(_) => write!(f, "({} bytes of binary)", data.len()),
            },
            RespValue::Null => f.write_str("(nil)"),
            RespValue::Array(values) => {
                f.write_str("[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_simple_string() {
        assert_eq!(RespValue::simple_string("OK").serialize(), b"+OK\r\n");
    }

    #[test]
    fn serialize_error() {
        assert_eq!(
            RespValue::error("ERR unknown command").serialize(),
            b"-ERR unknown command\r\n"
        );
    }

    #[test]
    fn serialize_integer() {
        assert_eq!(RespValue::integer(1000).serialize(), b":1000\r\n");
        assert_eq!(RespValue::integer(-42).serialize(), b":-42\r\n");
    }

    #[test]
    fn serialize_bulk_string() {
        assert_eq!(
            RespValue::bulk_string(Bytes::from("hello")).serialize(),
            b"$5\r\nhello\r\n"
        );
    }

    #[test]
    fn serialize_null() {
        assert_eq!(RespValue::null().serialize(), b"$-1\r\n");
    }

    #[test]
    fn empty_bulk_is_not_null() {
        // an empty bulk keeps its length prefix; only Null gets $-1
        assert_eq!(
            RespValue::bulk_string(Bytes::new()).serialize(),
            b"$0\r\n\r\n"
        );
    }

    #[test]
    fn serialize_array() {
        let value = RespValue::array(vec![
            RespValue::bulk_string(Bytes::from("GET")),
            RespValue::bulk_string(Bytes::from("name")),
        ]);
        assert_eq!(value.serialize(), b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n");
    }

    #[test]
    fn serialize_nested_array() {
        let value = RespValue::array(vec![
            RespValue::integer(1),
            RespValue::array(vec![RespValue::integer(2), RespValue::integer(3)]),
        ]);
        assert_eq!(value.serialize(), b"*2\r\n:1\r\n*2\r\n:2\r\n:3\r\n");
    }

    #[test]
    fn array_with_null_element() {
        let value = RespValue::array(vec![RespValue::ok(), RespValue::null()]);
        assert_eq!(value.serialize(), b"*2\r\n+OK\r\n$-1\r\n");
    }

    #[test]
    fn binary_bulk_serializes_raw() {
        let value = RespValue::bulk_string(Bytes::from(&b"a\x00b"[..]));
        assert_eq!(value.serialize(), b"$3\r\na\x00b\r\n");
    }

    #[test]
    fn common_replies() {
        assert_eq!(RespValue::ok().serialize(), b"+OK\r\n");
        assert_eq!(RespValue::pong().serialize(), b"+PONG\r\n");
    }

    #[test]
    fn as_str_variants() {
        assert_eq!(RespValue::simple_string("hi").as_str(), Some("hi"));
        assert_eq!(
            RespValue::bulk_string(Bytes::from("hi")).as_str(),
            Some("hi")
        );
        assert_eq!(RespValue::integer(1).as_str(), None);
        assert_eq!(
            RespValue::bulk_string(Bytes::from(&[0xff, 0xfe][..])).as_str(),
            None
        );
    }

    #[test]
    fn display_renders_inline() {
        let value = RespValue::array(vec![
            RespValue::simple_string("OK"),
            RespValue::integer(7),
            RespValue::null(),
            RespValue::bulk_string(Bytes::from("hi")),
        ]);
        assert_eq!(value.to_string(), "[OK, (integer) 7, (nil), \"hi\"]");
    }
}
