//! RESP protocol support.
//!
//! This module implements the wire format flintkv speaks: the value types
//! ([`RespValue`]), their serialization, and an incremental parser
//! ([`RespParser`]) suited to reading from a TCP stream where values may
//! arrive split or batched.
//!
//! The parser and writer are inverses of each other: any value the writer
//! emits parses back to an equal value. One asymmetry is deliberate —
//! `Null` always serializes as the null bulk `$-1\r\n`, while the parser
//! accepts both `$-1\r\n` and `*-1\r\n` as null.

pub mod parser;
pub mod types;

pub use parser::{parse_message, ParseError, ParseResult, RespParser};
pub use types::RespValue;
