//! The parsed command model.
//!
//! Clients send every request as a RESP array of strings: the command name
//! followed by its arguments. [`Command::from_resp`] converts one parsed
//! wire value into that shape, uppercasing the name so dispatch is
//! case-insensitive.

use crate::protocol::RespValue;
use thiserror::Error;

/// Failure to interpret a wire value as a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The value was not a non-empty array of strings
    #[error("invalid command format")]
    InvalidFormat,
}

/// A client request: uppercase name plus ordered string arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    /// Builds a command from one top-level RESP value.
    ///
    /// The value must be a non-null, non-empty array whose elements are all
    /// bulk or simple strings holding valid UTF-8; anything else is a
    /// protocol-level error.
    pub fn from_resp(value: RespValue) -> Result<Self, CommandError> {
        let RespValue::Array(items) = value else {
            return Err(CommandError::InvalidFormat);
        };
        if items.is_empty() {
            return Err(CommandError::InvalidFormat);
        }

        let mut parts = Vec::with_capacity(items.len());
        for item in &items {
            match item.as_str() {
                Some(s) => parts.push(s.to_string()),
                None => return Err(CommandError::InvalidFormat),
            }
        }

        let mut parts = parts.into_iter();
        // non-empty is checked above, so the first element exists
        let name = parts.next().unwrap_or_default().to_uppercase();

        Ok(Self {
            name,
            args: parts.collect(),
        })
    }

    #[cfg(test)]
    pub(crate) fn of(name: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_uppercase(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn bulk(s: &str) -> RespValue {
        RespValue::BulkString(Bytes::from(s.to_string()))
    }

    #[test]
    fn parses_array_of_bulk_strings() {
        let cmd =
            Command::from_resp(RespValue::Array(vec![bulk("set"), bulk("key"), bulk("value")]))
                .unwrap();
        assert_eq!(cmd.name, "SET");
        assert_eq!(cmd.args, vec!["key", "value"]);
    }

    #[test]
    fn name_is_uppercased() {
        let cmd = Command::from_resp(RespValue::Array(vec![bulk("pInG")])).unwrap();
        assert_eq!(cmd.name, "PING");
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn simple_strings_are_accepted_as_elements() {
        let cmd = Command::from_resp(RespValue::Array(vec![
            RespValue::simple_string("GET"),
            bulk("key"),
        ]))
        .unwrap();
        assert_eq!(cmd.name, "GET");
    }

    #[test]
    fn rejects_non_array() {
        assert_eq!(
            Command::from_resp(RespValue::simple_string("PING")).unwrap_err(),
            CommandError::InvalidFormat
        );
        assert_eq!(
            Command::from_resp(RespValue::Integer(1)).unwrap_err(),
            CommandError::InvalidFormat
        );
    }

    #[test]
    fn rejects_null_and_empty_array() {
        assert_eq!(
            Command::from_resp(RespValue::Null).unwrap_err(),
            CommandError::InvalidFormat
        );
        assert_eq!(
            Command::from_resp(RespValue::Array(vec![])).unwrap_err(),
            CommandError::InvalidFormat
        );
    }

    #[test]
    fn rejects_non_string_elements() {
        assert_eq!(
            Command::from_resp(RespValue::Array(vec![bulk("GET"), RespValue::Integer(9)]))
                .unwrap_err(),
            CommandError::InvalidFormat
        );
    }

    #[test]
    fn rejects_invalid_utf8_elements() {
        let bad = RespValue::BulkString(Bytes::from(&[0xff, 0xfe][..]));
        assert_eq!(
            Command::from_resp(RespValue::Array(vec![bad])).unwrap_err(),
            CommandError::InvalidFormat
        );
    }
}
