//! Command processing.
//!
//! The request path through this module:
//!
//! ```text
//! RespValue (from the parser)
//!       │
//!       ▼
//! Command::from_resp     — uppercase name + string args
//!       │
//!       ▼
//! CommandHandler::execute — dispatch, validate arity, run the
//!       │                   engine operation
//!       ▼
//! RespValue (reply)
//! ```
//!
//! Everything here is synchronous; the connection layer drives it.

pub mod command;
pub mod handler;

pub use command::{Command, CommandError};
pub use handler::CommandHandler;
