//! Client connection management.
//!
//! One handler task per accepted socket:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  read bytes into BytesMut    │<───────────┐
//! └──────────────┬───────────────┘            │
//!                ▼                            │
//! ┌──────────────────────────────┐            │
//! │  parse one RESP value        │── none ────┘ (need more data)
//! └──────────────┬───────────────┘
//!                ▼
//! ┌──────────────────────────────┐
//! │  build Command, execute      │
//! └──────────────┬───────────────┘
//!                ▼
//! ┌──────────────────────────────┐
//! │  write + flush response      │──> back to parse (pipelining)
//! └──────────────────────────────┘
//! ```

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
