//! # flintkv - A Redis-Inspired In-Memory Key-Value Store
//!
//! flintkv is a typed, Redis-compatible key-value database written in Rust.
//! It speaks the RESP wire protocol over TCP and stores four kinds of
//! values — strings, hashes, lists, and sets — in a single keyspace with
//! per-key expiration and optional durable snapshots.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                             flintkv                                │
//! │                                                                    │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐             │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │             │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │             │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘             │
//! │                                               │                    │
//! │  ┌─────────────┐                              ▼                    │
//! │  │    RESP     │    ┌──────────────────────────────────────────┐   │
//! │  │   Parser    │    │             StorageEngine                │   │
//! │  └─────────────┘    │   RwLock<HashMap<String, StoredValue>>   │   │
//! │                     │    string │ hash │ list │ set │ TTL      │   │
//! │                     └──────────────────────────────────────────┘   │
//! │                            ▲                     ▲                 │
//! │              ┌─────────────┴─────┐   ┌───────────┴────────────┐    │
//! │              │   ExpirySweeper   │   │    SnapshotService     │    │
//! │              │ (background task) │   │ (periodic atomic save) │    │
//! │              └───────────────────┘   └────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Typed keyspace**: one key, one value kind. Strings, hashes, lists,
//!   and sets share a single map; mismatched operations fail with the
//!   classic `WRONGTYPE` error rather than clobbering data.
//! - **Lazy + active expiry**: expired keys are hidden on access, and a
//!   background sweeper reclaims the ones nobody reads anymore.
//! - **Durable snapshots**: the keyspace is periodically serialized to a
//!   length-prefixed, self-describing image written with a temp-file +
//!   atomic-rename discipline, so a crash never leaves a half-written
//!   snapshot behind.
//! - **Async I/O**: built on Tokio; one task per connection, commands
//!   strictly serialized within a connection.
//!
//! ## Quick Start
//!
//! ```ignore
//! use flintkv::commands::CommandHandler;
//! use flintkv::connection::{handle_connection, ConnectionStats};
//! use flintkv::storage::{ExpirySweeper, StorageEngine, DEFAULT_SWEEP_INTERVAL};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage = Arc::new(StorageEngine::new());
//!     let _sweeper = ExpirySweeper::start(Arc::clone(&storage), DEFAULT_SWEEP_INTERVAL);
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:6379").await.unwrap();
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         let handler = CommandHandler::new(Arc::clone(&storage));
//!         tokio::spawn(handle_connection(stream, addr, handler, Arc::clone(&stats)));
//!     }
//! }
//! ```
//!
//! ## Supported Commands
//!
//! ### Strings & Keys
//! - `SET key value [EX seconds]`, `GET key`
//! - `DEL key [key ...]`, `EXISTS key [key ...]`
//! - `EXPIRE key seconds`, `TTL key`, `TYPE key`
//! - `KEYS pattern`, `DBSIZE`, `FLUSHDB` / `CLEAR`
//!
//! ### Hashes
//! - `HSET key field value [field value ...]`, `HGET key field`
//! - `HDEL key field [field ...]`, `HEXISTS key field`
//! - `HGETALL key`, `HKEYS key`, `HLEN key`
//!
//! ### Lists
//! - `LPUSH` / `RPUSH key value [value ...]`
//! - `LPOP` / `RPOP key`, `LLEN key`, `LRANGE key start stop`
//!
//! ### Sets
//! - `SADD` / `SREM key member [member ...]`
//! - `SISMEMBER key member`, `SMEMBERS key`, `SCARD key`
//! - `SINTER key [key ...]`, `SUNION key [key ...]`
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP parser and wire types
//! - [`commands`]: command model and per-command handlers
//! - [`storage`]: the typed keyspace engine, expiry sweeper, and snapshots
//! - [`connection`]: per-client connection loop
//! - [`config`]: server configuration

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod storage;

pub use commands::{Command, CommandHandler};
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{ParseError, RespParser, RespValue};
pub use storage::{ExpirySweeper, SnapshotConfig, SnapshotService, StorageEngine};

/// The default port flintkv listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host flintkv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of flintkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
