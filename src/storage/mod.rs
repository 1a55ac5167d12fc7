//! The storage layer: typed keyspace, expiry, and snapshots.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       StorageEngine                         │
//! │           RwLock<HashMap<String, StoredValue>>              │
//! │                                                             │
//! │   StoredValue = { payload: String|Hash|List|Set,            │
//! │                   expires_at, created_at }                  │
//! └─────────────────────────────────────────────────────────────┘
//!           ▲                                   ▲
//!           │ sweep_expired()                   │ keys() + get()
//! ┌─────────┴─────────┐               ┌─────────┴──────────┐
//! │   ExpirySweeper   │               │   SnapshotService  │
//! │ (periodic sweep)  │               │ (atomic save/load) │
//! └───────────────────┘               └────────────────────┘
//! ```
//!
//! The engine is the shared mutable heart of the server: constructed at
//! startup, populated from a snapshot, mutated by request handlers, drained
//! by a final save on shutdown. It is passed around as an explicit
//! `Arc<StorageEngine>` handle.

pub mod engine;
pub mod expiry;
pub mod persistence;
pub mod value;

pub use engine::{StorageEngine, StorageError, StorageStats, TtlResult};
pub use expiry::{ExpirySweeper, DEFAULT_SWEEP_INTERVAL};
pub use persistence::{
    load, save, PersistenceError, SnapshotConfig, SnapshotService, DEFAULT_SAVE_INTERVAL,
};
pub use value::{HashData, Kind, ListData, Payload, SetData, StoredValue};
