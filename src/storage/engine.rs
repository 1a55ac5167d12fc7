//! The typed keyspace engine.
//!
//! A single `RwLock<HashMap<String, StoredValue>>` holds every key: reads
//! take the shared guard, writes the exclusive one, and the guard is the
//! linearization point for all per-key operations. No blocking I/O ever
//! happens while a guard is held.
//!
//! ## Type discipline
//!
//! Every typed operation resolves the key first. A live key of the wrong
//! kind fails with [`StorageError::WrongType`] and mutates nothing.
//! Creating writes (`set`, `hset`, `lpush`, `rpush`, `sadd`) replace an
//! *expired* value of any kind with a fresh value of the right kind.
//!
//! ## Expiration
//!
//! Expiry is lazy + active. Every access checks the deadline under the
//! guard: write paths physically evict an expired entry on discovery, read
//! paths report it as absent and leave removal to the next write or to the
//! background sweeper (see [`crate::storage::expiry`]), which periodically
//! calls [`StorageEngine::sweep_expired`].

use crate::storage::value::{Kind, Payload, StoredValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors surfaced by keyspace operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The key does not exist
    #[error("key not found")]
    KeyNotFound,

    /// The key exists but its deadline has passed; logically absent
    #[error("key expired")]
    KeyExpired,

    /// The key holds a different kind than the operation expects
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// The hash field does not exist
    #[error("field not found")]
    FieldNotFound,
}

impl StorageError {
    /// True for the two conditions that make a key logically absent.
    pub fn is_missing(&self) -> bool {
        matches!(self, StorageError::KeyNotFound | StorageError::KeyExpired)
    }
}

/// Outcome of a TTL query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlResult {
    /// Live key with a deadline; the remaining time
    Remaining(Duration),
    /// Live key without a deadline (TTL reports -1)
    NoExpiry,
    /// Absent or expired key (TTL reports -2)
    Missing,
}

/// Engine counters, all tracked with relaxed atomics.
#[derive(Debug, Clone, Copy)]
pub struct StorageStats {
    /// Live keys at the time of the call
    pub keys: usize,
    /// Keys removed by lazy or active expiration since startup
    pub expired: u64,
}

/// The keyspace: a concurrent map from key to typed value.
///
/// Designed to be wrapped in an `Arc` and shared between connection
/// handlers and the background tasks. Returned data is always a defensive
/// copy; no payload reference outlives the internal guard.
///
/// # Example
///
/// ```
/// use flintkv::storage::StorageEngine;
///
/// let engine = StorageEngine::new();
/// engine.set("name", "Ada");
/// assert_eq!(engine.get_string("name").unwrap(), "Ada");
/// ```
#[derive(Debug, Default)]
pub struct StorageEngine {
    data: RwLock<HashMap<String, StoredValue>>,
    expired_total: AtomicU64,
}

/// Resolves a key to its live value under a shared guard.
fn live<'a>(
    data: &'a HashMap<String, StoredValue>,
    key: &str,
) -> Result<&'a StoredValue, StorageError> {
    match data.get(key) {
        None => Err(StorageError::KeyNotFound),
        Some(value) if value.is_expired() => Err(StorageError::KeyExpired),
        Some(value) => Ok(value),
    }
}

impl StorageEngine {
    /// Creates an empty keyspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes the entry if its deadline has passed. Returns true if an
    /// expired entry was evicted. Caller must hold the write guard.
    fn evict_if_expired(&self, data: &mut HashMap<String, StoredValue>, key: &str) -> bool {
        let expired = data.get(key).map(|v| v.is_expired()).unwrap_or(false);
        if expired {
            data.remove(key);
            self.expired_total.fetch_add(1, Ordering::Relaxed);
        }
        expired
    }

    // ------------------------------------------------------------------
    // generic operations
    // ------------------------------------------------------------------

    /// Returns a copy of the stored value.
    pub fn get(&self, key: &str) -> Result<StoredValue, StorageError> {
        let data = self.data.read().unwrap();
        live(&data, key).cloned()
    }

    /// Returns the string payload of a key; `WrongType` for other kinds.
    pub fn get_string(&self, key: &str) -> Result<String, StorageError> {
        let data = self.data.read().unwrap();
        match &live(&data, key)?.payload {
            Payload::String(s) => Ok(s.clone()),
            _ => Err(StorageError::WrongType),
        }
    }

    /// Stores a string, replacing whatever the key held and clearing any
    /// previous expiration.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut data = self.data.write().unwrap();
        data.insert(key.into(), StoredValue::string(value.into()));
    }

    /// Stores a string with a deadline of `ttl` from now.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        let mut value = StoredValue::string(value.into());
        value.expire_in(ttl);
        let mut data = self.data.write().unwrap();
        data.insert(key.into(), value);
    }

    /// Removes a key. Returns true if a live key was removed; an expired
    /// key is logically absent and counts as not found.
    pub fn delete(&self, key: &str) -> bool {
        let mut data = self.data.write().unwrap();
        if self.evict_if_expired(&mut data, key) {
            return false;
        }
        data.remove(key).is_some()
    }

    /// True if the key exists and has not expired.
    pub fn exists(&self, key: &str) -> bool {
        let data = self.data.read().unwrap();
        live(&data, key).is_ok()
    }

    /// The kind a live key holds.
    pub fn kind(&self, key: &str) -> Result<Kind, StorageError> {
        let data = self.data.read().unwrap();
        live(&data, key).map(StoredValue::kind)
    }

    /// Returns live keys matching `pattern`.
    ///
    /// Matching is intentionally minimal: `*` matches everything,
    /// `prefix*` matches by prefix, anything else is an exact match.
    pub fn keys(&self, pattern: &str) -> Vec<String> {
        let data = self.data.read().unwrap();
        data.iter()
            .filter(|(_, value)| !value.is_expired())
            .filter(|(key, _)| pattern_matches(pattern, key))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let data = self.data.read().unwrap();
        data.values().filter(|v| !v.is_expired()).count()
    }

    /// True if no live keys exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every key.
    pub fn clear(&self) {
        let mut data = self.data.write().unwrap();
        data.clear();
    }

    /// Sets a deadline `ttl` from now on a live key. Returns false if the
    /// key is absent or expired.
    pub fn expire(&self, key: &str, ttl: Duration) -> bool {
        let mut data = self.data.write().unwrap();
        if self.evict_if_expired(&mut data, key) {
            return false;
        }
        match data.get_mut(key) {
            Some(value) => {
                value.expire_in(ttl);
                true
            }
            None => false,
        }
    }

    /// Reports the TTL state of a key.
    pub fn ttl(&self, key: &str) -> TtlResult {
        let data = self.data.read().unwrap();
        match live(&data, key) {
            Err(_) => TtlResult::Missing,
            Ok(value) => match value.expires_at {
                None => TtlResult::NoExpiry,
                Some(deadline) => {
                    TtlResult::Remaining(deadline.saturating_duration_since(Instant::now()))
                }
            },
        }
    }

    /// Inserts a value as-is, preserving its expiration metadata. Used by
    /// the snapshot loader; normal writes go through the typed operations.
    pub fn restore(&self, key: impl Into<String>, value: StoredValue) {
        let mut data = self.data.write().unwrap();
        data.insert(key.into(), value);
    }

    /// Removes every entry past its deadline. Called by the background
    /// sweeper. Returns the number of entries removed.
    pub fn sweep_expired(&self) -> u64 {
        let mut data = self.data.write().unwrap();
        let before = data.len();
        data.retain(|_, value| !value.is_expired());
        let removed = (before - data.len()) as u64;
        if removed > 0 {
            self.expired_total.fetch_add(removed, Ordering::Relaxed);
        }
        removed
    }

    /// Engine counters.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.len(),
            expired: self.expired_total.load(Ordering::Relaxed),
        }
    }

    // ------------------------------------------------------------------
    // hash operations
    // ------------------------------------------------------------------

    /// Sets a hash field, creating the hash if the key is absent or
    /// expired. Returns true if the field was newly created.
    pub fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool, StorageError> {
        let mut data = self.data.write().unwrap();
        self.evict_if_expired(&mut data, key);
        let entry = data
            .entry(key.to_string())
            .or_insert_with(StoredValue::hash);
        match &mut entry.payload {
            Payload::Hash(hash) => Ok(hash.set(field, value)),
            _ => Err(StorageError::WrongType),
        }
    }

    /// Reads a hash field.
    pub fn hget(&self, key: &str, field: &str) -> Result<String, StorageError> {
        let data = self.data.read().unwrap();
        match &live(&data, key)?.payload {
            Payload::Hash(hash) => hash
                .get(field)
                .map(str::to_string)
                .ok_or(StorageError::FieldNotFound),
            _ => Err(StorageError::WrongType),
        }
    }

    /// Deletes a hash field. Returns true if the field existed.
    pub fn hdel(&self, key: &str, field: &str) -> Result<bool, StorageError> {
        let mut data = self.data.write().unwrap();
        if self.evict_if_expired(&mut data, key) {
            return Err(StorageError::KeyExpired);
        }
        let Some(value) = data.get_mut(key) else {
            return Err(StorageError::KeyNotFound);
        };
        match &mut value.payload {
            Payload::Hash(hash) => Ok(hash.remove(field)),
            _ => Err(StorageError::WrongType),
        }
    }

    /// True if the hash field exists.
    pub fn hexists(&self, key: &str, field: &str) -> Result<bool, StorageError> {
        let data = self.data.read().unwrap();
        match &live(&data, key)?.payload {
            Payload::Hash(hash) => Ok(hash.contains(field)),
            _ => Err(StorageError::WrongType),
        }
    }

    /// All field/value pairs of a hash.
    pub fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>, StorageError> {
        let data = self.data.read().unwrap();
        match &live(&data, key)?.payload {
            Payload::Hash(hash) => Ok(hash.entries()),
            _ => Err(StorageError::WrongType),
        }
    }

    /// All field names of a hash.
    pub fn hkeys(&self, key: &str) -> Result<Vec<String>, StorageError> {
        let data = self.data.read().unwrap();
        match &live(&data, key)?.payload {
            Payload::Hash(hash) => Ok(hash.field_names()),
            _ => Err(StorageError::WrongType),
        }
    }

    /// Number of fields in a hash.
    pub fn hlen(&self, key: &str) -> Result<usize, StorageError> {
        let data = self.data.read().unwrap();
        match &live(&data, key)?.payload {
            Payload::Hash(hash) => Ok(hash.len()),
            _ => Err(StorageError::WrongType),
        }
    }

    // ------------------------------------------------------------------
    // list operations
    // ------------------------------------------------------------------

    /// Pushes values onto the head of a list, creating it if the key is
    /// absent or expired. Each value lands at the head in argument order,
    /// so `lpush(k, [a, b])` leaves the list as `[b, a]`. Returns the new
    /// length.
    pub fn lpush(&self, key: &str, values: &[String]) -> Result<usize, StorageError> {
        let mut data = self.data.write().unwrap();
        self.evict_if_expired(&mut data, key);
        let entry = data
            .entry(key.to_string())
            .or_insert_with(StoredValue::list);
        match &mut entry.payload {
            Payload::List(list) => {
                for value in values {
                    list.push_left(value.clone());
                }
                Ok(list.len())
            }
            _ => Err(StorageError::WrongType),
        }
    }

    /// Pushes values onto the tail of a list. Returns the new length.
    pub fn rpush(&self, key: &str, values: &[String]) -> Result<usize, StorageError> {
        let mut data = self.data.write().unwrap();
        self.evict_if_expired(&mut data, key);
        let entry = data
            .entry(key.to_string())
            .or_insert_with(StoredValue::list);
        match &mut entry.payload {
            Payload::List(list) => {
                for value in values {
                    list.push_right(value.clone());
                }
                Ok(list.len())
            }
            _ => Err(StorageError::WrongType),
        }
    }

    /// Pops the head element. `KeyNotFound` covers both a missing key and
    /// an empty list.
    pub fn lpop(&self, key: &str) -> Result<String, StorageError> {
        let mut data = self.data.write().unwrap();
        if self.evict_if_expired(&mut data, key) {
            return Err(StorageError::KeyExpired);
        }
        let Some(value) = data.get_mut(key) else {
            return Err(StorageError::KeyNotFound);
        };
        match &mut value.payload {
            Payload::List(list) => list.pop_left().ok_or(StorageError::KeyNotFound),
            _ => Err(StorageError::WrongType),
        }
    }

    /// Pops the tail element.
    pub fn rpop(&self, key: &str) -> Result<String, StorageError> {
        let mut data = self.data.write().unwrap();
        if self.evict_if_expired(&mut data, key) {
            return Err(StorageError::KeyExpired);
        }
        let Some(value) = data.get_mut(key) else {
            return Err(StorageError::KeyNotFound);
        };
        match &mut value.payload {
            Payload::List(list) => list.pop_right().ok_or(StorageError::KeyNotFound),
            _ => Err(StorageError::WrongType),
        }
    }

    /// Length of a list.
    pub fn llen(&self, key: &str) -> Result<usize, StorageError> {
        let data = self.data.read().unwrap();
        match &live(&data, key)?.payload {
            Payload::List(list) => Ok(list.len()),
            _ => Err(StorageError::WrongType),
        }
    }

    /// Inclusive range of a list with negative-index support; see
    /// [`crate::storage::value::ListData::range`].
    pub fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StorageError> {
        let data = self.data.read().unwrap();
        match &live(&data, key)?.payload {
            Payload::List(list) => Ok(list.range(start, stop)),
            _ => Err(StorageError::WrongType),
        }
    }

    // ------------------------------------------------------------------
    // set operations
    // ------------------------------------------------------------------

    /// Adds members to a set, creating it if the key is absent or expired.
    /// Returns the count of genuinely new members.
    pub fn sadd(&self, key: &str, members: &[String]) -> Result<usize, StorageError> {
        let mut data = self.data.write().unwrap();
        self.evict_if_expired(&mut data, key);
        let entry = data.entry(key.to_string()).or_insert_with(StoredValue::set);
        match &mut entry.payload {
            Payload::Set(set) => {
                let mut added = 0;
                for member in members {
                    if set.add(member.clone()) {
                        added += 1;
                    }
                }
                Ok(added)
            }
            _ => Err(StorageError::WrongType),
        }
    }

    /// Removes members from a set. Returns the count actually removed.
    pub fn srem(&self, key: &str, members: &[String]) -> Result<usize, StorageError> {
        let mut data = self.data.write().unwrap();
        if self.evict_if_expired(&mut data, key) {
            return Err(StorageError::KeyExpired);
        }
        let Some(value) = data.get_mut(key) else {
            return Err(StorageError::KeyNotFound);
        };
        match &mut value.payload {
            Payload::Set(set) => {
                let mut removed = 0;
                for member in members {
                    if set.remove(member) {
                        removed += 1;
                    }
                }
                Ok(removed)
            }
            _ => Err(StorageError::WrongType),
        }
    }

    /// True if the member is in the set.
    pub fn sismember(&self, key: &str, member: &str) -> Result<bool, StorageError> {
        let data = self.data.read().unwrap();
        match &live(&data, key)?.payload {
            Payload::Set(set) => Ok(set.contains(member)),
            _ => Err(StorageError::WrongType),
        }
    }

    /// All members of a set; order unspecified.
    pub fn smembers(&self, key: &str) -> Result<Vec<String>, StorageError> {
        let data = self.data.read().unwrap();
        match &live(&data, key)?.payload {
            Payload::Set(set) => Ok(set.members()),
            _ => Err(StorageError::WrongType),
        }
    }

    /// Cardinality of a set.
    pub fn scard(&self, key: &str) -> Result<usize, StorageError> {
        let data = self.data.read().unwrap();
        match &live(&data, key)?.payload {
            Payload::Set(set) => Ok(set.len()),
            _ => Err(StorageError::WrongType),
        }
    }

    /// Intersection of the named sets.
    ///
    /// A missing or expired operand short-circuits to an empty result; a
    /// live operand of the wrong kind fails with `WrongType`. An empty key
    /// list is an empty intersection.
    pub fn sinter(&self, keys: &[String]) -> Result<Vec<String>, StorageError> {
        let data = self.data.read().unwrap();
        let mut result: Option<Vec<String>> = None;

        for key in keys {
            let set = match data.get(key.as_str()) {
                None => return Ok(Vec::new()),
                Some(value) if value.is_expired() => return Ok(Vec::new()),
                Some(value) => match &value.payload {
                    Payload::Set(set) => set,
                    _ => return Err(StorageError::WrongType),
                },
            };
            result = Some(match result {
                None => set.members(),
                Some(acc) => acc.into_iter().filter(|m| set.contains(m)).collect(),
            });
        }

        Ok(result.unwrap_or_default())
    }

    /// Union of the named sets, in first-appearance order. Missing and
    /// expired operands contribute nothing; a live operand of the wrong
    /// kind fails with `WrongType`.
    pub fn sunion(&self, keys: &[String]) -> Result<Vec<String>, StorageError> {
        let data = self.data.read().unwrap();
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for key in keys {
            let set = match data.get(key.as_str()) {
                None => continue,
                Some(value) if value.is_expired() => continue,
                Some(value) => match &value.payload {
                    Payload::Set(set) => set,
                    _ => return Err(StorageError::WrongType),
                },
            };
            for member in set.iter() {
                if seen.insert(member.clone()) {
                    out.push(member.clone());
                }
            }
        }

        Ok(out)
    }
}

/// Minimal key-pattern matching for KEYS: `*` matches everything,
/// `prefix*` matches by prefix, anything else is an exact match.
fn pattern_matches(pattern: &str, key: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}
