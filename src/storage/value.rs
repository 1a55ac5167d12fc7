//! The stored value model.
//!
//! Every key maps to exactly one [`StoredValue`]: a tagged payload plus
//! expiration metadata. The payload is one of four container kinds, each
//! encapsulating its own data and accessors. Because the tag and the data
//! live in the same enum variant, a kind/payload mismatch is unrepresentable
//! and every operation type-checks by matching.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

/// The kind of value a key holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    String,
    Hash,
    List,
    Set,
}

impl Kind {
    /// The name reported by the TYPE command.
    pub fn name(&self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Hash => "hash",
            Kind::List => "list",
            Kind::Set => "set",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A hash payload: field → value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashData {
    fields: HashMap<String, String>,
}

impl HashData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field. Returns true if the field was newly created.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) -> bool {
        self.fields.insert(field.into(), value.into()).is_none()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Removes a field. Returns true if it existed.
    pub fn remove(&mut self, field: &str) -> bool {
        self.fields.remove(field).is_some()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// All field/value pairs, copied out.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|(f, v)| (f.clone(), v.clone()))
            .collect()
    }

    /// All field names, copied out.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, String)> for HashData {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// A list payload: an ordered sequence with O(1) push/pop at both ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListData {
    elements: VecDeque<String>,
}

impl ListData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_left(&mut self, element: impl Into<String>) {
        self.elements.push_front(element.into());
    }

    pub fn push_right(&mut self, element: impl Into<String>) {
        self.elements.push_back(element.into());
    }

    pub fn pop_left(&mut self) -> Option<String> {
        self.elements.pop_front()
    }

    pub fn pop_right(&mut self) -> Option<String> {
        self.elements.pop_back()
    }

    /// Returns the inclusive range `[start, stop]`, where negative indices
    /// count back from the end (`-1` is the last element). Out-of-bounds
    /// indices are clamped; an inverted range is empty.
    pub fn range(&self, start: i64, stop: i64) -> Vec<String> {
        let len = self.elements.len() as i64;
        if len == 0 {
            return Vec::new();
        }

        let mut start = if start < 0 { len + start } else { start };
        let mut stop = if stop < 0 { len + stop } else { stop };

        if start < 0 {
            start = 0;
        }
        if stop >= len {
            stop = len - 1;
        }
        if start > stop || start >= len {
            return Vec::new();
        }

        self.elements
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// All elements in order, copied out.
    pub fn snapshot(&self) -> Vec<String> {
        self.elements.iter().cloned().collect()
    }
}

impl FromIterator<String> for ListData {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

/// A set payload: unique members, no ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetData {
    members: HashSet<String>,
}

impl SetData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member. Returns true only if it was not already present.
    pub fn add(&mut self, member: impl Into<String>) -> bool {
        self.members.insert(member.into())
    }

    /// Removes a member. Returns true if it was present.
    pub fn remove(&mut self, member: &str) -> bool {
        self.members.remove(member)
    }

    pub fn contains(&self, member: &str) -> bool {
        self.members.contains(member)
    }

    /// All members, copied out. Iteration order is unspecified.
    pub fn members(&self) -> Vec<String> {
        self.members.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl FromIterator<String> for SetData {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

/// The tagged payload union: one variant per kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    String(String),
    Hash(HashData),
    List(ListData),
    Set(SetData),
}

impl Payload {
    pub fn kind(&self) -> Kind {
        match self {
            Payload::String(_) => Kind::String,
            Payload::Hash(_) => Kind::Hash,
            Payload::List(_) => Kind::List,
            Payload::Set(_) => Kind::Set,
        }
    }
}

/// A value as stored in the keyspace: payload plus expiration metadata.
///
/// `expires_at == None` means the value never expires. A value whose
/// deadline has passed is logically absent; every read path must treat it
/// as not found.
#[derive(Debug, Clone)]
pub struct StoredValue {
    pub payload: Payload,
    pub expires_at: Option<Instant>,
    pub created_at: Instant,
}

impl StoredValue {
    /// Creates a string value with no expiration.
    pub fn string(data: impl Into<String>) -> Self {
        Self::from_payload(Payload::String(data.into()))
    }

    /// Creates an empty hash value.
    pub fn hash() -> Self {
        Self::from_payload(Payload::Hash(HashData::new()))
    }

    /// Creates an empty list value.
    pub fn list() -> Self {
        Self::from_payload(Payload::List(ListData::new()))
    }

    /// Creates an empty set value.
    pub fn set() -> Self {
        Self::from_payload(Payload::Set(SetData::new()))
    }

    /// Wraps a payload with no expiration.
    pub fn from_payload(payload: Payload) -> Self {
        Self {
            payload,
            expires_at: None,
            created_at: Instant::now(),
        }
    }

    /// Wraps a payload with an explicit deadline. Used by the snapshot
    /// loader, which must preserve the original expiration.
    pub fn with_deadline(payload: Payload, expires_at: Option<Instant>) -> Self {
        Self {
            payload,
            expires_at,
            created_at: Instant::now(),
        }
    }

    /// Sets the deadline `ttl` from now.
    pub fn expire_in(&mut self, ttl: Duration) {
        self.expires_at = Some(Instant::now() + ttl);
    }

    pub fn kind(&self) -> Kind {
        self.payload.kind()
    }

    /// True once the deadline has passed.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }
}
