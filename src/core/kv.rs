//! Thread-safe key-value store owned by the daemon context and by each node.
//!
//! Entries live in an insertion-ordered `Vec` behind one mutex. Keys compare
//! ASCII case-insensitively everywhere, and duplicate keys may coexist: a
//! lookup returns the most recently inserted match. Callers that need a
//! read-then-act sequence take a [`KvGuard`] with [`KeyValueStore::lock`] and
//! do the whole sequence under one lock.

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};

use crate::core::errors::{MonError, Result};

/// Tagged value stored under a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Uint(u64),
    Str(String),
    Time(DateTime<Utc>),
    Bytes(Vec<u8>),
}

impl Value {
    #[must_use]
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Self::Uint(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Time(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Overwrite `self` with `new`, reusing the byte buffer when both sides
    /// are payloads of the same length.
    fn overwrite(&mut self, new: Self) {
        match (self, new) {
            (Self::Bytes(old), Self::Bytes(new)) if old.len() == new.len() => {
                old.copy_from_slice(&new);
            }
            (slot, new) => *slot = new,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
            Self::Time(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// Stable handle to one entry. Ids are never reused within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u64);

impl EntryId {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Snapshot of an entry returned by lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: EntryId,
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<Entry>,
    next_id: u64,
}

impl Inner {
    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|entry| entry.key.eq_ignore_ascii_case(key))
    }

    fn position_of(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    fn put(&mut self, key: &str, value: Value) -> Result<EntryId> {
        self.entries
            .try_reserve(1)
            .map_err(|_| MonError::Allocation { context: "kv put" })?;
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            key: key.to_string(),
            value,
        });
        Ok(id)
    }

    fn get(&self, key: &str) -> Option<Entry> {
        self.position(key).map(|idx| self.entries[idx].clone())
    }

    fn replace(&mut self, id: EntryId, value: Value) -> Result<()> {
        let idx = self
            .position_of(id)
            .ok_or(MonError::MissingEntry { id: id.raw() })?;
        self.entries[idx].value.overwrite(value);
        Ok(())
    }

    fn remove(&mut self, id: EntryId) -> Option<Value> {
        let idx = self.position_of(id)?;
        Some(self.entries.remove(idx).value)
    }

    fn take(&mut self, key: &str) -> Option<Entry> {
        let idx = self.position(key)?;
        Some(self.entries.remove(idx))
    }

    fn set(&mut self, key: &str, value: Value) -> Result<EntryId> {
        match self.position(key) {
            Some(idx) => {
                self.entries[idx].value.overwrite(value);
                Ok(self.entries[idx].id)
            }
            None => self.put(key, value),
        }
    }
}

/// Mutex-guarded store of typed attributes.
#[derive(Debug, Default)]
pub struct KeyValueStore {
    inner: Mutex<Inner>,
}

impl KeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry without checking for an existing key.
    pub fn put(&self, key: &str, value: Value) -> Result<EntryId> {
        self.inner.lock().put(key, value)
    }

    /// Most recently inserted entry whose key matches, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Entry> {
        self.inner.lock().get(key)
    }

    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.get(key).map(|entry| entry.value)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().position(key).is_some()
    }

    /// Update the value of an existing entry.
    pub fn replace(&self, id: EntryId, value: Value) -> Result<()> {
        self.inner.lock().replace(id, value)
    }

    /// Detach an entry, returning its value.
    pub fn remove(&self, id: EntryId) -> Option<Value> {
        self.inner.lock().remove(id)
    }

    /// Find and remove the newest matching entry in one step.
    pub fn take(&self, key: &str) -> Option<Entry> {
        self.inner.lock().take(key)
    }

    /// Replace the newest matching entry, or insert one.
    pub fn set(&self, key: &str, value: Value) -> Result<EntryId> {
        self.inner.lock().set(key, value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Hold the store lock across several operations.
    pub fn lock(&self) -> KvGuard<'_> {
        KvGuard {
            inner: self.inner.lock(),
        }
    }
}

/// Exclusive access to a [`KeyValueStore`] for multi-step updates.
pub struct KvGuard<'a> {
    inner: MutexGuard<'a, Inner>,
}

impl KvGuard<'_> {
    pub fn put(&mut self, key: &str, value: Value) -> Result<EntryId> {
        self.inner.put(key, value)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Entry> {
        self.inner.get(key)
    }

    pub fn replace(&mut self, id: EntryId, value: Value) -> Result<()> {
        self.inner.replace(id, value)
    }
}
