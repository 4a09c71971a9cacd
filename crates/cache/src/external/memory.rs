//! In-memory implementations of the external cache traits

use super::object::ObjectCache;
use super::transient::TransientStore;
use crate::value::StoredValue;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
struct Entry {
    value: StoredValue,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: StoredValue, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl
                .filter(|ttl| !ttl.is_zero())
                .and_then(|ttl| Instant::now().checked_add(ttl)),
        }
    }

    fn is_live(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() < at)
    }
}

/// Thread-safe in-memory object cache with per-entry expiration
#[derive(Debug, Default)]
pub struct MemoryObjectCache {
    entries: RwLock<HashMap<(String, String), Entry>>,
}

impl MemoryObjectCache {
    /// Creates an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet evicted
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop expired entries
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live());
        before - entries.len()
    }
}

impl ObjectCache for MemoryObjectCache {
    fn get(&self, key: &str, group: &str) -> Option<StoredValue> {
        let id = (group.to_string(), key.to_string());
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(&id) {
            if entry.is_live() {
                return Some(entry.value.clone());
            }
            entries.remove(&id);
        }
        None
    }

    fn set(&self, key: &str, value: StoredValue, group: &str, ttl: Option<Duration>) -> bool {
        self.entries
            .write()
            .insert((group.to_string(), key.to_string()), Entry::new(value, ttl));
        true
    }

    fn delete(&self, key: &str, group: &str) -> bool {
        self.entries
            .write()
            .remove(&(group.to_string(), key.to_string()))
            .is_some_and(|entry| entry.is_live())
    }
}

/// Thread-safe in-memory transient store
#[derive(Debug, Default)]
pub struct MemoryTransientStore {
    inner: MemoryObjectCache,
}

impl MemoryTransientStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransientStore for MemoryTransientStore {
    fn get(&self, key: &str) -> Option<StoredValue> {
        self.inner.get(key, "")
    }

    fn set(&self, key: &str, value: StoredValue, ttl: Option<Duration>) -> bool {
        self.inner.set(key, value, "", ttl)
    }

    fn delete(&self, key: &str) -> bool {
        self.inner.delete(key, "")
    }
}
