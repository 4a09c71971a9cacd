//! In-process memo of decoded records

use crate::Result;
use crate::value::StoredValue;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Thread-safe map from record path to its last decoded value
///
/// Entries reflect what this process last read or wrote. Writes by other
/// processes are not observed until the entry is invalidated.
#[derive(Debug, Default)]
pub struct Memoizer {
    entries: RwLock<HashMap<PathBuf, StoredValue>>,
}

impl Memoizer {
    /// Creates an empty memo
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the memoized value for `path`, decoding it on first use.
    ///
    /// Only a successful decode is remembered.
    pub fn load<F>(&self, path: &Path, decode: F) -> Result<StoredValue>
    where
        F: FnOnce(&Path) -> Result<StoredValue>,
    {
        if let Some(value) = self.entries.read().get(path) {
            trace!(path = %path.display(), "Memo hit");
            return Ok(value.clone());
        }

        let value = decode(path)?;
        self.entries.write().insert(path.to_path_buf(), value.clone());
        Ok(value)
    }

    /// Peek at the memoized value without decoding
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<StoredValue> {
        self.entries.read().get(path).cloned()
    }

    /// Drop the entry for `path`
    pub fn invalidate(&self, path: &Path) -> bool {
        self.entries.write().remove(path).is_some()
    }

    /// Drop every entry at or below `dir`
    pub fn invalidate_prefix(&self, dir: &Path) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|path, _| !path.starts_with(dir));
        before - entries.len()
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of memoized records
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is memoized
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
