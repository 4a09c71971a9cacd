//! File-backed cache store
//!
//! Each cache name maps to one record file under the storage root. A record
//! holds either a single value (whole-file mode) or a map of sub-keys to
//! values (sub-key mode). Decoded records are memoized per store and the
//! memo entry for a path is dropped after every write to it.
//!
//! Hits are served without locking. A miss takes the record lock, then
//! re-reads the record from disk before computing anything.

use crate::codec;
use crate::config::StoreConfig;
use crate::lock::{LOCK_DIR, PathLocks};
use crate::memo::Memoizer;
use crate::path;
use crate::provision;
use crate::value::{Source, StoredValue};
use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

/// Outcome of a [`FileCacheStore::remove`] call: every path the store tried
/// to delete, with whether the deletion succeeded
pub type Removed = BTreeMap<PathBuf, bool>;

/// Durable cache of computed values, one record file per cache name
#[derive(Debug)]
pub struct FileCacheStore {
    config: StoreConfig,
    memo: Memoizer,
    locks: PathLocks,
}

impl FileCacheStore {
    /// Create a store from `config`
    ///
    /// The storage root is created lazily on the first write.
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let lock_dir = config.lock_files.then(|| config.root.join(LOCK_DIR));
        let locks = PathLocks::new(lock_dir, config.dir_mode);
        Ok(Self {
            config,
            memo: Memoizer::new(),
            locks,
        })
    }

    /// Create a store rooted at `root` with default settings
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Self::new(StoreConfig::new(root))
    }

    /// Create a store rooted at the first writable default location
    pub fn from_env() -> Result<Self> {
        Self::new(StoreConfig::from_env()?)
    }

    /// Storage root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Record file path for `name`
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        check_reserved(name)?;
        path::resolve(&self.config.root, name, &self.config.extension)
    }

    /// Whether a record file exists for `name`
    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.path_for(name)?.is_file())
    }

    /// Return the cached value for `name` (and `key`), computing and
    /// persisting it from `source` on a miss.
    ///
    /// With `key` of `None` the whole record is the value. With a key, the
    /// record is a map and only that entry is read or added; other entries
    /// are preserved.
    pub fn get<F>(&self, name: &str, key: Option<&str>, source: Source<F>) -> Result<StoredValue>
    where
        F: FnOnce() -> StoredValue,
    {
        self.get_inner(name, key, move || Ok(source.resolve()))
    }

    /// [`get`](Self::get) with a factory
    pub fn get_with<F>(&self, name: &str, key: Option<&str>, factory: F) -> Result<StoredValue>
    where
        F: FnOnce() -> StoredValue,
    {
        self.get(name, key, Source::Factory(factory))
    }

    /// [`get`](Self::get) with a ready value
    pub fn get_or_insert(
        &self,
        name: &str,
        key: Option<&str>,
        value: impl Into<StoredValue>,
    ) -> Result<StoredValue> {
        self.get(name, key, Source::literal(value))
    }

    /// Typed variant of [`get_with`](Self::get_with)
    ///
    /// The factory's result must convert to a [`StoredValue`]; a cached
    /// value that does not deserialize into `T` is reported as
    /// [`Error::Decode`].
    pub fn get_typed<T, F>(&self, name: &str, key: Option<&str>, factory: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        let value = self.get_inner(name, key, || StoredValue::from_serialize(&factory()))?;
        value
            .deserialize_into()
            .map_err(|e| Error::decode(self.path_for(name).unwrap_or_default(), e))
    }

    fn get_inner<F>(&self, name: &str, key: Option<&str>, produce: F) -> Result<StoredValue>
    where
        F: FnOnce() -> Result<StoredValue>,
    {
        let path = self.path_for(name)?;

        // Hits are served without the record lock.
        if path.is_file() {
            let record = self.load(&path)?;
            let Some(sub) = key else {
                return Ok(record);
            };
            if let Some(value) = record.get(sub) {
                trace!(name, key = sub, "Cache hit");
                return Ok(value.clone());
            }
        }

        let _guard = self.locks.acquire(&self.lock_key(&path))?;

        // Another writer may have stored the record while we waited.
        let current = if path.is_file() {
            Some(self.reload(&path)?)
        } else {
            None
        };

        match (current, key) {
            (Some(record), None) => Ok(record),
            (Some(StoredValue::Map(mut map)), Some(key)) => {
                if let Some(value) = map.get(key) {
                    return Ok(value.clone());
                }
                trace!(name, key, "Cache miss for key");
                let value = produce()?;
                map.insert(key.to_string(), value.clone());
                self.write(&path, &StoredValue::Map(map))?;
                Ok(value)
            }
            (current, key) => {
                if let Some(other) = &current {
                    warn!(
                        name,
                        key,
                        found = other.type_name(),
                        "Record is not a map; replacing it with a keyed record"
                    );
                } else {
                    trace!(name, key, "Cache miss");
                }

                let value = produce()?;
                let record = match key {
                    Some(key) => {
                        StoredValue::Map(BTreeMap::from([(key.to_string(), value.clone())]))
                    }
                    None => value.clone(),
                };
                self.write(&path, &record)?;
                Ok(value)
            }
        }
    }

    /// Record path relative to the storage root, used to key locks
    fn lock_key(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.config.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Read `path` from disk, bypassing any memoized copy
    fn reload(&self, path: &Path) -> Result<StoredValue> {
        self.memo.invalidate(path);
        self.load(path)
    }

    fn load(&self, path: &Path) -> Result<StoredValue> {
        let read = |p: &Path| {
            debug!(path = %p.display(), "Loading record");
            codec::read_record(p)
        };
        if self.config.memoize {
            self.memo.load(path, read)
        } else {
            read(path)
        }
    }

    /// Encode and atomically replace the record at `path`
    fn write(&self, path: &Path, record: &StoredValue) -> Result<()> {
        let text = codec::encode(record)?;
        let dir = path
            .parent()
            .ok_or_else(|| Error::configuration(format!("{} has no parent", path.display())))?;
        provision::ensure(dir, self.config.dir_mode)?;

        let result = self.replace(dir, path, &text);
        self.memo.invalidate(path);
        result?;

        debug!(path = %path.display(), bytes = text.len(), "Record written");
        Ok(())
    }

    fn replace(&self, dir: &Path, path: &Path, text: &str) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(e, dir, "create_temp"))?;
        tmp.write_all(text.as_bytes())
            .map_err(|e| Error::io(e, tmp.path(), "write"))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| Error::io(e, tmp.path(), "sync"))?;
        provision::set_mode(tmp.path(), self.config.file_mode)?;
        tmp.persist(path)
            .map_err(|e| Error::io(e.error, path, "rename"))?;
        Ok(())
    }

    /// Delete cached records
    ///
    /// `None` deletes nothing. A name that resolves to a directory deletes
    /// the files and empty directories directly inside it, then the
    /// directory itself; deeper levels are not descended into, so a
    /// non-empty subdirectory is reported as a failed deletion. Otherwise
    /// the record file for the name is deleted. Missing targets yield an
    /// empty result.
    pub fn remove(&self, name: Option<&str>) -> Result<Removed> {
        let mut removed = Removed::new();
        let Some(name) = name else {
            return Ok(removed);
        };

        check_reserved(name)?;
        let target = path::resolve_target(&self.config.root, name)?;
        if target.is_dir() {
            self.remove_dir(&target, &mut removed);
            return Ok(removed);
        }

        let file = self.path_for(name)?;
        if file.is_file() {
            let ok = self.delete_record(&file)?;
            removed.insert(file, ok);
        }
        Ok(removed)
    }

    /// Delete one record file under its lock, then drop its lock file
    fn delete_record(&self, file: &Path) -> Result<bool> {
        let mut guard = self.locks.acquire(&self.lock_key(file))?;
        let ok = record_outcome(file, fs::remove_file(file));
        self.memo.invalidate(file);
        if ok {
            guard.discard();
        }
        Ok(ok)
    }

    fn is_record(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext == self.config.extension.as_str())
    }

    fn remove_dir(&self, dir: &Path, removed: &mut Removed) {
        let mut children: Vec<PathBuf> = match fs::read_dir(dir) {
            Ok(entries) => entries.filter_map(|e| e.ok().map(|e| e.path())).collect(),
            Err(e) => {
                warn!(dir = %dir.display(), "Failed to list cache directory: {e}");
                Vec::new()
            }
        };
        children.sort();

        for child in children {
            let ok = match fs::symlink_metadata(&child) {
                Ok(meta) if meta.is_dir() => record_outcome(&child, fs::remove_dir(&child)),
                Ok(_) if self.is_record(&child) => {
                    self.delete_record(&child).unwrap_or_else(|e| {
                        warn!(path = %child.display(), "Record lock unavailable: {e}");
                        record_outcome(&child, fs::remove_file(&child))
                    })
                }
                Ok(_) => record_outcome(&child, fs::remove_file(&child)),
                Err(e) => record_outcome(&child, Err(e)),
            };
            removed.insert(child, ok);
        }

        let ok = record_outcome(dir, fs::remove_dir(dir));
        removed.insert(dir.to_path_buf(), ok);
        self.memo.invalidate_prefix(dir);
    }

    /// Drop the memoized record for `name` so the next read goes to disk
    pub fn invalidate(&self, name: &str) -> Result<bool> {
        Ok(self.memo.invalidate(&self.path_for(name)?))
    }

    /// Drop every memoized record
    pub fn clear_memo(&self) {
        self.memo.clear();
    }

    /// Number of memoized records
    #[must_use]
    pub fn memoized(&self) -> usize {
        self.memo.len()
    }
}

fn check_reserved(name: &str) -> Result<()> {
    if name.split('/').next() == Some(LOCK_DIR) {
        return Err(Error::invalid_name(name, "reserved for lock files"));
    }
    Ok(())
}

fn record_outcome(path: &Path, outcome: std::io::Result<()>) -> bool {
    match outcome {
        Ok(()) => {
            debug!(path = %path.display(), "Removed");
            true
        }
        Err(e) => {
            warn!(path = %path.display(), "Failed to remove: {e}");
            false
        }
    }
}
