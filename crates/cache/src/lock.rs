//! Per-record mutual exclusion
//!
//! Two layers guard each record:
//! - an in-process mutex keyed by record, owned by the store, so threads
//!   sharing one store serialize their miss-compute-write sequences;
//! - an advisory exclusive file lock under `<root>/.locks/`, for other
//!   processes. Advisory locks are not guaranteed to exclude threads of the
//!   same process on every platform, hence the first layer.
//!
//! Records are identified by their path relative to the storage root, so
//! stores that reach one root through different spellings (symlinks,
//! relative paths) agree on the lock file.

use crate::provision;
use crate::{Error, Result};
use fs4::fs_std::FileExt;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Directory under the storage root holding lock files
pub const LOCK_DIR: &str = ".locks";

/// Table of per-record locks
#[derive(Debug)]
pub struct PathLocks {
    lock_dir: Option<PathBuf>,
    dir_mode: u32,
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PathLocks {
    /// Create a lock table. `lock_dir` of `None` disables file locks.
    #[must_use]
    pub fn new(lock_dir: Option<PathBuf>, dir_mode: u32) -> Self {
        Self {
            lock_dir,
            dir_mode,
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Block until the record `key` is exclusively held by the caller
    ///
    /// `key` is the record path relative to the storage root, with `/`
    /// separators.
    pub fn acquire(&self, key: &str) -> Result<PathGuard<'_>> {
        let mutex = Arc::clone(
            self.table
                .lock()
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        );
        let mut guard = PathGuard {
            locks: self,
            key: key.to_string(),
            file: None,
            lock_path: None,
            guard: Some(mutex.lock_arc()),
        };

        // On failure the partially built guard still prunes the table entry.
        if let Some(dir) = &self.lock_dir {
            let lock_path = dir.join(lock_file_name(key));
            guard.file = Some(self.lock_file(dir, &lock_path)?);
            guard.lock_path = Some(lock_path);
        }
        trace!(key, "Acquired record lock");
        Ok(guard)
    }

    /// Number of records currently tracked
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.table.lock().len()
    }

    fn lock_file(&self, dir: &Path, lock_path: &Path) -> Result<File> {
        provision::ensure(dir, self.dir_mode)?;
        loop {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .read(true)
                .write(true)
                .open(lock_path)
                .map_err(|e| Error::io(e, lock_path, "open_lock"))?;
            file.lock_exclusive()
                .map_err(|e| Error::io(e, lock_path, "lock"))?;

            // A holder may have discarded the file while we waited on it.
            if still_linked(&file, lock_path) {
                return Ok(file);
            }
            let _ = FileExt::unlock(&file);
        }
    }

    fn release(&self, key: &str) {
        let mut table = self.table.lock();
        if table
            .get(key)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            table.remove(key);
        }
    }
}

/// Exclusive hold on one record; released on drop
pub struct PathGuard<'a> {
    locks: &'a PathLocks,
    key: String,
    file: Option<File>,
    lock_path: Option<PathBuf>,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl PathGuard<'_> {
    /// Delete the lock file while it is still held
    ///
    /// Used once the record itself is gone. Waiters blocked on the old file
    /// notice it was unlinked and retry on a fresh one.
    pub fn discard(&mut self) {
        if let Some(lock_path) = self.lock_path.take() {
            match fs::remove_file(&lock_path) {
                Ok(()) => debug!(path = %lock_path.display(), "Removed lock file"),
                Err(e) => debug!(path = %lock_path.display(), "Lock file not removed: {e}"),
            }
        }
    }
}

impl fmt::Debug for PathGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathGuard")
            .field("key", &self.key)
            .field("lock_path", &self.lock_path)
            .finish_non_exhaustive()
    }
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = FileExt::unlock(&file);
        }
        // Drop the mutex (and its Arc) before pruning the table entry.
        self.guard.take();
        self.locks.release(&self.key);
    }
}

fn lock_file_name(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{}.lock", hex::encode(&digest[..16]))
}

#[cfg(unix)]
fn still_linked(file: &File, lock_path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), fs::metadata(lock_path)) {
        (Ok(held), Ok(current)) => held.dev() == current.dev() && held.ino() == current.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn still_linked(_file: &File, lock_path: &Path) -> bool {
    lock_path.exists()
}
