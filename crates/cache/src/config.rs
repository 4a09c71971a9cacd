//! Store configuration and storage root resolution

use crate::{Error, Result};
use dirs::{cache_dir, home_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension appended to every record file
pub const DEFAULT_EXTENSION: &str = "lit";
/// Permission bits applied to record files after every write
pub const DEFAULT_FILE_MODE: u32 = 0o777;
/// Permission bits applied to directories created by the store
pub const DEFAULT_DIR_MODE: u32 = 0o775;
/// Environment variable overriding the storage root
pub const ROOT_ENV: &str = "LITCACHE_DIR";

/// Configuration for a [`FileCacheStore`](crate::FileCacheStore)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory under which all records live
    pub root: PathBuf,
    /// Record file extension, without the leading dot
    pub extension: String,
    /// Permission bits for record files
    pub file_mode: u32,
    /// Permission bits for created directories
    pub dir_mode: u32,
    /// Keep decoded records in memory between calls
    pub memoize: bool,
    /// Take advisory file locks for cross-process exclusion
    pub lock_files: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            extension: DEFAULT_EXTENSION.to_string(),
            file_mode: DEFAULT_FILE_MODE,
            dir_mode: DEFAULT_DIR_MODE,
            memoize: true,
            lock_files: true,
        }
    }
}

impl StoreConfig {
    /// Configuration rooted at `root` with default settings
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Configuration rooted at the first writable default location
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(default_root()?))
    }

    /// Set the record file extension
    #[must_use]
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Set permission bits for record files
    #[must_use]
    pub fn file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    /// Set permission bits for created directories
    #[must_use]
    pub fn dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }

    /// Enable or disable in-process memoization
    #[must_use]
    pub fn memoize(mut self, enabled: bool) -> Self {
        self.memoize = enabled;
        self
    }

    /// Enable or disable cross-process file locks
    #[must_use]
    pub fn lock_files(mut self, enabled: bool) -> Self {
        self.lock_files = enabled;
        self
    }

    /// Check the settings before a store is built
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(Error::configuration("storage root is not set"));
        }
        if self.extension.starts_with('.') || self.extension.contains(['/', '\\']) {
            return Err(Error::configuration(format!(
                "extension {:?} must not start with a dot or contain path separators",
                self.extension
            )));
        }
        if self.file_mode > 0o7777 || self.dir_mode > 0o7777 {
            return Err(Error::configuration("permission bits out of range"));
        }
        Ok(())
    }
}

/// Inputs for determining the default storage root
#[derive(Debug, Clone)]
struct RootInputs {
    override_dir: Option<PathBuf>,
    xdg_cache_home: Option<PathBuf>,
    os_cache_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
    temp_dir: PathBuf,
}

fn root_from_inputs(inputs: RootInputs) -> Result<PathBuf> {
    let RootInputs {
        override_dir,
        xdg_cache_home,
        os_cache_dir,
        home_dir,
        temp_dir,
    } = inputs;

    override_dir
        .filter(|dir| !dir.as_os_str().is_empty())
        .into_iter()
        .chain(xdg_cache_home.map(|dir| dir.join("litcache")))
        .chain(os_cache_dir.map(|dir| dir.join("litcache")))
        .chain(home_dir.map(|dir| dir.join(".litcache").join("cache")))
        .chain(std::iter::once(temp_dir.join("litcache")))
        .find(|candidate| usable_root(candidate))
        .ok_or_else(|| Error::configuration("no writable storage root found"))
}

/// Whether `dir` can hold records, creating it when missing
///
/// Nix build sandboxes point `HOME` at `/homeless-shelter`, which never exists.
fn usable_root(dir: &Path) -> bool {
    if dir.starts_with("/homeless-shelter") {
        return false;
    }
    if !dir.exists() {
        return std::fs::create_dir_all(dir).is_ok();
    }
    // Existing cache dirs may be read-only (some CI images mount them so).
    let writable = tempfile::tempfile_in(dir).is_ok();
    if !writable {
        debug!(dir = %dir.display(), "Skipping read-only storage root candidate");
    }
    writable
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

/// Resolve the default storage root from the environment
pub fn default_root() -> Result<PathBuf> {
    root_from_inputs(RootInputs {
        override_dir: env_path(ROOT_ENV),
        xdg_cache_home: env_path("XDG_CACHE_HOME"),
        os_cache_dir: cache_dir(),
        home_dir: home_dir(),
        temp_dir: std::env::temp_dir(),
    })
}
