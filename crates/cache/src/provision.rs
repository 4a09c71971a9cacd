//! Directory provisioning for record files
//!
//! Missing ancestors are created top-down from the nearest existing one.
//! Another process creating the same directory concurrently is not an
//! error: `AlreadyExists` counts as success as long as a directory is what
//! ended up on disk.

use crate::{Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Outcome of creating a single directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Created {
    /// This call created the directory
    New,
    /// The directory was already there (possibly created by a concurrent caller)
    Existing,
}

/// Ensure `dir` and all of its ancestors exist.
///
/// Newly created directories get permission bits `mode` on Unix. Returns the
/// directories this call created, outermost first.
pub fn ensure(dir: &Path, mode: u32) -> Result<Vec<PathBuf>> {
    if dir.is_dir() {
        return Ok(Vec::new());
    }

    // Walk up to the nearest existing ancestor.
    let mut missing = Vec::new();
    let mut cursor = Some(dir);
    while let Some(current) = cursor {
        if current.as_os_str().is_empty() || current.exists() {
            break;
        }
        missing.push(current);
        cursor = current.parent();
    }

    let mut created = Vec::new();
    for path in missing.into_iter().rev() {
        if create_one(path, mode)? == Created::New {
            created.push(path.to_path_buf());
        }
    }

    if !created.is_empty() {
        debug!(dir = %dir.display(), created = created.len(), "Provisioned cache directories");
    }
    Ok(created)
}

/// Create one directory whose parent already exists
pub fn create_one(path: &Path, mode: u32) -> Result<Created> {
    match std::fs::create_dir(path) {
        Ok(()) => {
            set_mode(path, mode)?;
            trace!(path = %path.display(), "Created directory");
            Ok(Created::New)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            if path.is_dir() {
                Ok(Created::Existing)
            } else {
                Err(Error::io(e, path, "create_dir"))
            }
        }
        Err(e) => Err(Error::io(e, path, "create_dir")),
    }
}

/// Apply permission bits to `path`; a no-op on non-Unix platforms
#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| Error::io(e, path, "chmod"))
}

/// Apply permission bits to `path`; a no-op on non-Unix platforms
#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
