//! Cache name to file path resolution

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Validate `name` and join its segments onto `root`, without an extension.
///
/// Used for targets that may be either a directory or a record.
pub fn resolve_target(root: &Path, name: &str) -> Result<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in segments(name)? {
        path.push(segment);
    }
    Ok(path)
}

/// Resolve the record file for `name` under `root`.
///
/// `extension` is appended to the final segment rather than replacing any
/// dot-suffix the name already has, so `reports/2024.q1` maps to
/// `reports/2024.q1.<ext>`.
pub fn resolve(root: &Path, name: &str, extension: &str) -> Result<PathBuf> {
    let mut path = resolve_target(root, name)?;
    if !extension.is_empty() {
        let mut file = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
        file.push(".");
        file.push(extension);
        path.set_file_name(file);
    }
    Ok(path)
}

fn segments(name: &str) -> Result<Vec<&str>> {
    if name.is_empty() {
        return Err(Error::invalid_name(name, "name is empty"));
    }
    if name.starts_with('/') {
        return Err(Error::invalid_name(name, "name must be relative"));
    }
    if name.contains('\\') {
        return Err(Error::invalid_name(name, "backslashes are not allowed"));
    }
    if name.contains('\0') {
        return Err(Error::invalid_name(name, "NUL bytes are not allowed"));
    }

    // A single trailing slash is tolerated for directory-style names.
    let trimmed = name.strip_suffix('/').unwrap_or(name);
    let parts: Vec<&str> = trimmed.split('/').collect();
    for part in &parts {
        match *part {
            "" => return Err(Error::invalid_name(name, "empty path segment")),
            "." => return Err(Error::invalid_name(name, "'.' segments are not allowed")),
            ".." => return Err(Error::invalid_name(name, "'..' segments are not allowed")),
            _ => {}
        }
        // Windows drive prefixes such as `C:` would make the join absolute.
        if cfg!(windows) && part.contains(':') {
            return Err(Error::invalid_name(name, "drive prefixes are not allowed"));
        }
    }
    Ok(parts)
}
