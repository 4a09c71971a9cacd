//! Error types for the cache store

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for cache store operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The cache name would resolve outside the storage root
    #[error("Invalid cache name {name:?}: {reason}")]
    #[diagnostic(
        code(litcache::invalid_name),
        help("Cache names are relative, slash-separated and may not contain '.' or '..' segments")
    )]
    InvalidName {
        /// The rejected cache name
        name: String,
        /// Why the name was rejected
        reason: String,
    },

    /// I/O error during cache operations
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(litcache::io),
        help("Check file permissions and that no regular file sits where a directory is expected")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path being operated on, when one is involved
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write", "create_dir")
        operation: String,
    },

    /// A record file exists but could not be parsed
    #[error("Corrupt cache record {}: {message}", path.display())]
    #[diagnostic(
        code(litcache::decode),
        help("The record was not written by this store or has been modified; remove it to recompute")
    )]
    Decode {
        /// Path of the unreadable record
        path: Box<Path>,
        /// Error message describing the parse failure
        message: String,
    },

    /// The value cannot be represented as a stored value
    #[error("Unsupported value: {message}")]
    #[diagnostic(code(litcache::unsupported_value))]
    UnsupportedValue {
        /// Error message describing the unsupported value
        message: String,
    },

    /// Invalid store settings, or no usable storage root
    #[error("Store configuration error: {message}")]
    #[diagnostic(
        code(litcache::config),
        help("Set LITCACHE_DIR to a writable directory")
    )]
    Configuration {
        /// What is wrong with the settings
        message: String,
    },
}

impl Error {
    /// Create an invalid name error
    #[must_use]
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create an I/O error without path context
    #[must_use]
    pub fn io_no_path(source: std::io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: None,
            operation: operation.into(),
        }
    }

    /// Create a decode error for the record at `path`
    #[must_use]
    pub fn decode(path: impl AsRef<Path>, msg: impl Into<String>) -> Self {
        Self::Decode {
            path: path.as_ref().into(),
            message: msg.into(),
        }
    }

    /// Create an unsupported value error
    #[must_use]
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedValue {
            message: msg.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Whether this error reports a corrupt record
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display_includes_path() {
        let err = Error::io(
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            "/tmp/store/a.lit",
            "write",
        );
        assert_eq!(err.to_string(), "I/O write failed: /tmp/store/a.lit");
    }

    #[test]
    fn test_io_error_display_without_path() {
        let err = Error::io_no_path(std::io::Error::other("boom"), "lock");
        assert_eq!(err.to_string(), "I/O lock failed");
    }

    #[test]
    fn test_decode_error_is_decode() {
        let err = Error::decode("/tmp/a.lit", "expected value");
        assert!(err.is_decode());
        assert!(err.to_string().contains("/tmp/a.lit"));
        assert!(!Error::unsupported("nan").is_decode());
    }

    #[test]
    fn test_invalid_name_display() {
        let err = Error::invalid_name("../etc", "parent segment");
        assert_eq!(
            err.to_string(),
            "Invalid cache name \"../etc\": parent segment"
        );
    }
}
