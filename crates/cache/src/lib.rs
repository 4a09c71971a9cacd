//! Durable file-backed cache of computed values
//!
//! This crate persists the results of expensive computations as literal data
//! files and reads them back on later runs:
//! - One record file per cache name, laid out under a storage root
//! - Whole-file values or maps of independently computed sub-keys
//! - Type-preserving, human-readable record encoding
//! - In-process memoization of decoded records
//! - Per-record locking so concurrent misses compute once
//!
//! # Overview
//!
//! ```no_run
//! use litcache::{FileCacheStore, Source, StoredValue};
//!
//! let store = FileCacheStore::open("/var/cache/myapp")?;
//!
//! // Computed on the first call, read back from `menus/main.lit` afterwards.
//! let items = store.get("menus/main", None, Source::factory(|| {
//!     StoredValue::from(vec!["home", "about"])
//! }))?;
//!
//! // Sub-keys share one file; each is computed independently.
//! let title = store.get_with("pages/42", Some("title"), || "About us".into())?;
//! # let _ = (items, title);
//! # Ok::<(), litcache::Error>(())
//! ```
//!
//! # Record files
//!
//! Records are written atomically (temporary file + rename) with a comment
//! header and a type-tagged JSON payload; see [`codec`]. A record that cannot
//! be parsed is reported as [`Error::Decode`] and left untouched rather than
//! being recomputed.
//!
//! # External caches
//!
//! The [`external`] module holds get-or-compute helpers over object caches,
//! transient stores and output capture, for hosts that provide them.

pub mod codec;
pub mod config;
mod error;
pub mod external;
pub mod lock;
pub mod memo;
pub mod path;
pub mod provision;
pub mod store;
pub mod value;

// Re-export error types at crate root
pub use error::{Error, Result};

// Re-export main types
pub use config::StoreConfig;
pub use memo::Memoizer;
pub use store::{FileCacheStore, Removed};
pub use value::{Source, StoredValue};
