//! Get-or-compute helpers over external caches
//!
//! These caches live outside the store: a keyed object cache with groups and
//! expirations, an expiring "transient" store, and a way to capture rendered
//! output. Hosts provide them through the traits here; the in-memory
//! implementations in [`memory`] cover hosts without such services.

pub mod fragment;
pub mod memory;
pub mod object;
pub mod transient;

pub use fragment::{BufferCapture, OutputCapture, get_fragment, remove_fragment};
pub use memory::{MemoryObjectCache, MemoryTransientStore};
pub use object::{ObjectCache, Producer, get_object, get_object_multiple, remove_object};
pub use transient::{TransientStore, get_transient, remove_transient};
