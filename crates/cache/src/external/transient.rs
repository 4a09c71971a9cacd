//! Expiring value ("transient") capability

use crate::value::StoredValue;
use std::time::Duration;
use tracing::debug;

/// Store of values that expire after a time-to-live
///
/// Site-wide and per-site transients are two instances of this trait.
pub trait TransientStore {
    /// Look up `key`; `None` when absent or expired
    fn get(&self, key: &str) -> Option<StoredValue>;

    /// Store `value` under `key`
    fn set(&self, key: &str, value: StoredValue, ttl: Option<Duration>) -> bool;

    /// Delete `key`, returning whether it existed
    fn delete(&self, key: &str) -> bool;
}

/// Return the transient for `key`, computing it on a miss
///
/// A factory error is handed back to the caller and nothing is stored, so
/// the next call retries the computation.
pub fn get_transient<S, F, E>(
    store: &S,
    key: &str,
    ttl: Option<Duration>,
    factory: F,
) -> Result<StoredValue, E>
where
    S: TransientStore + ?Sized,
    F: FnOnce() -> Result<StoredValue, E>,
{
    if let Some(value) = store.get(key) {
        return Ok(value);
    }
    match factory() {
        Ok(value) => {
            store.set(key, value.clone(), ttl);
            Ok(value)
        }
        Err(e) => {
            debug!(key, "Transient factory failed; not caching");
            Err(e)
        }
    }
}

/// Take `key` out of the store, or return `default` when absent
pub fn remove_transient<S>(store: &S, key: &str, default: StoredValue) -> StoredValue
where
    S: TransientStore + ?Sized,
{
    match store.get(key) {
        Some(value) => {
            store.delete(key);
            value
        }
        None => default,
    }
}
