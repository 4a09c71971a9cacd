//! Object cache capability

use crate::value::StoredValue;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::trace;

/// A deferred value for [`get_object_multiple`]
pub type Producer<'a> = Box<dyn FnOnce() -> StoredValue + 'a>;

/// Keyed cache with groups and optional expirations
///
/// A `ttl` of `None` (or zero) keeps the entry as long as the backend allows.
pub trait ObjectCache {
    /// Look up `key` in `group`; `None` when absent
    fn get(&self, key: &str, group: &str) -> Option<StoredValue>;

    /// Store `value` under `key` in `group`
    fn set(&self, key: &str, value: StoredValue, group: &str, ttl: Option<Duration>) -> bool;

    /// Delete `key` from `group`, returning whether it existed
    fn delete(&self, key: &str, group: &str) -> bool;

    /// Look up several keys at once
    fn get_multiple(&self, keys: &[&str], group: &str) -> BTreeMap<String, Option<StoredValue>> {
        keys.iter()
            .map(|key| ((*key).to_string(), self.get(key, group)))
            .collect()
    }
}

/// Return the cached value for `key`, computing and storing it on a miss
pub fn get_object<C, F>(
    cache: &C,
    key: &str,
    group: &str,
    ttl: Option<Duration>,
    factory: F,
) -> StoredValue
where
    C: ObjectCache + ?Sized,
    F: FnOnce() -> StoredValue,
{
    if let Some(value) = cache.get(key, group) {
        return value;
    }
    trace!(key, group, "Object cache miss");
    let value = factory();
    cache.set(key, value.clone(), group, ttl);
    value
}

/// Look up several keys, computing misses that come with a producer
///
/// Misses without a producer are returned as [`StoredValue::Null`] and are
/// not stored.
pub fn get_object_multiple<'a, C>(
    cache: &C,
    entries: Vec<(String, Option<Producer<'a>>)>,
    group: &str,
    ttl: Option<Duration>,
) -> BTreeMap<String, StoredValue>
where
    C: ObjectCache + ?Sized,
{
    let keys: Vec<&str> = entries.iter().map(|(key, _)| key.as_str()).collect();
    let mut found = cache.get_multiple(&keys, group);

    let mut out = BTreeMap::new();
    for (key, producer) in entries {
        let value = match (found.remove(&key).flatten(), producer) {
            (Some(value), _) => value,
            (None, Some(produce)) => {
                let value = produce();
                cache.set(&key, value.clone(), group, ttl);
                value
            }
            (None, None) => StoredValue::Null,
        };
        out.insert(key, value);
    }
    out
}

/// Take `key` out of the cache, or return `default` when absent
pub fn remove_object<C>(cache: &C, key: &str, group: &str, default: StoredValue) -> StoredValue
where
    C: ObjectCache + ?Sized,
{
    match cache.get(key, group) {
        Some(value) => {
            cache.delete(key, group);
            value
        }
        None => default,
    }
}
