//! Cached rendered output

use super::object::ObjectCache;
use crate::value::StoredValue;
use crate::{Error, Result};
use std::io::Write;
use std::time::Duration;

/// Render callback handed to an [`OutputCapture`]
pub type Render<'a> = dyn FnMut(&mut dyn Write) -> std::io::Result<()> + 'a;

/// Runs a render callback and returns what it wrote
pub trait OutputCapture {
    /// Capture everything `render` writes
    fn capture(&self, render: &mut Render<'_>) -> std::io::Result<String>;
}

/// Captures output into an in-memory buffer
#[derive(Debug, Default, Clone, Copy)]
pub struct BufferCapture;

impl OutputCapture for BufferCapture {
    fn capture(&self, render: &mut Render<'_>) -> std::io::Result<String> {
        let mut buf = Vec::new();
        render(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Return the cached output for `key`, rendering and storing it on a miss
///
/// A cached entry that is not a string is treated as a miss and replaced.
pub fn get_fragment<C, O, R>(
    cache: &C,
    capture: &O,
    key: &str,
    group: &str,
    ttl: Option<Duration>,
    mut render: R,
) -> Result<String>
where
    C: ObjectCache + ?Sized,
    O: OutputCapture + ?Sized,
    R: FnMut(&mut dyn Write) -> std::io::Result<()>,
{
    if let Some(StoredValue::String(output)) = cache.get(key, group) {
        return Ok(output);
    }
    let output = capture
        .capture(&mut render)
        .map_err(|e| Error::io_no_path(e, "capture"))?;
    cache.set(key, StoredValue::String(output.clone()), group, ttl);
    Ok(output)
}

/// Forget the cached output for `key`
pub fn remove_fragment<C>(cache: &C, key: &str, group: &str) -> bool
where
    C: ObjectCache + ?Sized,
{
    cache.delete(key, group)
}
