//! Record file encoding
//!
//! A record is a short comment header followed by one type-tagged JSON
//! document:
//!
//! ```text
//! # litcache record v1
//! # This file has been auto-generated in production mode and is intended to
//! # store data permanently without expiration. Do not edit.
//! {"type":"map","value":{"a":{"type":"int","value":1}}}
//! ```
//!
//! Every value carries its `type` tag, so a boolean never decodes as a
//! string and `123` never decodes as `123.0`. The header is informational
//! only; decoding skips any leading `#` lines.

use crate::value::StoredValue;
use crate::{Error, Result};
use std::path::Path;

/// Marker written on the first header line
pub const RECORD_MAGIC: &str = "# litcache record v1";

const HEADER_NOTICE: &str = "# This file has been auto-generated in production mode and is intended to\n\
                             # store data permanently without expiration. Do not edit.";

/// Deepest nesting a record may carry.
///
/// Each level costs two JSON levels (tag object + payload), and the JSON
/// parser refuses input nested deeper than 128.
pub const MAX_DEPTH: usize = 60;

/// Serialize a value into record text
pub fn encode(value: &StoredValue) -> Result<String> {
    validate(value, 1)?;
    let payload = serde_json::to_string(value)
        .map_err(|e| Error::unsupported(format!("failed to serialize record: {e}")))?;

    let mut out = String::with_capacity(RECORD_MAGIC.len() + HEADER_NOTICE.len() + payload.len() + 3);
    out.push_str(RECORD_MAGIC);
    out.push('\n');
    out.push_str(HEADER_NOTICE);
    out.push('\n');
    out.push_str(&payload);
    out.push('\n');
    Ok(out)
}

/// Parse record text read from `path`
///
/// `path` is only used for error context.
pub fn decode(text: &str, path: &Path) -> Result<StoredValue> {
    let payload = strip_header(text);
    if payload.trim().is_empty() {
        return Err(Error::decode(path, "record has no payload"));
    }
    serde_json::from_str(payload).map_err(|e| Error::decode(path, e.to_string()))
}

/// Read and decode the record at `path`
pub fn read_record(path: &Path) -> Result<StoredValue> {
    let bytes = std::fs::read(path).map_err(|e| Error::io(e, path, "read"))?;
    let text = std::str::from_utf8(&bytes)
        .map_err(|e| Error::decode(path, format!("record is not valid UTF-8: {e}")))?;
    decode(text, path)
}

fn strip_header(text: &str) -> &str {
    let mut rest = text;
    loop {
        let trimmed = rest.trim_start_matches(['\n', '\r']);
        if !trimmed.starts_with('#') {
            return trimmed;
        }
        rest = match trimmed.find('\n') {
            Some(idx) => &trimmed[idx + 1..],
            None => "",
        };
    }
}

fn validate(value: &StoredValue, depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(Error::unsupported(format!(
            "value is nested deeper than {MAX_DEPTH} levels"
        )));
    }
    match value {
        StoredValue::Float(f) if !f.is_finite() => Err(Error::unsupported(format!(
            "float {f} cannot be stored"
        ))),
        StoredValue::List(items) => items.iter().try_for_each(|v| validate(v, depth + 1)),
        StoredValue::Map(map) => map.values().try_for_each(|v| validate(v, depth + 1)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn p() -> &'static Path {
        Path::new("/store/test.lit")
    }

    #[test]
    fn test_encode_has_header_and_payload() {
        let text = encode(&StoredValue::Int(123)).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(RECORD_MAGIC));
        assert!(text.contains("permanently without expiration"));
        assert_eq!(text.lines().last(), Some(r#"{"type":"int","value":123}"#));
    }

    #[test]
    fn test_type_fidelity() {
        let cases = [
            StoredValue::Bool(true),
            StoredValue::String("true".into()),
            StoredValue::Int(123),
            StoredValue::String("123".into()),
            StoredValue::Float(123.0),
            StoredValue::Null,
            StoredValue::String(String::new()),
        ];
        for value in cases {
            let decoded = decode(&encode(&value).unwrap(), p()).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(decoded.type_name(), value.type_name());
        }
    }

    #[test]
    fn test_nested_round_trip() {
        let mut inner = BTreeMap::new();
        inner.insert("MyArrayKey".to_string(), StoredValue::from("MyArrayValue"));
        inner.insert("flag".to_string(), StoredValue::Bool(false));
        let value = StoredValue::List(vec![
            StoredValue::Map(inner),
            StoredValue::List(vec![StoredValue::Float(-0.25), StoredValue::Int(i64::MIN)]),
        ]);
        assert_eq!(decode(&encode(&value).unwrap(), p()).unwrap(), value);
    }

    #[test]
    fn test_header_does_not_affect_decode() {
        let payload = r#"{"type":"string","value":"x"}"#;
        let with_other_header = format!("# written by hand\n#\n{payload}\n");
        assert_eq!(
            decode(&with_other_header, p()).unwrap(),
            StoredValue::String("x".into())
        );
        assert_eq!(decode(payload, p()).unwrap(), StoredValue::String("x".into()));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = decode("<?php return array();", p()).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_decode_header_only_fails() {
        let err = decode("# litcache record v1\n", p()).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_decode_unknown_tag_fails() {
        let err = decode(r#"{"type":"closure","value":null}"#, p()).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_encode_rejects_non_finite() {
        for f in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let value = StoredValue::List(vec![StoredValue::Float(f)]);
            assert!(matches!(
                encode(&value),
                Err(Error::UnsupportedValue { .. })
            ));
        }
    }

    #[test]
    fn test_encode_rejects_excessive_depth() {
        let mut value = StoredValue::Null;
        for _ in 0..MAX_DEPTH {
            value = StoredValue::List(vec![value]);
        }
        assert!(matches!(
            encode(&value),
            Err(Error::UnsupportedValue { .. })
        ));
    }

    #[test]
    fn test_max_depth_round_trips() {
        let mut value = StoredValue::Int(1);
        for _ in 1..MAX_DEPTH {
            value = StoredValue::List(vec![value]);
        }
        assert_eq!(value.depth(), MAX_DEPTH);
        assert_eq!(decode(&encode(&value).unwrap(), p()).unwrap(), value);
    }

    #[test]
    fn test_read_record_rejects_invalid_utf8() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.lit");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        assert!(read_record(&path).unwrap_err().is_decode());
    }
}
