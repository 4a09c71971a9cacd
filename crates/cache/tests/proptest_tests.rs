//! Property-based tests for record encoding and name resolution

#![allow(clippy::unwrap_used, clippy::expect_used)]

use litcache::{FileCacheStore, StoredValue, codec, path};
use proptest::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn scalar() -> impl Strategy<Value = StoredValue> {
    prop_oneof![
        Just(StoredValue::Null),
        any::<bool>().prop_map(StoredValue::Bool),
        any::<i64>().prop_map(StoredValue::Int),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(StoredValue::Float),
        ".*".prop_map(StoredValue::String),
    ]
}

fn stored_value() -> impl Strategy<Value = StoredValue> {
    scalar().prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(StoredValue::List),
            prop::collection::btree_map(".*", inner, 0..8).prop_map(StoredValue::Map),
        ]
    })
}

proptest! {
    #[test]
    fn test_codec_round_trip(value in stored_value()) {
        let text = codec::encode(&value).unwrap();
        let decoded = codec::decode(&text, Path::new("prop.lit")).unwrap();
        prop_assert_eq!(decoded, value);
    }

    #[test]
    fn test_store_round_trip(value in stored_value(), key in "[a-z]{1,8}") {
        let tmp = TempDir::new().unwrap();
        let store = FileCacheStore::open(tmp.path()).unwrap();

        let whole = store.get_or_insert("whole", None, value.clone()).unwrap();
        prop_assert_eq!(&whole, &value);
        let keyed = store.get_or_insert("keyed", Some(&key), value.clone()).unwrap();
        prop_assert_eq!(&keyed, &value);

        let reopened = FileCacheStore::open(tmp.path()).unwrap();
        prop_assert_eq!(reopened.get_or_insert("whole", None, StoredValue::Null).unwrap(), value.clone());
        prop_assert_eq!(reopened.get_or_insert("keyed", Some(&key), StoredValue::Null).unwrap(), value);
    }

    #[test]
    fn test_valid_names_stay_under_root(
        segments in prop::collection::vec("[a-zA-Z0-9_-][a-zA-Z0-9_.-]{0,15}", 1..5)
    ) {
        let name = segments.join("/");
        let root = Path::new("/var/cache/litcache");
        let resolved = path::resolve(root, &name, "lit").unwrap();
        prop_assert!(resolved.starts_with(root));
        prop_assert!(resolved.to_string_lossy().ends_with(".lit"));
    }

    #[test]
    fn test_parent_segments_rejected(
        prefix in prop::collection::vec("[a-z]{1,8}", 0..3),
        suffix in prop::collection::vec("[a-z]{1,8}", 0..3),
    ) {
        let mut parts = prefix;
        parts.push("..".to_string());
        parts.extend(suffix);
        let name = parts.join("/");
        prop_assert!(path::resolve(Path::new("/root"), &name, "lit").is_err());
    }
}
