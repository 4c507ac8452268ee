//! Property tests for path classification, wire round-trips and listener teardown.

use docbridge::{
    classify, deserialize_documents, serialize_document, serialize_query_changes, CancelFn,
    DocumentChange, DocumentSnapshot, Fields, GeoPoint, ListenerRegistry, PathKind,
    SubscriptionKind, Timestamp, Value,
};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn segment() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-]{1,8}"
}

fn document_path() -> impl Strategy<Value = String> {
    (prop::collection::vec((segment(), segment()), 0..3), segment(), segment()).prop_map(
        |(pairs, collection, id)| {
            let mut parts: Vec<String> = pairs.into_iter().flat_map(|(c, d)| [c, d]).collect();
            parts.push(collection);
            parts.push(id);
            parts.join("/")
        },
    )
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        any::<f64>()
            .prop_filter("finite", |n| n.is_finite())
            .prop_map(Value::Double),
        ".{0,16}".prop_map(Value::String),
        (any::<i64>(), 0u32..1_000_000_000)
            .prop_map(|(seconds, nanos)| Value::Timestamp(Timestamp { seconds, nanos })),
        (-90.0f64..=90.0, -180.0f64..=180.0).prop_map(|(latitude, longitude)| {
            Value::GeoPoint(GeoPoint {
                latitude,
                longitude,
            })
        }),
        document_path().prop_map(Value::Reference),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::Map),
        ]
    })
}

fn document_fields() -> impl Strategy<Value = Fields> {
    prop::collection::btree_map("[a-z]{1,6}", value(), 0..6)
}

proptest! {
    #[test]
    fn prop_even_segment_count_is_document(segments in prop::collection::vec(segment(), 0..8)) {
        let path = segments.join("/");
        let expected = if !segments.is_empty() && segments.len() % 2 == 0 {
            PathKind::Document
        } else {
            PathKind::Collection
        };
        prop_assert_eq!(classify(&path), expected);
    }

    #[test]
    fn prop_empty_segments_ignored(segments in prop::collection::vec(segment(), 1..6)) {
        let clean = segments.join("/");
        let noisy = format!("/{}//", segments.join("//"));
        prop_assert_eq!(classify(&clean), classify(&noisy));
    }

    #[test]
    fn prop_document_round_trip(path in document_path(), fields in document_fields()) {
        let doc = DocumentSnapshot::existing(path.clone(), fields.clone());
        let wire = serialize_document(&doc).unwrap().to_json().unwrap();

        let decoded = deserialize_documents(&wire, |p| Ok(p.to_string())).unwrap();
        prop_assert_eq!(decoded.len(), 1);
        prop_assert_eq!(&decoded[0].reference, &path);
        prop_assert_eq!(&decoded[0].fields, &fields);
    }

    #[test]
    fn prop_changes_round_trip_in_order(
        docs in prop::collection::vec((document_path(), document_fields()), 0..6)
    ) {
        let changes: Vec<DocumentChange> = docs
            .iter()
            .map(|(p, f)| DocumentChange::added(DocumentSnapshot::existing(p.clone(), f.clone())))
            .collect();
        let wire = serialize_query_changes(&changes).unwrap().to_json().unwrap();

        let decoded = deserialize_documents(&wire, |p| Ok(p.to_string())).unwrap();
        prop_assert_eq!(decoded.len(), docs.len());
        for (got, (path, fields)) in decoded.iter().zip(&docs) {
            prop_assert_eq!(&got.reference, path);
            prop_assert_eq!(&got.fields, fields);
        }
    }

    #[test]
    fn prop_unregister_all_cancels_each_once(count in 0usize..40, removed_first in 0usize..10) {
        let registry = ListenerRegistry::new();
        let cancels = Arc::new(AtomicUsize::new(0));

        let ids: Vec<_> = (0..count)
            .map(|i| {
                let cancels = Arc::clone(&cancels);
                let cancel: CancelFn = Box::new(move || {
                    cancels.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                });
                registry.register(format!("topic-{}", i), SubscriptionKind::Collection, cancel)
            })
            .collect();

        let removed_first = removed_first.min(count);
        for id in &ids[..removed_first] {
            prop_assert!(registry.unregister(*id));
        }

        prop_assert_eq!(registry.unregister_all(), count - removed_first);
        prop_assert_eq!(registry.unregister_all(), 0);
        prop_assert_eq!(cancels.load(Ordering::SeqCst), count);
        prop_assert!(registry.is_empty());
    }
}

#[test]
fn test_doubles_survive_json_exactly() {
    let doc = DocumentSnapshot::existing(
        "places/p1",
        docbridge::fields([
            ("score", Value::Double(0.10184767281454463)),
            (
                "at",
                Value::GeoPoint(GeoPoint {
                    latitude: 0.0,
                    longitude: 92.38364072723077,
                }),
            ),
        ]),
    );
    let wire = serialize_document(&doc).unwrap().to_json().unwrap();

    let decoded = deserialize_documents(&wire, |p| Ok(p.to_string())).unwrap();
    assert_eq!(decoded[0].fields.get("score"), Some(&Value::Double(0.10184767281454463)));
    match decoded[0].fields.get("at") {
        Some(Value::GeoPoint(point)) => {
            assert_eq!(point.longitude.to_bits(), 92.38364072723077f64.to_bits())
        }
        other => panic!("Expected geopoint, got {:?}", other),
    }
}
