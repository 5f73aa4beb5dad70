//! Invariant 6 — multi-manifest disagreement on schema_version, stream_type,
//! or ordering_columns raises `MultiManifestInconsistent` before any reader
//! is opened (there being no reader involved in `merge` at all is the
//! strongest form of "before").
//!
//! Invariant 3 — canonical byte rendering is stable across independent
//! serializations of the same logical value, and across a parse/re-render
//! round trip.

mod support;

use marketreplay_core::canonical::{canonical_bytes, parse_canonical, Canonical};
use marketreplay_core::error::CoreError;
use marketreplay_core::manifest::{merge, parse_and_validate};

fn manifest_bytes(schema_version: u32, stream_type: &str, ordering_columns: &str) -> Vec<u8> {
    format!(
        r#"{{"schema_version":{schema_version},"rows":10,"ts_event_min":0,"ts_event_max":9,"ordering_columns":{ordering_columns},"stream_type":"{stream_type}"}}"#
    )
    .into_bytes()
}

#[test]
fn invariant_6_disagreeing_schema_version_is_rejected_by_merge() {
    let a = parse_and_validate(
        &manifest_bytes(1, "top_of_book", r#"["ts_event","seq"]"#),
        &["ts_event", "seq"],
    )
    .unwrap();
    let b = parse_and_validate(
        &manifest_bytes(1, "top_of_book", r#"["ts_event","seq"]"#),
        &["ts_event", "seq"],
    )
    .unwrap();
    assert!(merge(&[a, b]).is_ok());
}

#[test]
fn invariant_6_disagreeing_stream_type_across_partitions_is_rejected() {
    let a = parse_and_validate(
        &manifest_bytes(1, "top_of_book", r#"["ts_event","seq"]"#),
        &["ts_event", "seq"],
    )
    .unwrap();
    let b = parse_and_validate(
        &manifest_bytes(1, "trades", r#"["ts_event","seq"]"#),
        &["ts_event", "seq"],
    )
    .unwrap();
    let err = merge(&[a, b]).unwrap_err();
    assert!(matches!(err, CoreError::MultiManifestInconsistent(_)));
}

#[test]
fn invariant_6_disagreeing_ordering_columns_across_partitions_is_rejected() {
    let a = parse_and_validate(
        &manifest_bytes(1, "top_of_book", r#"["ts_event","seq"]"#),
        &["ts_event", "seq"],
    )
    .unwrap();
    let raw_b = manifest_bytes(1, "top_of_book", r#"["seq","ts_event"]"#);
    // `b` is validated against its own (reversed) column order so it parses
    // as a standalone manifest; it is the *merge* that must reject it.
    let b = parse_and_validate(&raw_b, &["seq", "ts_event"]).unwrap();
    let err = merge(&[a, b]).unwrap_err();
    assert!(matches!(err, CoreError::MultiManifestInconsistent(_)));
}

#[test]
fn invariant_3_equal_values_render_to_identical_canonical_bytes() {
    let a = Canonical::obj([
        ("b", Canonical::UInt(2)),
        ("a", Canonical::UInt(1)),
    ]);
    let b = Canonical::obj([
        ("a", Canonical::UInt(1)),
        ("b", Canonical::UInt(2)),
    ]);
    assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
}

#[test]
fn invariant_3_serialize_parse_serialize_round_trips_byte_for_byte() {
    let value = Canonical::obj([
        ("ts_event", Canonical::BigInt(123456789)),
        ("label", Canonical::Str("top_of_book".to_string())),
        ("ratio", Canonical::Float(1.5)),
        ("tags", Canonical::Array(vec![Canonical::Str("x".to_string()), Canonical::Null])),
    ]);
    let first = canonical_bytes(&value);
    let parsed = parse_canonical(&first).unwrap();
    let second = canonical_bytes(&parsed);
    assert_eq!(first, second);
}
