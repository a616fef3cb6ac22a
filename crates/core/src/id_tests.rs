// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

crate::define_id! {
    /// Test ID type for macro verification.
    pub struct TestId("tst-");
}

#[test]
fn new_has_prefix_and_fixed_length() {
    let id = TestId::new();
    assert!(id.as_str().starts_with("tst-"));
    assert_eq!(id.as_str().len(), ID_MAX_LEN);
}

#[test]
fn new_ids_are_unique() {
    assert_ne!(TestId::new(), TestId::new());
}

#[test]
fn from_string_round_trips() {
    let id = TestId::from_string("tst-abc123");
    assert_eq!(id.as_str(), "tst-abc123");
    assert_eq!(id.to_string(), "tst-abc123".to_string());
}

#[test]
fn suffix_strips_prefix() {
    let id = TestId::from_string("tst-abc123");
    assert_eq!(id.suffix(), "abc123");
}

#[test]
fn suffix_returns_whole_string_when_prefix_absent() {
    let id = TestId::from_string("abc123");
    assert_eq!(id.suffix(), "abc123");
}

#[test]
fn short_truncates_suffix() {
    let id = TestId::from_string("tst-abcdefghijklmnop");
    assert_eq!(id.short(4), "abcd");
}

#[test]
fn short_returns_full_suffix_when_shorter_than_n() {
    let id = TestId::from_string("tst-ab");
    assert_eq!(id.short(8), "ab");
}

#[test]
fn is_empty_for_default_buf() {
    let id = TestId(IdBuf::empty());
    assert!(id.is_empty());
}

#[test]
fn default_generates_new_id() {
    let id = TestId::default();
    assert!(!id.is_empty());
}

#[test]
fn equality_against_str() {
    let id = TestId::from_string("tst-xyz");
    assert_eq!(id, "tst-xyz");
    assert_eq!(id, *"tst-xyz".to_string().as_str());
}

#[test]
fn hash_map_lookup_by_borrowed_str() {
    let mut map = HashMap::new();
    map.insert(TestId::from_string("tst-key"), 42);
    assert_eq!(map.get("tst-key"), Some(&42));
}

#[test]
fn from_conversions() {
    let a: TestId = "tst-a".into();
    let b: TestId = "tst-b".to_string().into();
    let c: TestId = (&"tst-c".to_string()).into();
    assert_eq!(a, "tst-a");
    assert_eq!(b, "tst-b");
    assert_eq!(c, "tst-c");
}

// --- short() free function tests ---

#[test]
fn short_fn_truncates() {
    let s = "abcdefghijklmnop";
    assert_eq!(short(s, 8), "abcdefgh");
    assert_eq!(short(s, 100), s);
    assert_eq!(short("abc", 8), "abc");
}

// --- IdBuf tests ---

#[test]
fn id_buf_debug_and_display_match_as_str() {
    let buf = IdBuf::new("hello");
    assert_eq!(buf.as_str(), "hello");
    assert_eq!(format!("{}", buf), "hello");
    assert_eq!(format!("{:?}", buf), "\"hello\"");
}

#[test]
fn id_buf_empty_has_zero_length() {
    assert!(IdBuf::empty().is_empty());
    assert_eq!(IdBuf::empty().as_str(), "");
}

#[test]
fn id_buf_serde_round_trip() {
    let buf = IdBuf::new("round-trip");
    let json = serde_json::to_string(&buf).unwrap();
    let back: IdBuf = serde_json::from_str(&json).unwrap();
    assert_eq!(buf, back);
}

#[test]
fn id_buf_deserialize_rejects_oversized_input() {
    let too_long = "x".repeat(ID_MAX_LEN + 1);
    let json = serde_json::to_string(&too_long).unwrap();
    let result: Result<IdBuf, _> = serde_json::from_str(&json);
    assert!(result.is_err());
}
