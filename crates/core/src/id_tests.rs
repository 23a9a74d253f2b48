// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

// --- define_id! macro tests ---

crate::define_id! {
    /// Test ID type for macro verification.
    pub struct TestId("tid-");
}

#[test]
fn define_id_hash_map_lookup() {
    let mut map = HashMap::new();
    let id = TestId::from_string("tid-abc");
    map.insert(id, 42);
    assert_eq!(map.get("tid-abc"), Some(&42));
}

#[test]
fn define_id_new_has_stable_prefix() {
    let id = TestId::new();
    assert!(id.as_str().starts_with("tid-"));
}

#[test]
fn define_id_new_ids_are_unique() {
    assert_ne!(TestId::new(), TestId::new());
}

#[test]
fn define_id_suffix_strips_prefix() {
    let id = TestId::from_string("tid-abcdefghijklmnop");
    assert_eq!(id.suffix(), "abcdefghijklmnop");
}

#[test]
fn define_id_short_truncates_suffix() {
    let id = TestId::from_string("tid-abcdefghijklmnop");
    assert_eq!(id.short(8), "abcdefgh");
}

#[test]
fn define_id_short_returns_full_when_shorter() {
    let id = TestId::from_string("tid-abc");
    assert_eq!(id.short(8), "abc");
}

#[test]
fn define_id_display_round_trips_through_from_string() {
    let id = TestId::from_string("tid-xyz");
    assert_eq!(TestId::from_string(id.to_string()), id);
}

#[test]
fn define_id_is_empty() {
    assert!(!TestId::new().is_empty());
}

// --- short() free function tests ---

#[test]
fn short_fn_on_str() {
    let s = "abcdefghijklmnop";
    assert_eq!(short(s, 8), "abcdefgh");
    assert_eq!(short(s, 100), s);
    assert_eq!(short("abc", 8), "abc");
}

// --- IdBuf tests ---

#[test]
fn id_buf_empty_is_empty() {
    assert!(IdBuf::empty().is_empty());
}

#[test]
fn id_buf_as_str_round_trips() {
    let buf = IdBuf::new("hello");
    assert_eq!(buf.as_str(), "hello");
}

#[test]
fn id_buf_hashes_match_str() {
    let mut map = HashMap::new();
    map.insert(IdBuf::new("k"), 1);
    assert_eq!(map.get("k"), Some(&1));
}
