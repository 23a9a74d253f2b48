// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cvg_core::test_support::FakeResourceBuilder;
use std::sync::Arc;

#[tokio::test]
async fn parse_config_returns_queued_graphs_in_order_then_repeats_the_last() {
    let source = FakeConfigSource::new();
    let mut empty = Graph::new();
    empty.add_vertex(Arc::new(FakeResourceBuilder::default().kind("r").name("a").build())).unwrap();
    source.push(Ok(Graph::new()));
    source.push(Ok(empty));

    let first = source.parse_config().await.unwrap();
    assert_eq!(first.len(), 0);
    let second = source.parse_config().await.unwrap();
    assert_eq!(second.len(), 1);
    // Queue drained to its last entry -- repeats forever.
    let third = source.parse_config().await.unwrap();
    assert_eq!(third.len(), 1);
}

#[tokio::test]
async fn parse_config_surfaces_a_queued_error() {
    let source = FakeConfigSource::new();
    source.push(Err(ConfigError::Parse("bad syntax".to_string())));

    let err = source.parse_config().await.unwrap_err();
    assert_eq!(err, ConfigError::Parse("bad syntax".to_string()));
}

#[tokio::test]
async fn config_source_watch_delivers_ready_signals() {
    let source = FakeConfigSource::new();
    let mut rx = source.watch();
    source.signal_ready(true).await;
    assert_eq!(rx.recv().await, Some(true));
}

#[tokio::test]
async fn store_set_txn_then_get_round_trips() {
    let store = FakeStore::new();
    store.set_txn(vec![("k".to_string(), b"v".to_vec())]).await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
    assert_eq!(store.get("missing").await.unwrap(), None);
}

#[tokio::test]
async fn store_set_txn_can_be_scripted_to_fail() {
    let store = FakeStore::new();
    store.fail_set_txn();
    let err = store.set_txn(vec![("k".to_string(), b"v".to_vec())]).await.unwrap_err();
    assert!(matches!(err, StoreError::Op(_)));
}

#[tokio::test]
async fn store_watch_delivers_emitted_events() {
    let store = FakeStore::new();
    let mut rx = store.watch("prefix/");
    store.emit(StoreEvent::Changed { key: "prefix/a".to_string(), value: vec![1] }).await;
    assert_eq!(rx.recv().await, Some(StoreEvent::Changed { key: "prefix/a".to_string(), value: vec![1] }));
}
