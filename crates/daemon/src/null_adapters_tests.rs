// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn null_config_source_resolves_to_an_empty_graph() {
    let source = NullConfigSource;
    let graph = source.parse_config().await.expect("parse_config");
    assert!(graph.is_empty());
}

#[tokio::test]
async fn null_store_accepts_and_discards_writes() {
    let store = NullStore;
    store.startup().await.expect("startup");
    store.set_txn(vec![("k".to_string(), b"v".to_vec())]).await.expect("set_txn");
    assert_eq!(store.get("k").await.expect("get"), None);
    assert!(store.local_client_urls().is_empty());
    store.destroy().await.expect("destroy");
}
