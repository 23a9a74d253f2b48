// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::graph::Graph;
use cvg_core::resource::ResourceMeta;
use cvg_core::test_support::FakeResource;
use cvg_core::Resource;
use std::sync::Arc;

fn grouped(kind: &str, name: &str, key: &str) -> ResourceRef {
    Arc::new(
        FakeResource::builder()
            .kind(kind)
            .name(name)
            .meta(ResourceMeta { autogroup_key: Some(key.to_string()), ..Default::default() })
            .build(),
    )
}

fn plain(kind: &str, name: &str) -> ResourceRef {
    Arc::new(FakeResource::builder().kind(kind).name(name).build())
}

#[test]
fn merges_siblings_sharing_an_autogroup_key() {
    let mut g = Graph::new();
    g.add_vertex(grouped("pkg", "a", "base")).unwrap();
    g.add_vertex(grouped("pkg", "b", "base")).unwrap();
    g.add_vertex(plain("pkg", "c")).unwrap();

    let merged = apply_auto_group(&g).unwrap();

    assert_eq!(merged.len(), 2);
}

#[test]
fn leaves_a_lone_autogroup_key_unmerged() {
    let mut g = Graph::new();
    g.add_vertex(grouped("pkg", "a", "base")).unwrap();

    let merged = apply_auto_group(&g).unwrap();

    assert_eq!(merged.len(), 1);
}

#[test]
fn preserves_external_edges_onto_the_composite() {
    let mut g = Graph::new();
    let upstream = g.add_vertex(plain("dir", "etc")).unwrap();
    let a = g.add_vertex(grouped("pkg", "a", "base")).unwrap();
    let b = g.add_vertex(grouped("pkg", "b", "base")).unwrap();
    g.add_edge_by_index(upstream, a, "e1", false).unwrap();
    g.add_edge_by_index(upstream, b, "e2", false).unwrap();

    let merged = apply_auto_group(&g).unwrap();

    assert_eq!(merged.len(), 2);
    let composite_idx = merged.vertices_stable_order().into_iter().find(|&i| merged.vertex(i).resource.kind() == "autogroup").unwrap();
    assert_eq!(merged.incoming(composite_idx).count(), 1);
}

#[test]
fn drops_internal_edges_between_merged_members() {
    let mut g = Graph::new();
    let a = g.add_vertex(grouped("pkg", "a", "base")).unwrap();
    let b = g.add_vertex(grouped("pkg", "b", "base")).unwrap();
    g.add_edge_by_index(a, b, "internal", false).unwrap();

    let merged = apply_auto_group(&g).unwrap();

    assert_eq!(merged.len(), 1);
    assert_eq!(merged.edges().len(), 0);
}

#[tokio::test]
async fn composite_check_apply_is_satisfied_only_when_every_member_is() {
    let a = Arc::new(FakeResource::builder().kind("pkg").name("a").build());
    let b = Arc::new(FakeResource::builder().kind("pkg").name("b").build());
    b.mark_satisfied();
    let composite = CompositeResource::new("pkg".to_string(), "base".to_string(), vec![a.clone(), b.clone()]);

    let state_ok = composite.check_apply(true).await.unwrap();

    assert!(!state_ok);
    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 1);

    let state_ok = composite.check_apply(true).await.unwrap();
    assert!(state_ok);
}
