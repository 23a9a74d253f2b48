// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::graph::Graph;
use cvg_core::test_support::FakeResource;
use cvg_core::resource::ResourceRef;
use std::sync::Arc;

fn fake_with_deps(kind: &str, name: &str, deps: Vec<(&str, &str)>) -> ResourceRef {
    Arc::new(
        FakeResource::builder()
            .kind(kind)
            .name(name)
            .auto_edges(deps.into_iter().map(|(k, n)| (k.to_string(), n.to_string())).collect())
            .build(),
    )
}

#[test]
fn adds_implied_edge_for_dependency_present_in_graph() {
    let mut g = Graph::new();
    g.add_vertex(fake_with_deps("dir", "etc", vec![])).unwrap();
    let b = g.add_vertex(fake_with_deps("file", "etc/passwd", vec![("dir", "etc")])).unwrap();

    apply_auto_edges(&mut g).unwrap();

    assert_eq!(g.incoming(b).count(), 1);
}

#[test]
fn ignores_dependency_not_present_in_graph() {
    let mut g = Graph::new();
    let a = g.add_vertex(fake_with_deps("file", "a", vec![("dir", "missing")])).unwrap();

    apply_auto_edges(&mut g).unwrap();

    assert_eq!(g.incoming(a).count(), 0);
}

#[test]
fn skips_additions_that_would_cycle_but_keeps_the_rest() {
    let mut g = Graph::new();
    let a = g.add_vertex(fake_with_deps("r", "a", vec![])).unwrap();
    let b = g.add_vertex(fake_with_deps("r", "b", vec![("r", "a")])).unwrap();
    g.add_edge_by_index(a, b, "manual", false).unwrap();
    // This implied edge (b depends on a, reversed) would cycle with the
    // manual a->b edge above; it must be skipped without aborting the pass.
    let c = g.add_vertex(fake_with_deps("r", "c", vec![("r", "b")])).unwrap();

    apply_auto_edges(&mut g).unwrap();

    assert_eq!(g.incoming(b).count(), 1);
    assert_eq!(g.incoming(c).count(), 1);
    g.validate_acyclic().unwrap();
}

#[test]
fn does_not_duplicate_an_existing_edge() {
    let mut g = Graph::new();
    let a = g.add_vertex(fake_with_deps("r", "a", vec![])).unwrap();
    let b = g.add_vertex(fake_with_deps("r", "b", vec![("r", "a")])).unwrap();
    g.add_edge_by_index(a, b, "manual", false).unwrap();

    apply_auto_edges(&mut g).unwrap();

    assert_eq!(g.incoming(b).count(), 1);
}
