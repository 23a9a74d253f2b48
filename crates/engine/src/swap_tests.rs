// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::executor::{spawn_executor, GraphExecutor};
use cvg_core::resource::ResourceMeta;
use cvg_core::test_support::FakeResourceBuilder;
use cvg_core::FakeClock;
use std::sync::Arc;
use std::time::Duration;

fn discard_convergence() -> ConvergenceHandle {
    let clock = FakeClock::new();
    let cb: ConvergenceCallback = Box::new(|_| Ok(()));
    let (detector, handle) = ConvergenceDetector::new(clock, None, cb);
    tokio::spawn(detector.run());
    handle
}

use crate::convergence::{ConvergenceCallback, ConvergenceDetector, ConvergenceHandle};

#[tokio::test]
async fn first_swap_activates_an_empty_starting_point() {
    let a = Arc::new(FakeResourceBuilder::default().kind("r").name("a").build());
    let mut g_prime = Graph::new();
    g_prime.add_vertex(a.clone()).unwrap();

    let executor = GraphExecutor::new(Graph::new(), discard_convergence(), false);
    let handle = spawn_executor(executor);
    let mut coordinator = SwapCoordinator::new(handle, Graph::new());

    coordinator.swap(g_prime).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(a.call_count(), 1);
    assert_eq!(coordinator.current().len(), 1);
}

#[tokio::test]
async fn identity_equal_vertex_carries_over_and_new_successor_applies_once() {
    let a = Arc::new(FakeResourceBuilder::default().kind("r").name("a").build());

    let mut g1 = Graph::new();
    g1.add_vertex(a.clone()).unwrap();

    let executor = GraphExecutor::new(Graph::new(), discard_convergence(), false);
    let handle = spawn_executor(executor);
    let mut coordinator = SwapCoordinator::new(handle, Graph::new());
    coordinator.swap(g1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(a.call_count(), 1);

    let b = Arc::new(FakeResourceBuilder::default().kind("r").name("b").build());
    let mut g2 = Graph::new();
    let ia = g2.add_vertex(a.clone()).unwrap();
    let ib = g2.add_vertex(b.clone()).unwrap();
    g2.add_edge_by_index(ia, ib, "e", false).unwrap();

    coordinator.swap(g2).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    // A: compare()-equal, same edge set grown only downstream -- carried
    // over, not re-applied (spec.md §8 S4 "A and B are not re-applied").
    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 1);
}

#[tokio::test]
async fn vertex_removed_from_the_new_graph_is_retired() {
    let a = Arc::new(FakeResourceBuilder::default().kind("r").name("a").build());
    let b = Arc::new(FakeResourceBuilder::default().kind("r").name("b").build());

    let mut g1 = Graph::new();
    g1.add_vertex(a.clone()).unwrap();
    g1.add_vertex(b.clone()).unwrap();

    let executor = GraphExecutor::new(Graph::new(), discard_convergence(), false);
    let handle = spawn_executor(executor);
    let mut coordinator = SwapCoordinator::new(handle.clone(), Graph::new());
    coordinator.swap(g1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(handle.is_live(b.id()).await);

    let mut g2 = Graph::new();
    g2.add_vertex(a.clone()).unwrap();
    coordinator.swap(g2).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!handle.is_live(b.id()).await);
    assert_eq!(coordinator.current().len(), 1);
}

#[tokio::test]
async fn composite_membership_change_retires_and_rebuilds_the_composite() {
    let meta = ResourceMeta { autogroup_key: Some("g1".to_string()), ..Default::default() };
    let a = Arc::new(FakeResourceBuilder::default().kind("r").name("a").meta(meta.clone()).build());
    let b = Arc::new(FakeResourceBuilder::default().kind("r").name("b").meta(meta.clone()).build());

    let mut g1 = Graph::new();
    g1.add_vertex(a.clone()).unwrap();
    g1.add_vertex(b.clone()).unwrap();

    let executor = GraphExecutor::new(Graph::new(), discard_convergence(), false);
    let handle = spawn_executor(executor);
    let mut coordinator = SwapCoordinator::new(handle, Graph::new());
    coordinator.swap(g1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 1);

    // A third sibling joins the same autogroup key: the composite's
    // VertexId (kind="autogroup", name="r:g1") is unchanged, but its
    // membership grew -- must be rebuilt, not silently carried over, so
    // the new member is ever actually applied.
    let c = Arc::new(FakeResourceBuilder::default().kind("r").name("c").meta(meta).build());
    let mut g2 = Graph::new();
    g2.add_vertex(a.clone()).unwrap();
    g2.add_vertex(b.clone()).unwrap();
    g2.add_vertex(c.clone()).unwrap();

    coordinator.swap(g2).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(c.call_count(), 1);
    // The rebuilt composite re-applies every member once more, since it is
    // a brand new vertex runtime from the executor's point of view.
    assert_eq!(a.call_count(), 2);
    assert_eq!(b.call_count(), 2);
}
