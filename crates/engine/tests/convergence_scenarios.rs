// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios driving the real [`GraphExecutor`] and
//! [`ConvergenceDetector`] together (spec.md §8 "End-to-end scenarios",
//! S1-S6), using [`FakeResource`] in place of a real resource driver.

use std::sync::Arc;
use std::time::Duration;

use cvg_core::test_support::FakeResourceBuilder;
use cvg_core::{SystemClock, VertexId};
use cvg_engine::convergence::{ConvergenceCallback, ConvergenceDetector};
use cvg_engine::executor::spawn_executor;
use cvg_engine::graph::Graph;
use cvg_engine::swap::SwapCoordinator;
use cvg_engine::GraphExecutor;

const CONVERGED_TIMEOUT: Duration = Duration::from_millis(150);

/// A convergence detector plus a log of every callback invocation, so a
/// scenario can assert both the final converged state and that it flipped
/// at the expected moments (spec.md §8 "convergence callback fires with
/// true after T seconds of idleness").
fn logged_convergence() -> (ConvergenceDetector<SystemClock>, cvg_engine::ConvergenceHandle, Arc<parking_lot::Mutex<Vec<bool>>>) {
    let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let log2 = log.clone();
    let cb: ConvergenceCallback = Box::new(move |converged| {
        log2.lock().push(converged);
        Ok(())
    });
    let (detector, handle) = ConvergenceDetector::new(SystemClock, Some(CONVERGED_TIMEOUT), cb);
    (detector, handle, log)
}

async fn settle() {
    tokio::time::sleep(CONVERGED_TIMEOUT + Duration::from_millis(100)).await;
}

#[tokio::test]
async fn s1_linear_applies_in_dependency_order_then_converges() {
    let a = Arc::new(FakeResourceBuilder::default().kind("r").name("a").apply_delay(Duration::from_millis(80)).build());
    let b = Arc::new(FakeResourceBuilder::default().kind("r").name("b").build());
    let c = Arc::new(FakeResourceBuilder::default().kind("r").name("c").build());

    let mut graph = Graph::new();
    let ia = graph.add_vertex(a.clone()).unwrap();
    let ib = graph.add_vertex(b.clone()).unwrap();
    let ic = graph.add_vertex(c.clone()).unwrap();
    graph.add_edge_by_index(ia, ib, "a-to-b", false).unwrap();
    graph.add_edge_by_index(ib, ic, "b-to-c", false).unwrap();

    let (detector, convergence, log) = logged_convergence();
    tokio::spawn(detector.run());

    // Started through a handle so the test can observe mid-bootstrap state:
    // `start()` itself only returns once every leaf vertex's first apply has
    // completed, and a's is deliberately slow.
    let executor = GraphExecutor::new(graph, convergence, false);
    let handle = spawn_executor(executor);
    let start_handle = handle.clone();
    let start_task = tokio::spawn(async move { start_handle.start(true).await });

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(a.call_count(), 0, "a is still inside its delayed check_apply");
    assert_eq!(b.call_count(), 0, "b must not apply before a's token arrives");
    assert_eq!(c.call_count(), 0, "c must not apply before b's token arrives");

    start_task.await.unwrap().unwrap();
    settle().await;

    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 1);
    assert_eq!(c.call_count(), 1);
    assert_eq!(log.lock().as_slice(), [true], "converges exactly once after T seconds idle");
}

#[tokio::test]
async fn s2_diamond_applies_every_vertex_exactly_once() {
    let a = Arc::new(FakeResourceBuilder::default().kind("r").name("a").build());
    let b = Arc::new(FakeResourceBuilder::default().kind("r").name("b").build());
    let c = Arc::new(FakeResourceBuilder::default().kind("r").name("c").build());
    let d = Arc::new(FakeResourceBuilder::default().kind("r").name("d").build());

    let mut graph = Graph::new();
    let ia = graph.add_vertex(a.clone()).unwrap();
    let ib = graph.add_vertex(b.clone()).unwrap();
    let ic = graph.add_vertex(c.clone()).unwrap();
    let id = graph.add_vertex(d.clone()).unwrap();
    graph.add_edge_by_index(ia, ib, "a-to-b", false).unwrap();
    graph.add_edge_by_index(ia, ic, "a-to-c", false).unwrap();
    graph.add_edge_by_index(ib, id, "b-to-d", false).unwrap();
    graph.add_edge_by_index(ic, id, "c-to-d", false).unwrap();

    let (detector, convergence, log) = logged_convergence();
    tokio::spawn(detector.run());

    let mut executor = GraphExecutor::new(graph, convergence, false);
    executor.start(true).await.unwrap();
    settle().await;

    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 1);
    assert_eq!(c.call_count(), 1);
    assert_eq!(d.call_count(), 1, "d must only apply once both b and c have");
    assert_eq!(log.lock().as_slice(), [true]);
}

#[tokio::test]
async fn s3_drift_reapplies_only_the_affected_branch() {
    let a = Arc::new(FakeResourceBuilder::default().kind("r").name("a").build());
    let b = Arc::new(FakeResourceBuilder::default().kind("r").name("b").build());
    let c = Arc::new(FakeResourceBuilder::default().kind("r").name("c").build());
    let d = Arc::new(FakeResourceBuilder::default().kind("r").name("d").build());

    let mut graph = Graph::new();
    let ia = graph.add_vertex(a.clone()).unwrap();
    let ib = graph.add_vertex(b.clone()).unwrap();
    let ic = graph.add_vertex(c.clone()).unwrap();
    let id = graph.add_vertex(d.clone()).unwrap();
    graph.add_edge_by_index(ia, ib, "a-to-b", false).unwrap();
    graph.add_edge_by_index(ia, ic, "a-to-c", false).unwrap();
    graph.add_edge_by_index(ib, id, "b-to-d", false).unwrap();
    graph.add_edge_by_index(ic, id, "c-to-d", false).unwrap();

    let (detector, convergence, log) = logged_convergence();
    tokio::spawn(detector.run());

    let mut executor = GraphExecutor::new(graph, convergence, false);
    executor.start(true).await.unwrap();
    settle().await;
    assert_eq!(log.lock().as_slice(), [true]);

    // External mutation to b: its own watcher observes drift and re-drives it.
    b.mark_drifted();
    b.trigger_external_change();

    settle().await;

    assert_eq!(a.call_count(), 1, "a did not drift, must not reapply");
    assert_eq!(b.call_count(), 2, "b reapplies once for the drift");
    assert_eq!(c.call_count(), 1, "c did not drift, must not reapply");
    assert_eq!(d.call_count(), 2, "d reapplies once, downstream of b's poke");
    assert_eq!(log.lock().as_slice(), [true, false, true], "converged flips false then back to true around the event");
}

#[tokio::test]
async fn s4_swap_carries_over_unchanged_vertices_and_applies_only_the_addition() {
    let a = Arc::new(FakeResourceBuilder::default().kind("r").name("a").build());
    let b = Arc::new(FakeResourceBuilder::default().kind("r").name("b").build());

    let mut g1 = Graph::new();
    let ia1 = g1.add_vertex(a.clone()).unwrap();
    let ib1 = g1.add_vertex(b.clone()).unwrap();
    g1.add_edge_by_index(ia1, ib1, "a-to-b", false).unwrap();

    let (detector, convergence, _log) = logged_convergence();
    tokio::spawn(detector.run());

    let executor = GraphExecutor::new(Graph::new(), convergence, false);
    let handle = spawn_executor(executor);
    handle.start(true).await.unwrap();

    let mut coordinator = SwapCoordinator::new(handle.clone(), Graph::new());
    coordinator.swap(g1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 1);

    let c = Arc::new(FakeResourceBuilder::default().kind("r").name("c").build());
    let mut g2 = Graph::new();
    let ia2 = g2.add_vertex(a.clone()).unwrap();
    let ib2 = g2.add_vertex(b.clone()).unwrap();
    let ic2 = g2.add_vertex(c.clone()).unwrap();
    g2.add_edge_by_index(ia2, ib2, "a-to-b", false).unwrap();
    g2.add_edge_by_index(ib2, ic2, "b-to-c", false).unwrap();

    coordinator.swap(g2).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(a.call_count(), 1, "a is identity-equal across the swap, not re-applied");
    assert_eq!(b.call_count(), 1, "b is identity-equal across the swap, not re-applied");
    assert_eq!(c.call_count(), 1, "the newly added successor applies once");

    handle.exit().await;
}

#[tokio::test]
async fn s5_transient_failure_retries_then_downstream_applies_once() {
    let a = Arc::new(FakeResourceBuilder::default().kind("r").name("a").build());
    let b = Arc::new(FakeResourceBuilder::default().kind("r").name("b").build());
    let c = Arc::new(FakeResourceBuilder::default().kind("r").name("c").build());
    b.fail_next_calls(3);

    let mut graph = Graph::new();
    let ia = graph.add_vertex(a.clone()).unwrap();
    let ib = graph.add_vertex(b.clone()).unwrap();
    let ic = graph.add_vertex(c.clone()).unwrap();
    graph.add_edge_by_index(ia, ib, "a-to-b", false).unwrap();
    graph.add_edge_by_index(ib, ic, "b-to-c", false).unwrap();

    let (detector, convergence, _log) = logged_convergence();
    tokio::spawn(detector.run());

    let mut executor = GraphExecutor::new(graph, convergence, false);
    executor.start(true).await.unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(a.call_count(), 1);
    assert!(b.call_count() >= 1, "b's first (failing) call still counts");
    assert_eq!(c.call_count(), 0, "c must not apply while b keeps failing");

    // The default backoff schedule (100ms, 200ms, 400ms) means the call
    // that finally succeeds lands close to a second after the first try.
    tokio::time::sleep(Duration::from_millis(1200)).await;

    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 4, "3 failures then the call that succeeds");
    assert_eq!(c.call_count(), 1, "c applies exactly once after b finally succeeds");
}

#[tokio::test]
async fn s6_exit_mid_apply_waits_for_the_in_flight_apply_to_finish() {
    let b = Arc::new(FakeResourceBuilder::default().kind("r").name("b").apply_delay(Duration::from_millis(150)).build());

    let mut graph = Graph::new();
    graph.add_vertex(b.clone()).unwrap();

    let (detector, convergence, _log) = logged_convergence();
    tokio::spawn(detector.run());

    let executor = GraphExecutor::new(graph, convergence, false);
    let handle = spawn_executor(executor);

    // The executor's command loop processes Start and Exit strictly in
    // order, so issuing Exit while Start (and b's 150ms check_apply inside
    // it) is still in flight must land behind it rather than interrupt it.
    let start_handle = handle.clone();
    let start_task = tokio::spawn(async move { start_handle.start(true).await });
    tokio::time::sleep(Duration::from_millis(40)).await;

    handle.exit().await;

    start_task.await.unwrap().unwrap();
    assert_eq!(b.call_count(), 1, "exit did not trigger a second apply");
    assert!(!handle.is_live(VertexId::for_kind_name("r", "b")).await);
}
