// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graph executor: owns the live graph and every vertex's running tasks,
//! and answers Start/Pause/Exit (spec.md §4.4).
//!
//! Wiring a vertex's edges happens once, at construction, so a fresh
//! [`crate::vertex::VertexRuntime`] must be built in an order where every
//! successor already exists (its mailbox is what an edge's `DownstreamEdge`
//! points at). [`Graph::topological_order`] reversed gives exactly that
//! order: sinks first, sources last.

use std::collections::HashMap;

use cvg_core::event::{EventKind, Payload};
use cvg_core::{Resource, VertexId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::convergence::ConvergenceHandle;
use crate::error::EngineError;
use crate::graph::Graph;
use crate::semaphore::edge_semaphore;
use crate::vertex::{run_process_loop, run_watcher_loop, DownstreamEdge, VertexHandle, VertexRuntime};

struct LiveVertex {
    handle: VertexHandle,
    process_task: JoinHandle<()>,
    watch_task: JoinHandle<()>,
}

/// Owns the currently running graph. Not `Send`-shared directly — external
/// callers go through [`ExecutorHandle`], the same actor-handle shape used
/// by [`crate::convergence::ConvergenceHandle`] and [`crate::mailbox::MailboxTx`]
/// throughout this crate.
pub struct GraphExecutor {
    graph: Graph,
    live: HashMap<VertexId, LiveVertex>,
    convergence: ConvergenceHandle,
    noop: bool,
}

impl GraphExecutor {
    pub fn new(graph: Graph, convergence: ConvergenceHandle, noop: bool) -> Self {
        Self { graph, live: HashMap::new(), convergence, noop }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn is_live(&self, id: &VertexId) -> bool {
        self.live.contains_key(id)
    }

    /// Replace the graph the executor drives without touching any
    /// already-live vertex. The caller (the swap coordinator) must have
    /// already torn down, via [`GraphExecutor::retire`], every vertex
    /// present in the old graph but not identity-matched into this one,
    /// and must only have left a vertex "live" across the swap when its
    /// own incident edges are unchanged (spec.md §4.6, §9 Open Question:
    /// identity match first, AutoGroup after).
    pub fn set_graph(&mut self, graph: Graph) {
        self.graph = graph;
    }

    /// Stop one live vertex: ack-fenced `Exit`, await both its tasks, drop
    /// it from the live set and the convergence detector. No-op if the
    /// vertex isn't live. Must be called only while the executor is
    /// paused (spec.md §4.6 step 2 "pause the running graph").
    pub async fn retire(&mut self, id: VertexId) {
        if let Some(live) = self.live.remove(&id) {
            live.handle.mailbox.post_and_wait(EventKind::Exit, false).await;
            let _ = live.process_task.await;
            let _ = live.watch_task.await;
            self.convergence.unregister(id).await;
        }
    }

    /// Broadcast `Pause`, fenced so every live vertex has actually reached
    /// `Paused` before this returns (spec.md §4.4 "Pause: broadcast...
    /// blocks until every vertex has acknowledged").
    pub async fn pause(&mut self) {
        self.convergence.pause().await;
        for live in self.live.values() {
            live.handle.mailbox.post_and_wait(EventKind::Pause, false).await;
        }
    }

    /// Stop every live vertex and clear the executor's state (spec.md
    /// §4.4 "Exit: like Pause, but each vertex closes its resource and its
    /// tasks are awaited to completion before the call returns").
    pub async fn exit(&mut self) {
        let ids: Vec<VertexId> = self.live.keys().copied().collect();
        for id in ids {
            self.retire(id).await;
        }
    }

    /// Construct and spawn every vertex present in the graph that isn't
    /// already live, wiring edges via a sinks-first build order so a
    /// vertex's downstream list can always reference an already-built
    /// successor's mailbox. New leaf vertices (no incoming edges) receive
    /// a `Start`; new edges whose upstream is an already-live vertex are
    /// seeded with one token up front, since that upstream will not apply
    /// again on its own to produce it (spec.md §3 "at graph start each
    /// vertex must receive one token per incoming edge before its first
    /// apply", generalized to a newly added edge after a swap).
    pub async fn start(&mut self, first: bool) -> Result<(), EngineError> {
        let started_at = std::time::Instant::now();
        tracing::info!(first, vertices = self.graph.len(), "starting graph executor");
        self.graph.validate_acyclic()?;

        let mut build_order = self.graph.topological_order()?;
        build_order.reverse();

        // DownstreamEdge entries waiting on a predecessor that hasn't been
        // (re)built yet, keyed by that predecessor's graph index.
        let mut pending_downstream: HashMap<usize, Vec<DownstreamEdge>> = HashMap::new();
        let mut newly_built: Vec<VertexId> = Vec::new();
        let mut spawned_this_call: std::collections::HashSet<VertexId> = std::collections::HashSet::new();

        for idx in build_order {
            let slot_id = self.graph.vertex(idx).id;
            if self.live.contains_key(&slot_id) {
                continue;
            }
            let resource = self.graph.vertex(idx).resource.clone();
            resource.validate().map_err(|source| EngineError::Resource { vertex: slot_id, source })?;
            resource.init().await.map_err(|source| EngineError::Resource { vertex: slot_id, source })?;

            let mut incoming_rx = Vec::new();
            let mut edge_tx_for_predecessor = Vec::new();
            for edge in self.graph.incoming(idx) {
                let (tx, rx) = edge_semaphore();
                incoming_rx.push(rx);
                edge_tx_for_predecessor.push((edge.from, tx));
            }

            let downstream = pending_downstream.remove(&idx).unwrap_or_default();
            let has_incoming = !incoming_rx.is_empty();

            let spawn = VertexRuntime::new(
                slot_id,
                resource.clone(),
                incoming_rx,
                downstream,
                self.convergence.clone(),
                self.noop,
            );
            self.convergence.register(slot_id).await;

            for (from_idx, tx) in edge_tx_for_predecessor {
                pending_downstream
                    .entry(from_idx)
                    .or_default()
                    .push(DownstreamEdge { token_tx: tx, mailbox: spawn.handle.mailbox.clone() });
            }

            let watch_task = tokio::spawn(run_watcher_loop(
                slot_id,
                resource,
                spawn.handle.mailbox.clone(),
                spawn.watch_pause_rx,
                spawn.watch_closed_rx,
            ));
            let process_task = tokio::spawn(run_process_loop(spawn.runtime));

            self.live.insert(slot_id, LiveVertex { handle: spawn.handle, process_task, watch_task });
            spawned_this_call.insert(slot_id);
            if !has_incoming {
                newly_built.push(slot_id);
            }
        }

        // Any leftover pending_downstream entries belong to predecessors
        // that were already live before this call — a new edge growing out
        // of a carried-over vertex (spec.md §8 S4). Wire it in place, seed
        // a token, and poke the successor directly: the predecessor won't
        // apply again on its own to generate that poke itself.
        for (from_idx, edges) in pending_downstream {
            let from_id = self.graph.vertex(from_idx).id;
            let Some(live) = self.live.get(&from_id) else {
                continue;
            };
            for edge in edges {
                edge.token_tx.push();
                let mailbox = edge.mailbox.clone();
                live.handle.append_downstream(edge);
                mailbox.poke(Payload::Changed).await;
            }
        }

        for id in newly_built {
            if let Some(live) = self.live.get(&id) {
                live.handle.mailbox.post_and_wait(EventKind::Start, true).await;
            }
        }

        // Every other live vertex was already running before this call --
        // carried over across a swap, and left `Paused` by the coordinator's
        // `pause()` (spec.md §4.4 "restart after a pause/swap: previously
        // running vertices resume where they paused"). A bare `Poke` with
        // no activity un-pauses it (the top-level match flips `paused`
        // unconditionally on any of Start/Event/Poke/BackPoke); whether it
        // also triggers a fresh `check_apply` is then decided by the same
        // drained-token gate that protects every other `Poke` from
        // double-applying.
        for (id, live) in self.live.iter() {
            if spawned_this_call.contains(id) {
                continue;
            }
            live.handle.mailbox.post_and_wait(EventKind::Poke, false).await;
        }

        self.convergence.resume().await;
        tracing::info!(elapsed_ms = started_at.elapsed().as_millis() as u64, "graph executor started");
        Ok(())
    }
}

/// Commands an [`ExecutorHandle`] can issue to the task that owns a
/// [`GraphExecutor`].
enum ExecutorCommand {
    Start { first: bool, reply: oneshot::Sender<Result<(), EngineError>> },
    Pause { reply: oneshot::Sender<()> },
    Exit { reply: oneshot::Sender<()> },
    SetGraph { graph: Graph, reply: oneshot::Sender<()> },
    Retire { id: VertexId, reply: oneshot::Sender<()> },
    IsLive { id: VertexId, reply: oneshot::Sender<bool> },
}

/// Cheap-to-clone front for a [`GraphExecutor`] running in its own task.
#[derive(Clone)]
pub struct ExecutorHandle {
    tx: mpsc::Sender<ExecutorCommand>,
}

impl ExecutorHandle {
    pub async fn start(&self, first: bool) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(ExecutorCommand::Start { first, reply }).await;
        rx.await.unwrap_or(Ok(()))
    }

    pub async fn pause(&self) {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(ExecutorCommand::Pause { reply }).await;
        let _ = rx.await;
    }

    pub async fn exit(&self) {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(ExecutorCommand::Exit { reply }).await;
        let _ = rx.await;
    }

    /// Used by the swap coordinator once it has built the merged graph and
    /// torn down anything unmatched — see [`crate::swap`].
    pub async fn set_graph(&self, graph: Graph) {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(ExecutorCommand::SetGraph { graph, reply }).await;
        let _ = rx.await;
    }

    pub async fn retire(&self, id: VertexId) {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(ExecutorCommand::Retire { id, reply }).await;
        let _ = rx.await;
    }

    pub async fn is_live(&self, id: VertexId) -> bool {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(ExecutorCommand::IsLive { id, reply }).await;
        rx.await.unwrap_or(false)
    }
}

/// Runs a [`GraphExecutor`], serving commands from its [`ExecutorHandle`]s
/// until every handle is dropped.
pub async fn run_executor(mut executor: GraphExecutor, mut rx: mpsc::Receiver<ExecutorCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            ExecutorCommand::Start { first, reply } => {
                let result = executor.start(first).await;
                let _ = reply.send(result);
            }
            ExecutorCommand::Pause { reply } => {
                executor.pause().await;
                let _ = reply.send(());
            }
            ExecutorCommand::Exit { reply } => {
                executor.exit().await;
                let _ = reply.send(());
            }
            ExecutorCommand::SetGraph { graph, reply } => {
                executor.set_graph(graph);
                let _ = reply.send(());
            }
            ExecutorCommand::Retire { id, reply } => {
                executor.retire(id).await;
                let _ = reply.send(());
            }
            ExecutorCommand::IsLive { id, reply } => {
                let _ = reply.send(executor.is_live(&id));
            }
        }
    }
}

/// Spawn a [`GraphExecutor`] onto its own task and return a handle to it.
pub fn spawn_executor(executor: GraphExecutor) -> ExecutorHandle {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(run_executor(executor, rx));
    ExecutorHandle { tx }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
