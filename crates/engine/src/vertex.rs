// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-vertex state machine: Watcher + Process loops (spec.md §4.3).

use std::sync::Arc;

use cvg_core::event::{EventKind, Payload};
use cvg_core::resource::{ResourceRef, WatchHandle};
use cvg_core::{Resource, VertexId};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use crate::backoff::Backoff;
use crate::convergence::ConvergenceHandle;
use crate::mailbox::{mailbox, MailboxRx, MailboxTx};
use crate::semaphore::EdgeSemaphoreRx;

/// States a vertex's process loop moves through (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexState {
    Idle,
    AwaitingUpstream,
    Applying,
    PokingDownstream,
    Paused,
    Exited,
}

cvg_core::simple_display! {
    VertexState {
        Idle => "idle",
        AwaitingUpstream => "awaiting_upstream",
        Applying => "applying",
        PokingDownstream => "poking_downstream",
        Paused => "paused",
        Exited => "exited",
    }
}

/// A downstream edge: the token channel to push into, plus the successor's
/// mailbox to post a `Poke` to (spec.md §4.3 "Poking-Downstream").
pub struct DownstreamEdge {
    pub token_tx: crate::semaphore::EdgeSemaphoreTx,
    pub mailbox: MailboxTx,
}

/// Handle used by the executor to control a live vertex from the outside.
#[derive(Clone)]
pub struct VertexHandle {
    pub id: VertexId,
    pub mailbox: MailboxTx,
    downstream: Arc<Mutex<Vec<DownstreamEdge>>>,
}

impl VertexHandle {
    /// Wire an additional downstream edge into an already-live vertex
    /// without tearing it down — used by the swap coordinator when a graph
    /// rewrite adds a successor to a vertex that carries over unchanged
    /// (spec.md §4.6, §8 S4: "watchers of A and B are the original tasks").
    /// Only safe to call while the vertex is paused.
    pub fn append_downstream(&self, edge: DownstreamEdge) {
        self.downstream.lock().push(edge);
    }
}

/// Everything the executor owns for one live vertex, separate from the
/// [`crate::graph::Graph`] itself so a swap can tear this down without
/// touching graph structure (spec.md §9).
pub struct VertexRuntime {
    pub id: VertexId,
    resource: ResourceRef,
    mailbox_rx: MailboxRx,
    self_tx: MailboxTx,
    incoming: Vec<EdgeSemaphoreRx>,
    downstream: Arc<Mutex<Vec<DownstreamEdge>>>,
    convergence: ConvergenceHandle,
    noop: bool,
    watch_pause_tx: watch::Sender<bool>,
    watch_closed_tx: watch::Sender<bool>,
}

/// Constructed state needed to spawn a vertex's watcher+process tasks.
pub struct VertexSpawn {
    pub handle: VertexHandle,
    pub runtime: VertexRuntime,
    pub watch_pause_rx: watch::Receiver<bool>,
    pub watch_closed_rx: watch::Receiver<bool>,
}

impl VertexRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: VertexId,
        resource: ResourceRef,
        incoming: Vec<EdgeSemaphoreRx>,
        downstream: Vec<DownstreamEdge>,
        convergence: ConvergenceHandle,
        noop: bool,
    ) -> VertexSpawn {
        let (mailbox_tx, mailbox_rx) = mailbox();
        let (watch_pause_tx, watch_pause_rx) = watch::channel(false);
        let (watch_closed_tx, watch_closed_rx) = watch::channel(false);
        let downstream = Arc::new(Mutex::new(downstream));
        let handle = VertexHandle { id, mailbox: mailbox_tx.clone(), downstream: downstream.clone() };
        let runtime = VertexRuntime {
            id,
            resource,
            mailbox_rx,
            self_tx: mailbox_tx,
            incoming,
            downstream,
            convergence,
            noop,
            watch_pause_tx,
            watch_closed_tx,
        };
        VertexSpawn { handle, runtime, watch_pause_rx, watch_closed_rx }
    }
}

/// Outcome of the "drain one token from every outstanding incoming edge"
/// step (spec.md §4.3 transition 2).
enum DrainOutcome {
    Complete,
    /// Past the first cycle, the triggering event carried no work worth
    /// applying: a `Poke` whose token was already collapsed into an
    /// earlier cycle's drain, or a bare resume nudge with nothing pending
    /// (spec.md §4.3 "multiple upstream changes collapse into a single
    /// successor apply"). The trigger is still acked; `check_apply` is
    /// not called.
    Skip,
    /// Pause arrived while some edges still had no token. Carries the
    /// indices that are still outstanding so resume can continue exactly
    /// where it left off (spec.md: "hold the partially drained tokens") —
    /// re-draining an edge whose token was already consumed would wait
    /// forever for a second apply upstream has no reason to perform.
    Paused(Vec<usize>),
    Exit,
    MailboxClosed,
}

/// A drive cycle in flight: the event that triggered it (acked once the
/// cycle completes) and the incoming-edge indices still outstanding.
struct PendingDrain {
    trigger: cvg_core::Event,
    remaining: Vec<usize>,
}

/// Runs one vertex's process loop to completion (on Exit or mailbox
/// closure). Spawned as its own task by the executor; the resource's
/// `watch` runs concurrently in a sibling task sharing `watch_pause_rx`/
/// `watch_closed_rx`.
pub async fn run_process_loop(mut rt: VertexRuntime) {
    let mut state = VertexState::Idle;
    let mut backoff = Backoff::default();
    let mut paused = false;
    let mut pending: Option<PendingDrain> = None;
    // Only the vertex's very first cycle blocks on every incoming edge
    // (spec.md §3: "at graph start each vertex must receive one token per
    // incoming edge before its first apply"). Every later cycle is
    // level-triggered by whatever event woke it — an upstream that never
    // applies again must not stall a vertex reacting to its own drift
    // (spec.md §8 S3).
    let mut first_cycle = true;

    loop {
        let event = match rt.mailbox_rx.recv().await {
            Some(e) => e,
            None => break,
        };

        match event.kind {
            EventKind::Exit => {
                let _ = rt.resource.close().await;
                let _ = rt.watch_closed_tx.send(true);
                let mut event = event;
                event.responder.ack();
                state = VertexState::Exited;
                tracing::info!(vertex = %rt.id, state = %state, "vertex exited");
                break;
            }
            EventKind::Pause => {
                // Nothing in flight between cycles: acknowledged
                // immediately, no partial drain to remember.
                paused = true;
                let _ = rt.watch_pause_tx.send(true);
                let mut event = event;
                event.responder.ack();
                state = VertexState::Paused;
                tracing::info!(vertex = %rt.id, "vertex paused");
            }
            EventKind::Start | EventKind::Event | EventKind::Poke | EventKind::BackPoke => {
                let mut event = event;
                if paused {
                    paused = false;
                    let _ = rt.watch_pause_tx.send(false);
                    tracing::info!(vertex = %rt.id, "vertex resumed");
                }
                if event.activity {
                    rt.convergence.activity(rt.id).await;
                }

                state = VertexState::AwaitingUpstream;
                let (trigger, drain_outcome) = match pending.take() {
                    Some(p) => {
                        // This event only served to wake the vertex back
                        // up; the cycle it belongs to was already folded
                        // into the pending drain (level-triggered, same
                        // collapsing rule the edge semaphore itself uses).
                        event.responder.ack();
                        let outcome = drain_from(&mut rt, p.remaining).await;
                        (p.trigger, outcome)
                    }
                    None if first_cycle => {
                        let outcome = drain_from(&mut rt, (0..rt.incoming.len()).collect()).await;
                        (event, outcome)
                    }
                    None => {
                        // Past the first cycle: opportunistically clear any
                        // queued tokens but never block waiting for one.
                        // Whether that's enough reason to apply depends on
                        // what woke the vertex: a watcher-observed `Event`
                        // or an explicit `BackPoke` always warrants a fresh
                        // `check_apply`, but a `Poke` only does if it
                        // actually corresponds to a token an upstream left
                        // behind — otherwise it's either a duplicate poke
                        // the earlier drain already folded in, or a bare
                        // resume nudge with nothing pending, and applying
                        // anyway would double-apply a diamond's sink
                        // (spec.md §4.3 "collapse into a single successor
                        // apply").
                        let mut drained = 0usize;
                        for rx in rt.incoming.iter_mut() {
                            if rx.try_drain() {
                                drained += 1;
                            }
                        }
                        let should_apply = match event.kind {
                            EventKind::Event | EventKind::BackPoke | EventKind::Start => true,
                            _ => drained > 0,
                        };
                        if should_apply {
                            (event, DrainOutcome::Complete)
                        } else {
                            (event, DrainOutcome::Skip)
                        }
                    }
                };

                let mut trigger = trigger;
                match drain_outcome {
                    DrainOutcome::Complete => {
                        first_cycle = false;
                        state = VertexState::Applying;
                        let apply = !rt.noop;
                        match rt.resource.check_apply(apply).await {
                            Ok(state_ok) => {
                                backoff.reset();
                                rt.convergence.activity(rt.id).await;
                                state = VertexState::PokingDownstream;
                                let payload = if state_ok { Payload::NoChange } else { Payload::Changed };
                                poke_downstream(&rt, payload).await;
                                state = VertexState::Idle;
                            }
                            Err(err) => {
                                tracing::error!(vertex = %rt.id, error = %err, "check_apply failed, retrying");
                                schedule_retry(&rt, &mut backoff);
                                state = VertexState::Idle;
                            }
                        }
                        trigger.responder.ack();
                    }
                    DrainOutcome::Skip => {
                        state = VertexState::Idle;
                        trigger.responder.ack();
                    }
                    DrainOutcome::Paused(remaining) => {
                        paused = true;
                        state = VertexState::Paused;
                        pending = Some(PendingDrain { trigger, remaining });
                    }
                    DrainOutcome::Exit => {
                        let _ = rt.resource.close().await;
                        let _ = rt.watch_closed_tx.send(true);
                        trigger.responder.ack();
                        state = VertexState::Exited;
                        break;
                    }
                    DrainOutcome::MailboxClosed => break,
                }
            }
        }
    }
    tracing::debug!(vertex = %rt.id, final_state = %state, "process loop stopped");
}

/// Drain one token from every edge index in `indices`, in order, racing
/// each drain against the mailbox so a `Pause`/`Exit` posted mid-drain is
/// observed immediately (spec.md §4.3 transition 2).
async fn drain_from(rt: &mut VertexRuntime, mut indices: Vec<usize>) -> DrainOutcome {
    while let Some(&idx) = indices.first() {
        tokio::select! {
            _ = rt.incoming[idx].drain() => {
                indices.remove(0);
            }
            maybe = rt.mailbox_rx.recv() => {
                match maybe {
                    Some(mut ev) if ev.kind == EventKind::Pause => {
                        let _ = rt.watch_pause_tx.send(true);
                        ev.responder.ack();
                        return DrainOutcome::Paused(indices);
                    }
                    Some(mut ev) if ev.kind == EventKind::Exit => {
                        ev.responder.ack();
                        return DrainOutcome::Exit;
                    }
                    // A poke arriving mid-drain is level-triggered — the
                    // apply this drain leads to will already observe the
                    // latest state, so the extra event is simply dropped.
                    Some(_) => {}
                    None => return DrainOutcome::MailboxClosed,
                }
            }
        }
    }
    DrainOutcome::Complete
}

async fn poke_downstream(rt: &VertexRuntime, payload: Payload) {
    // Collect tx/mailbox handles under the lock, then release it before
    // awaiting — the executor may be appending to this same list
    // concurrently (while this vertex is paused, never mid-poke, but the
    // lock is held only briefly either way).
    let edges: Vec<(crate::semaphore::EdgeSemaphoreTx, MailboxTx)> =
        rt.downstream.lock().iter().map(|e| (e.token_tx.clone(), e.mailbox.clone())).collect();
    for (token_tx, mailbox) in edges {
        token_tx.push();
        mailbox.poke(payload).await;
    }
}

fn schedule_retry(rt: &VertexRuntime, backoff: &mut Backoff) {
    let delay = backoff.next_delay();
    let self_tx = rt.self_tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        self_tx.poke(Payload::Changed).await;
    });
}

/// Consecutive watcher failures tolerated before the vertex is quarantined
/// (spec.md §7c). Past this, restarting is pointless -- whatever the
/// resource depends on (credentials, a socket, a remote host) is down for
/// longer than transient backoff can paper over.
const WATCHER_QUARANTINE_THRESHOLD: u32 = 5;

/// Outcome of one `resource.watch()` attempt.
enum WatchOutcome {
    /// `closed_rx` flipped true -- the engine asked this vertex to exit,
    /// `watch` returned (or we stopped waiting on it) in response.
    Closed,
    /// `watch` returned an error without the engine having asked it to
    /// stop (spec.md §7c "watcher failures").
    Failed,
}

/// Drives the resource's `watch` until closed, translating raw
/// notifications into `Event{kind=Event, activity=true}` posts to the
/// vertex's own mailbox, honoring pause (spec.md §4.3 "Watcher task").
///
/// On an error return from `watch` the watcher is restarted after a
/// bounded backoff; after [`WATCHER_QUARANTINE_THRESHOLD`] consecutive
/// failures the vertex quarantines itself by posting itself a `Pause` it
/// will never be resumed from -- it remains `Paused` and its downstreams
/// cannot progress, which is correct because the dependency this resource
/// watches is unsatisfied (spec.md §7c).
pub async fn run_watcher_loop(
    id: VertexId,
    resource: ResourceRef,
    self_tx: MailboxTx,
    mut pause_rx: watch::Receiver<bool>,
    closed_rx: watch::Receiver<bool>,
) {
    let mut backoff = Backoff::default();
    let mut consecutive_failures = 0u32;

    loop {
        if *closed_rx.borrow() {
            return;
        }
        match run_watch_attempt(id, resource.clone(), &self_tx, &mut pause_rx, closed_rx.clone()).await {
            WatchOutcome::Closed => return,
            WatchOutcome::Failed => {
                consecutive_failures += 1;
                if consecutive_failures >= WATCHER_QUARANTINE_THRESHOLD {
                    tracing::error!(
                        vertex = %id,
                        failures = consecutive_failures,
                        "watcher failed repeatedly, quarantining vertex"
                    );
                    self_tx.post(cvg_core::Event::fire(EventKind::Pause, false)).await;
                    return;
                }
                let delay = backoff.next_delay();
                tracing::warn!(
                    vertex = %id,
                    failures = consecutive_failures,
                    delay_ms = delay.as_millis() as u64,
                    "watcher restarting after backoff"
                );
                let mut closed_during_backoff = closed_rx.clone();
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = closed_during_backoff.changed() => {}
                }
            }
        }
    }
}

/// One spawn-watch-and-pump-notifications cycle, returning once the
/// underlying `watch()` call returns (closed or errored).
async fn run_watch_attempt(
    id: VertexId,
    resource: ResourceRef,
    self_tx: &MailboxTx,
    pause_rx: &mut watch::Receiver<bool>,
    closed_rx: watch::Receiver<bool>,
) -> WatchOutcome {
    let (notify_tx, mut notify_rx) = mpsc::channel::<()>(4);
    let handle = WatchHandle::new(notify_tx, closed_rx);
    let watch_task = tokio::spawn(async move { resource.watch(handle).await });

    let mut paused = false;
    let mut missed_while_paused = false;
    loop {
        tokio::select! {
            changed = pause_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let now_paused = *pause_rx.borrow();
                if paused && !now_paused && missed_while_paused {
                    // Resume: emit a synthetic event for anything missed
                    // while paused (spec.md §4.3 "Watcher honors Pause").
                    self_tx.post(cvg_core::Event::fire(EventKind::Event, true)).await;
                    missed_while_paused = false;
                }
                paused = now_paused;
            }
            maybe = notify_rx.recv() => {
                match maybe {
                    Some(()) => {
                        if paused {
                            missed_while_paused = true;
                        } else {
                            self_tx.post(cvg_core::Event::fire(EventKind::Event, true)).await;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    match watch_task.await {
        Ok(Ok(())) => WatchOutcome::Closed,
        Ok(Err(err)) => {
            tracing::error!(vertex = %id, error = %err, "watch exited with error");
            WatchOutcome::Failed
        }
        Err(_join_err) => WatchOutcome::Failed,
    }
}

#[cfg(test)]
#[path = "vertex_tests.rs"]
mod tests;
