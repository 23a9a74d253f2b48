// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Global quiescence detector (spec.md §4.5).
//!
//! Single-consumer by design: every vertex posts activity reports to one
//! channel, and only the coordinator task reads it — the same
//! one-writer-many / one-reader shape the rest of the engine's channels
//! use (spec.md §5 "Shared-resource policy").

use std::collections::HashMap;
use std::time::Duration;

use cvg_core::{Clock, VertexId};
use tokio::sync::mpsc;

/// What a vertex (or the executor, on topology changes) reports to the
/// detector.
pub enum ActivityEvent {
    /// Reset this vertex's idle timer — it had real external activity or
    /// just completed an apply (spec.md §4.5).
    Activity(VertexId),
    /// A new vertex has joined the live set; it starts "active" so a swap
    /// that adds vertices doesn't spuriously report convergence before
    /// they've had a chance to run.
    Register(VertexId),
    /// A vertex left the live set (torn down by a swap or exited).
    Unregister(VertexId),
    /// Suspend evaluation without resetting any timer — held for the
    /// duration of a graph swap (spec.md §4.5 "does not reset timers").
    Pause,
    Resume,
}

/// Handle vertices and the executor use to report into the detector.
#[derive(Clone)]
pub struct ConvergenceHandle {
    tx: mpsc::Sender<ActivityEvent>,
}

impl ConvergenceHandle {
    pub async fn activity(&self, vertex: VertexId) {
        let _ = self.tx.send(ActivityEvent::Activity(vertex)).await;
    }

    pub async fn register(&self, vertex: VertexId) {
        let _ = self.tx.send(ActivityEvent::Register(vertex)).await;
    }

    pub async fn unregister(&self, vertex: VertexId) {
        let _ = self.tx.send(ActivityEvent::Unregister(vertex)).await;
    }

    /// Suspend convergence evaluation — held by the swap coordinator for
    /// the duration of a graph swap (spec.md §4.6).
    pub async fn pause(&self) {
        let _ = self.tx.send(ActivityEvent::Pause).await;
    }

    pub async fn resume(&self) {
        let _ = self.tx.send(ActivityEvent::Resume).await;
    }
}

/// `fn(bool) -> Result<(), E>`, invoked at most once in-flight (spec.md
/// §6 "Convergence callback").
pub type ConvergenceCallback = Box<dyn Fn(bool) -> Result<(), crate::error::EngineError> + Send + Sync>;

/// Global convergence coordinator: fires `callback(true)` once every live
/// vertex has been idle for at least `timeout`, and `callback(false)` as
/// soon as any vertex becomes active again. `timeout = None` models
/// spec.md §6's "negative T disables auto-exit": the detector still tracks
/// activity (for introspection) but never evaluates or calls back.
pub struct ConvergenceDetector<C: Clock> {
    rx: mpsc::Receiver<ActivityEvent>,
    clock: C,
    timeout: Option<Duration>,
    last_activity: HashMap<VertexId, std::time::Instant>,
    converged: bool,
    paused: bool,
    callback: ConvergenceCallback,
}

impl<C: Clock + 'static> ConvergenceDetector<C> {
    pub fn new(clock: C, timeout: Option<Duration>, callback: ConvergenceCallback) -> (Self, ConvergenceHandle) {
        let (tx, rx) = mpsc::channel(256);
        (
            Self {
                rx,
                clock,
                timeout,
                last_activity: HashMap::new(),
                converged: false,
                paused: false,
                callback,
            },
            ConvergenceHandle { tx },
        )
    }

    /// Pause evaluation (during a graph swap) without resetting any timer
    /// (spec.md §4.5 "does not reset timers").
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    fn check_interval(&self) -> Duration {
        match self.timeout {
            Some(t) => (t / 4).max(Duration::from_millis(1)),
            None => Duration::from_secs(3600),
        }
    }

    /// Run the detector until its channel closes (all handles dropped).
    pub async fn run(mut self) {
        let Some(timeout) = self.timeout else {
            // Disabled: just drain reports so senders never block, never evaluate.
            while self.rx.recv().await.is_some() {}
            return;
        };
        let mut ticker = tokio::time::interval(self.check_interval());
        loop {
            tokio::select! {
                maybe = self.rx.recv() => {
                    match maybe {
                        Some(ActivityEvent::Activity(v)) => {
                            self.last_activity.insert(v, self.clock.now());
                            self.flip_to_active_if_converged();
                        }
                        Some(ActivityEvent::Register(v)) => {
                            self.last_activity.insert(v, self.clock.now());
                            self.flip_to_active_if_converged();
                        }
                        Some(ActivityEvent::Unregister(v)) => {
                            self.last_activity.remove(&v);
                        }
                        Some(ActivityEvent::Pause) => self.pause(),
                        Some(ActivityEvent::Resume) => self.resume(),
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    self.evaluate(timeout);
                }
            }
        }
    }

    /// Reacting immediately to fresh activity, rather than waiting for the
    /// next periodic tick, matches spec.md §4.5's "if any vertex becomes
    /// active it transitions to converged=false" without the up-to-T/4
    /// evaluation lag that would otherwise apply to the false transition.
    fn flip_to_active_if_converged(&mut self) {
        if !self.paused && self.converged {
            self.converged = false;
            let _ = (self.callback)(false);
        }
    }

    fn evaluate(&mut self, timeout: Duration) {
        if self.paused {
            return;
        }
        let now = self.clock.now();
        let all_idle = self.last_activity.values().all(|&t| now.duration_since(t) >= timeout);
        if all_idle && !self.converged {
            self.converged = true;
            let _ = (self.callback)(true);
        } else if !all_idle && self.converged {
            self.converged = false;
            let _ = (self.callback)(false);
        }
    }
}

#[cfg(test)]
#[path = "convergence_tests.rs"]
mod tests;
