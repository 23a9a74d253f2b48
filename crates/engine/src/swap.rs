// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graph swap coordinator (spec.md §4.6).
//!
//! A long-running task driven by a fan-in of definition-source watch
//! events, external-store watch events, periodic manifest-compile ticks,
//! and an exit event. On each trigger it parses a new desired graph G',
//! diffs it against the graph it last activated, and atomically replaces
//! the running graph with the merged result — preserving every
//! identity-matched vertex's live watcher and converged state.
//!
//! The external collaborators this module fans in from — the config
//! source and the replicated store — are deliberately out of scope beyond
//! their trait boundary (spec.md §1, §6); defined here (rather than in
//! `cvg-adapters`) because their method signatures name [`Graph`], which
//! only this crate owns. `cvg-adapters` depends on this crate to provide
//! fakes against these same traits.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use cvg_core::VertexId;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::autoedges::apply_auto_edges;
use crate::autogroup::apply_auto_group;
use crate::error::SwapError;
use crate::executor::ExecutorHandle;
use crate::graph::Graph;

/// Errors a [`ConfigSource`] can return from [`ConfigSource::parse_config`]
/// (spec.md §7a "configuration errors" — rejected at parse time, reported
/// to the operator, never mutate running state).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Reads a desired-state graph from wherever it is defined — a file, a
/// compiled manifest, an in-memory program. The core never inspects the
/// source itself (spec.md §6 "Config source interface").
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn parse_config(&self) -> Result<Graph, ConfigError>;

    /// A channel of ready signals: `true` means a new graph is ready to be
    /// parsed, `false` means not yet (e.g. a debounce window still open).
    fn watch(&self) -> mpsc::Receiver<bool>;
}

/// A single change observed on the external replicated store, scoped to a
/// watched key prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Changed { key: String, value: Vec<u8> },
    Deleted { key: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store startup failed: {0}")]
    Startup(String),
    #[error("store operation failed: {0}")]
    Op(String),
}

/// The embedded replicated key-value store used for peer discovery and
/// cross-host data exchange (spec.md §6 "External replicated store
/// interface"). Only the interface matters here — no implementation is in
/// scope (spec.md §1).
#[async_trait]
pub trait Store: Send + Sync {
    async fn startup(&self) -> Result<(), StoreError>;
    async fn destroy(&self) -> Result<(), StoreError>;
    fn watch(&self, key_prefix: &str) -> mpsc::Receiver<StoreEvent>;
    async fn set_txn(&self, writes: Vec<(String, Vec<u8>)>) -> Result<(), StoreError>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn local_client_urls(&self) -> Vec<String>;
}

/// Why a swap cycle was triggered — carried through purely for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapTrigger {
    DefinitionChanged,
    StoreChanged,
    Tick,
    Exit,
}

/// Fan in a [`ConfigSource`]'s watch channel, an optional [`Store`]'s watch
/// channel on `key_prefix`, and a periodic tick into one [`SwapTrigger`]
/// stream, ending in [`SwapTrigger::Exit`] when `exit` resolves.
pub fn spawn_trigger_fanin(
    config_source: &dyn ConfigSource,
    store: Option<(&dyn Store, String)>,
    tick_interval: Duration,
    mut exit: tokio::sync::watch::Receiver<bool>,
) -> mpsc::Receiver<SwapTrigger> {
    let (tx, rx) = mpsc::channel(16);
    let mut config_watch = config_source.watch();
    let mut store_watch = store.as_ref().map(|(store, prefix)| store.watch(prefix));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick_interval);
        loop {
            let trigger = tokio::select! {
                biased;
                _ = exit.changed() => SwapTrigger::Exit,
                Some(ready) = config_watch.recv() => {
                    if !ready {
                        continue;
                    }
                    SwapTrigger::DefinitionChanged
                }
                Some(event) = async {
                    match store_watch.as_mut() {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    let _ = event;
                    SwapTrigger::StoreChanged
                }
                _ = ticker.tick() => SwapTrigger::Tick,
            };
            let is_exit = trigger == SwapTrigger::Exit;
            if tx.send(trigger).await.is_err() || is_exit {
                break;
            }
        }
    });
    rx
}

/// Drives the running graph through [`ExecutorHandle`], owning the last
/// successfully activated graph (post-AutoEdges/AutoGroup) so it can diff
/// the next desired graph against it.
pub struct SwapCoordinator {
    executor: ExecutorHandle,
    current: Graph,
}

impl SwapCoordinator {
    /// `activated` is the graph already passed to `executor.start(true)` —
    /// an empty [`Graph`] if nothing has been activated yet.
    pub fn new(executor: ExecutorHandle, activated: Graph) -> Self {
        Self { executor, current: activated }
    }

    pub fn current(&self) -> &Graph {
        &self.current
    }

    /// Run the fan-in loop until a [`SwapTrigger::Exit`] arrives, parsing
    /// and swapping in a new graph on every other trigger (spec.md §4.6).
    pub async fn run(mut self, config_source: &dyn ConfigSource, mut triggers: mpsc::Receiver<SwapTrigger>) {
        while let Some(trigger) = triggers.recv().await {
            if trigger == SwapTrigger::Exit {
                break;
            }
            match config_source.parse_config().await {
                Ok(raw) => {
                    if let Err(err) = self.swap(raw).await {
                        tracing::error!(error = %err, ?trigger, "graph swap aborted, previous graph still running");
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, ?trigger, "configuration parse failed, keeping previous graph");
                }
            }
        }
    }

    /// Run one swap cycle against an already-parsed desired graph `g_prime`
    /// (step 1, "parse/compile", happens before this call — on parse
    /// failure the caller logs and skips, never reaching here).
    ///
    /// 2. Pause the convergence detector, then pause the running graph.
    /// 3. Diff G' against G using `Resource::compare`: identity-equal pairs
    ///    transfer their vertex runtime; unmatched G vertices are marked for
    ///    teardown; unmatched G' vertices are marked new.
    /// 4. Apply AutoEdges then AutoGroup to the merged graph (spec.md §9
    ///    Open Question: identity match first, AutoGroup after, so a
    ///    composite in G' adopts live sub-vertices from G).
    /// 5. Write cross-host coordination records (left to the caller via
    ///    `store`, since writing is optional and the transaction itself is
    ///    opaque to the engine — see [`SwapCoordinator::swap_with_store`]).
    /// 6. Activate: retire torn-down vertices, spawn new ones, `Start(first
    ///    = false)`, resume the convergence detector.
    pub async fn swap(&mut self, mut g_prime: Graph) -> Result<(), SwapError> {
        apply_auto_edges(&mut g_prime)?;
        let merged = apply_auto_group(&g_prime)?;
        merged.validate_acyclic()?;

        // Validate every vertex in the merged graph before touching the
        // running one: a vertex failing validation must abort the whole
        // swap and leave `self.current` activated and undisturbed, even if
        // another vertex in the same graph is mid-apply (spec.md §9 "the
        // safe choice is to abort the swap").
        for idx in 0..merged.len() {
            let slot = merged.vertex(idx);
            slot.resource
                .validate()
                .map_err(|err| SwapError::ValidationFailed(format!("vertex {}: {err}", slot.id)))?;
        }

        let plan = self.plan(&merged);

        self.executor.pause().await;

        for id in &plan.retire {
            self.executor.retire(*id).await;
        }

        self.executor.set_graph(merged.clone());
        if let Err(err) = self.executor.start(false).await {
            // Abort: nothing torn down beyond `plan.retire` can be
            // recovered automatically, but the executor never built
            // anything for ids that failed `init`, so resuming the old
            // graph for everything else is safe (spec.md §9 "the safe
            // choice is to abort the swap").
            return Err(SwapError::ActivationFailed(err.to_string()));
        }

        self.current = merged;
        Ok(())
    }

    /// Same as [`SwapCoordinator::swap`], but first writes `records` to
    /// `store` in a single transaction (spec.md §4.6 step 5); on failure the
    /// swap is aborted before anything is paused or torn down.
    pub async fn swap_with_store(
        &mut self,
        g_prime: Graph,
        store: &dyn Store,
        records: Vec<(String, Vec<u8>)>,
    ) -> Result<(), SwapError> {
        store.set_txn(records).await.map_err(|err| SwapError::StoreWrite(err.to_string()))?;
        self.swap(g_prime).await
    }

    /// Decide, for every vertex in `merged`, whether it carries its live
    /// runtime over from `self.current` or must be retired and rebuilt.
    fn plan(&self, merged: &Graph) -> SwapPlan {
        let mut retire = Vec::new();

        for idx in 0..self.current.len() {
            let old_id = self.current.vertex(idx).id;
            if merged.index_of(&old_id).is_none() {
                retire.push(old_id);
            }
        }

        for idx in 0..merged.len() {
            let new_id = merged.vertex(idx).id;
            let Some(old_idx) = self.current.index_of(&new_id) else {
                continue;
            };
            let old_resource = &self.current.vertex(old_idx).resource;
            let new_resource = &merged.vertex(idx).resource;
            let carried = match (old_resource.member_identities(), new_resource.member_identities()) {
                (Some(old_members), Some(new_members)) => {
                    let old_set: HashSet<VertexId> = old_members.into_iter().collect();
                    let new_set: HashSet<VertexId> = new_members.into_iter().collect();
                    old_set == new_set
                }
                (None, None) => old_resource.compare(new_resource.as_ref()),
                // Identity flipped between plain and composite membership
                // (e.g. an autogroup key was added or removed) — same
                // VertexId cannot span both shapes, rebuild.
                _ => false,
            };
            if !carried {
                retire.push(new_id);
            }
        }

        SwapPlan { retire }
    }
}

struct SwapPlan {
    /// Vertices to tear down before `executor.start` runs: either removed
    /// entirely, or present under the same identity but changed enough
    /// that the live runtime cannot carry over unchanged.
    retire: Vec<VertexId>,
}

#[cfg(test)]
#[path = "swap_tests.rs"]
mod tests;
