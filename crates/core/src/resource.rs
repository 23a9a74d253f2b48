// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The resource contract every driver (file, service, package, ...) satisfies.
//!
//! The engine never knows what a resource actually manages; it only calls
//! through this trait. Concrete resource-type drivers are out of scope here
//! (spec.md §1) — only the abstract capability set matters to the graph.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

crate::define_id! {
    /// Identity of a live vertex, derived from a resource's kind+name.
    pub struct VertexId("vtx-");
}

impl VertexId {
    /// Deterministic identity for a resource, not a random one — two
    /// resources with the same (kind, name) must collide to the same id
    /// across graph reloads so `Graph` can reject duplicates and the swap
    /// coordinator can recognize a vertex across `Resource::compare`.
    pub fn for_kind_name(kind: &str, name: &str) -> Self {
        Self(crate::id::IdBuf::new(&format!("vtx-{kind}:{name}")))
    }
}

/// Per-resource flags that modify engine behavior without the engine
/// understanding what the resource does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceMeta {
    /// Compute difference but never call `check_apply(apply = true)`.
    pub noop: bool,
    /// On teardown, apply the inverse of the desired state instead of the
    /// desired state itself.
    pub reverse: bool,
    /// Resources sharing the same autogroup key are candidates for
    /// `AutoGroup` merging into one composite vertex.
    pub autogroup_key: Option<String>,
}

/// Errors a resource driver can return. Always transient from the engine's
/// point of view (spec.md §4.1: "Any error is a transient failure — the
/// engine will re-drive the vertex").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("watch failed: {0}")]
    Watch(String),
    #[error("check_apply failed: {0}")]
    CheckApply(String),
    #[error("close failed: {0}")]
    Close(String),
}

/// A channel into which a resource's `watch` pushes change notifications.
///
/// `Watch` blocks until `closed()` resolves (the engine's Exit signal);
/// while running it posts `()` whenever it observes external-world drift,
/// honoring the pause/resume contract described in spec.md §4.3 — the
/// vertex engine, not the resource, is responsible for turning a raw notify
/// into a mailbox `Event`.
#[derive(Clone)]
pub struct WatchHandle {
    tx: tokio::sync::mpsc::Sender<()>,
    closed: tokio::sync::watch::Receiver<bool>,
}

impl WatchHandle {
    pub fn new(
        tx: tokio::sync::mpsc::Sender<()>,
        closed: tokio::sync::watch::Receiver<bool>,
    ) -> Self {
        Self { tx, closed }
    }

    /// Post a single external-world change notification. Drops the
    /// notification rather than blocking forever if the mailbox is full —
    /// reconciliation is level-triggered (spec.md §4.3), so a dropped poke
    /// is made up for by the one already queued.
    pub async fn notify(&self) {
        let _ = self.tx.send(()).await;
    }

    /// Resolves once the engine has requested this resource's watcher exit.
    pub async fn closed(&mut self) {
        let _ = self.closed.changed().await;
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// Every resource kind implements this narrow capability set (spec.md
/// §4.1). `Send + Sync` so instances can be shared across the watcher and
/// process tasks as `Arc<dyn Resource>`.
#[async_trait]
pub trait Resource: Send + Sync {
    fn kind(&self) -> &str;
    fn name(&self) -> &str;
    fn meta(&self) -> &ResourceMeta;

    /// Identity derived from kind+name, stable across graph reloads.
    fn id(&self) -> VertexId {
        VertexId::for_kind_name(self.kind(), self.name())
    }

    /// One-time setup before the first `check_apply`/`watch` call.
    async fn init(&self) -> Result<(), ResourceError>;

    /// Structural validation of the resource's own parameters, independent
    /// of the rest of the graph. Rejected here, never at apply time.
    fn validate(&self) -> Result<(), ResourceError>;

    /// Block, producing change notifications on `handle`, until the engine
    /// closes `handle`. Must treat closure as an interrupt to any blocking
    /// system call (spec.md §5).
    async fn watch(&self, handle: WatchHandle) -> Result<(), ResourceError>;

    /// Observe (and, if `apply`, mutate) real-world state toward the
    /// desired state. Returns `true` when the observed state already
    /// satisfies the desired state — idempotent, and when `apply` is
    /// `false` must not mutate anything (spec.md §4.1).
    async fn check_apply(&self, apply: bool) -> Result<bool, ResourceError>;

    /// Identity comparison used during a graph swap to decide whether a
    /// vertex in the new graph is "the same" live resource as one in the
    /// old graph (spec.md §4.6).
    fn compare(&self, other: &dyn Resource) -> bool;

    async fn close(&self) -> Result<(), ResourceError>;

    /// Automatic dependencies this resource implies — `(kind, name)` pairs
    /// identifying other vertices that must apply before this one (spec.md
    /// §4.4 AutoEdges, e.g. "a file under a directory"). Default: none.
    fn auto_edges(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// `Some(member ids)` for an AutoGroup composite, `None` for an
    /// ordinary resource. The swap coordinator uses this to tell a
    /// composite whose membership actually changed from one whose identity
    /// (kind + autogroup key) merely repeats — the two share a `VertexId`
    /// but only the latter may carry its live vertex runtime across a swap
    /// (spec.md §4.6, §9 Open Question on AutoGroup/Compare interaction).
    fn member_identities(&self) -> Option<Vec<VertexId>> {
        None
    }
}

/// Convenience alias used throughout the engine: resources are always
/// handled behind a reference-counted trait object.
pub type ResourceRef = Arc<dyn Resource>;

/// `compare` helper shared by every resource impl: same kind, same name.
/// Concrete drivers may call this and then compare their own parameters.
pub fn identity_eq(a: &dyn Resource, b: &dyn Resource) -> bool {
    a.kind() == b.kind() && a.name() == b.name()
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
