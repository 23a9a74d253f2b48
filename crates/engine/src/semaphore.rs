// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Edge semaphore: a single-slot token channel implementing happens-before
//! on one graph edge (spec.md §3 "Edge semaphore", §4.3).
//!
//! Tokens are not counted across cycles — at most one token is ever queued
//! per edge. A second `push` while a token is already waiting is a no-op:
//! reconciliation is level-triggered, collapsing multiple upstream changes
//! between two downstream applies into a single downstream apply (spec.md
//! §4.3 "Ordering guarantees").

use tokio::sync::mpsc;

/// The write half, held by the upstream vertex.
#[derive(Clone)]
pub struct EdgeSemaphoreTx {
    tx: mpsc::Sender<()>,
}

impl EdgeSemaphoreTx {
    /// Push a token after a successful apply. Non-blocking: if a token is
    /// already queued this is a deliberate no-op, not an error.
    pub fn push(&self) {
        let _ = self.tx.try_send(());
    }
}

/// The read half, held by the downstream vertex.
pub struct EdgeSemaphoreRx {
    rx: mpsc::Receiver<()>,
}

impl EdgeSemaphoreRx {
    /// Block until a token is available, then consume it.
    pub async fn drain(&mut self) {
        let _ = self.rx.recv().await;
    }

    /// Non-blocking drain used only at graph start, where each vertex must
    /// receive one token per incoming edge before its first apply (spec.md
    /// §3 "Edge semaphore" invariant) — callers that need the blocking
    /// first-token wait should use [`EdgeSemaphoreRx::drain`] instead.
    pub fn try_drain(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

/// Construct one edge semaphore: capacity exactly 1.
pub fn edge_semaphore() -> (EdgeSemaphoreTx, EdgeSemaphoreRx) {
    let (tx, rx) = mpsc::channel(1);
    (EdgeSemaphoreTx { tx }, EdgeSemaphoreRx { rx })
}

#[cfg(test)]
#[path = "semaphore_tests.rs"]
mod tests;
