// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test-only [`Resource`] implementation driving the engine's tests without
//! a real resource-type driver (none is in scope — spec.md §1).

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::resource::{identity_eq, Resource, ResourceError, ResourceMeta, WatchHandle};

/// Scripted state a [`FakeResource`] can be told to report.
#[derive(Clone)]
pub struct FakeResourceState {
    /// `check_apply` returns `Ok(true)` (already satisfied) once this many
    /// prior calls have happened; before that it returns `Ok(false)` and
    /// "applies".
    satisfied_after_calls: Arc<AtomicU32>,
    calls: Arc<AtomicU32>,
    /// When `Some`, `check_apply` returns this error for the next N calls
    /// (decremented each call) before falling through to normal behavior —
    /// models the transient-failure-then-success scenario (spec.md §8 S5).
    fail_next: Arc<AtomicU32>,
    applied: Arc<AtomicBool>,
    /// Remaining number of `watch()` calls that should return immediately
    /// with an error instead of blocking on `closed()` — models repeated
    /// watcher failure and restart (spec.md §7c).
    fail_watch: Arc<AtomicU32>,
    watch_calls: Arc<AtomicU32>,
    /// Signaled by [`FakeResource::trigger_external_change`] to make a live
    /// `watch()` call post a notification, modeling external-world drift
    /// observed by a real watcher (spec.md §8 S3).
    external_change: Arc<Notify>,
}

impl Default for FakeResourceState {
    fn default() -> Self {
        Self {
            satisfied_after_calls: Arc::new(AtomicU32::new(0)),
            calls: Arc::new(AtomicU32::new(0)),
            fail_next: Arc::new(AtomicU32::new(0)),
            applied: Arc::new(AtomicBool::new(false)),
            fail_watch: Arc::new(AtomicU32::new(0)),
            watch_calls: Arc::new(AtomicU32::new(0)),
            external_change: Arc::new(Notify::new()),
        }
    }
}

/// A resource whose desired/observed state, meta flags, and failure
/// schedule are all controlled by the test.
pub struct FakeResource {
    kind: String,
    name: String,
    meta: ResourceMeta,
    auto_edges: Vec<(String, String)>,
    /// How long a `check_apply` call that actually applies sleeps before
    /// returning — widens the window in which an `Exit` posted concurrently
    /// lands while the vertex is still inside `check_apply` (spec.md §8 S6).
    apply_delay: std::time::Duration,
    state: FakeResourceState,
    apply_log: Arc<Mutex<Vec<u32>>>,
}

crate::builder! {
    pub struct FakeResourceBuilder => FakeResource {
        into { kind: String = "test" }
        into { name: String = "r" }
        set { meta: ResourceMeta = ResourceMeta::default() }
        set { auto_edges: Vec<(String, String)> = Vec::new() }
        set { apply_delay: std::time::Duration = std::time::Duration::ZERO }
        computed { state: FakeResourceState = FakeResourceState::default() }
        computed { apply_log: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new())) }
    }
}

impl FakeResource {
    /// Fail the next `n` `check_apply` calls with a transient error before
    /// resuming normal (satisfied/unsatisfied) behavior.
    pub fn fail_next_calls(&self, n: u32) {
        self.state.fail_next.store(n, Ordering::SeqCst);
    }

    /// Already satisfied on every future `check_apply` call from now on.
    pub fn mark_satisfied(&self) {
        self.state.satisfied_after_calls.store(0, Ordering::SeqCst);
        self.state.applied.store(true, Ordering::SeqCst);
    }

    /// Drift: the next `check_apply` call observes the state as
    /// unsatisfied again.
    pub fn mark_drifted(&self) {
        self.state.applied.store(false, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> u32 {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Make the next `n` calls to `watch()` fail immediately instead of
    /// blocking on `closed()`.
    pub fn fail_next_watches(&self, n: u32) {
        self.state.fail_watch.store(n, Ordering::SeqCst);
    }

    pub fn watch_call_count(&self) -> u32 {
        self.state.watch_calls.load(Ordering::SeqCst)
    }

    /// Wake a live `watch()` call so it posts a single change notification,
    /// as a real driver would on observing external drift.
    pub fn trigger_external_change(&self) {
        self.state.external_change.notify_one();
    }

    /// Sequence of call indices at which this resource actually applied
    /// (as opposed to observing itself already satisfied) — used by the
    /// apply-ordering invariant tests (spec.md §8 invariant 1/2).
    pub fn apply_log(&self) -> Vec<u32> {
        self.apply_log.lock().clone()
    }
}

#[async_trait]
impl Resource for FakeResource {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    async fn init(&self) -> Result<(), ResourceError> {
        Ok(())
    }

    fn validate(&self) -> Result<(), ResourceError> {
        Ok(())
    }

    async fn watch(&self, mut handle: WatchHandle) -> Result<(), ResourceError> {
        self.state.watch_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.state.fail_watch.load(Ordering::SeqCst);
        if remaining > 0 {
            self.state.fail_watch.store(remaining - 1, Ordering::SeqCst);
            return Err(ResourceError::Watch(format!("fake watch failure ({remaining} remaining)")));
        }
        loop {
            tokio::select! {
                _ = handle.closed() => return Ok(()),
                _ = self.state.external_change.notified() => handle.notify().await,
            }
        }
    }

    async fn check_apply(&self, apply: bool) -> Result<bool, ResourceError> {
        let call_index = self.state.calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.state.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.state.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(ResourceError::CheckApply(format!(
                "fake transient failure ({remaining} remaining)"
            )));
        }

        if self.state.applied.load(Ordering::SeqCst) {
            return Ok(true);
        }
        if apply {
            if !self.apply_delay.is_zero() {
                tokio::time::sleep(self.apply_delay).await;
            }
            self.apply_log.lock().push(call_index);
            self.state.applied.store(true, Ordering::SeqCst);
        }
        Ok(false)
    }

    fn compare(&self, other: &dyn Resource) -> bool {
        identity_eq(self, other)
    }

    async fn close(&self) -> Result<(), ResourceError> {
        Ok(())
    }

    fn auto_edges(&self) -> Vec<(String, String)> {
        self.auto_edges.clone()
    }
}

#[cfg(test)]
#[path = "test_support_tests.rs"]
mod tests;
