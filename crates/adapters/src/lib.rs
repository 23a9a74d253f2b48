// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! cvg-adapters: the external-collaborator boundary (spec.md §6) —
//! `ConfigSource` and `Store`, re-exported from `cvg-engine` where they are
//! defined (their signatures return `cvg_engine::Graph`), plus test-only
//! fakes of each so `cvg-engine` and `cvg-daemon` tests run without a real
//! configuration reader or replicated store (neither is in scope, spec.md
//! §1 "deliberately out of scope").

pub use cvg_engine::swap::{ConfigError, ConfigSource, Store, StoreError, StoreEvent};

#[cfg(any(test, feature = "test-support"))]
pub mod fakes;

#[cfg(any(test, feature = "test-support"))]
pub use fakes::{FakeConfigSource, FakeStore};
