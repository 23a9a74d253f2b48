// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cvg-core: shared data model for the resource reconciliation engine.
//!
//! Defines the [`Resource`] contract every resource driver implements, the
//! [`Event`] shape that flows through vertex mailboxes, the [`VertexId`]
//! identity type, and a testable [`Clock`] abstraction used throughout the
//! engine for convergence timers and backoff.

pub mod macros;

pub mod clock;
pub mod error;
pub mod event;
pub mod id;
pub mod resource;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use error::CoreError;
pub use event::{Event, EventKind, Responder};
pub use id::{short, IdBuf};
pub use resource::{Resource, ResourceError, ResourceMeta, VertexId};

#[cfg(any(test, feature = "test-support"))]
pub use test_support::FakeResource;
