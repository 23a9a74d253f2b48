// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cvg-engine: the live resource graph, its per-vertex state machines, the
//! graph executor, deterministic graph rewrites (AutoEdges/AutoGroup), the
//! convergence detector, and the graph swap coordinator (spec.md §4).

pub mod autoedges;
pub mod autogroup;
pub mod backoff;
pub mod convergence;
pub mod error;
pub mod executor;
pub mod graph;
pub mod mailbox;
pub mod semaphore;
pub mod swap;
pub mod vertex;

pub use convergence::{ConvergenceCallback, ConvergenceDetector, ConvergenceHandle};
pub use error::{EngineError, GraphError, SwapError};
pub use executor::{ExecutorHandle, GraphExecutor};
pub use graph::{Edge, Graph, VertexSlot};
pub use swap::{SwapCoordinator, SwapTrigger};
pub use vertex::{VertexHandle, VertexRuntime, VertexState};
