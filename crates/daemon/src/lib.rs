// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cvg-daemon: the agent's operational surface (spec.md §6) -- reads run
//! options from the environment, wires the engine's convergence detector,
//! graph executor, and swap coordinator together, and drives them for the
//! life of the process. The desired-state reader and replicated store it
//! wires in are supplied by the binary entry point; this crate only
//! depends on their trait boundary.

pub mod env;
pub mod error;
pub mod null_adapters;
pub mod run;

pub use error::DaemonError;
pub use null_adapters::{NullConfigSource, NullStore};
pub use run::{run, RunOptions};
