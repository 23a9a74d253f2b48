// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon-level errors (spec.md §7e "fatal errors").
//!
//! Everything reaching this type is an infrastructure failure -- resource
//! driver errors never propagate this far (spec.md §7 "Propagation").

use thiserror::Error;

use crate::env::EnvError;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error(transparent)]
    Storage(#[from] cvg_storage::StorageError),
    #[error("store startup failed: {0}")]
    StoreStartup(String),
    #[error(transparent)]
    Engine(#[from] cvg_engine::EngineError),
}
