// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage errors (spec.md §7e: "inability to create working prefix" is a
//! fatal error that terminates the process after best-effort teardown).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("working prefix is already owned by another process: {0}")]
    Locked(std::io::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
