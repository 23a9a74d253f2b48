// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crate-wide error type for failures that originate in `cvg-core` itself
//! (as opposed to resource-driver errors, which are [`crate::ResourceError`]).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),
}
