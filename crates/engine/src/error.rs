// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-level errors (spec.md §7).

use cvg_core::{ResourceError, VertexId};
use thiserror::Error;

/// Errors raised while building or validating a [`crate::graph::Graph`]
/// (spec.md §7a "configuration errors" — rejected at parse/validate time,
/// never mutate running state).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate vertex identity: {0}")]
    DuplicateVertex(VertexId),
    #[error("edge references unknown vertex: {0}")]
    UnknownEndpoint(VertexId),
    #[error("adding edge {from} -> {to} would create a cycle")]
    WouldCycle { from: VertexId, to: VertexId },
    #[error("graph contains a cycle")]
    Cyclic,
}

/// Errors raised while executing the graph.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("resource error on vertex {vertex}: {source}")]
    Resource { vertex: VertexId, #[source] source: ResourceError },
    #[error(transparent)]
    Swap(#[from] SwapError),
    #[error("vertex {0} did not exit within the grace period")]
    ExitTimeout(VertexId),
}

/// Errors that abort a graph swap, leaving the previously running graph
/// untouched (spec.md §4.6 step 5, §7d).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SwapError {
    /// Either the merged graph itself is malformed (cyclic, a duplicate
    /// identity introduced by AutoGroup) or a vertex in it failed
    /// `Resource::validate` (spec.md §9 "a vertex that fails validation on
    /// swap ... the safe choice is to abort the swap").
    #[error("new graph failed validation: {0}")]
    ValidationFailed(String),
    #[error("failed to write coordination record to the external store: {0}")]
    StoreWrite(String),
    #[error("failed to activate the merged graph: {0}")]
    ActivationFailed(String),
}

impl From<GraphError> for SwapError {
    fn from(err: GraphError) -> Self {
        SwapError::ValidationFailed(err.to_string())
    }
}
