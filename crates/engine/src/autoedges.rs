// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! AutoEdges: deterministic graph rewrite adding the dependencies a
//! resource implies on its own, before the executor starts (spec.md §4.4).

use cvg_core::VertexId;

use crate::error::GraphError;
use crate::graph::Graph;

/// For each vertex, in stable (kind, name) order, ask the resource for the
/// automatic dependencies it implies and add the missing edges. Additions
/// that would create a cycle are rejected and skipped rather than aborting
/// the whole pass — spec.md §4.4 only requires edges "not already present,
/// preserving acyclicity", it does not require every implied edge to land.
pub fn apply_auto_edges(graph: &mut Graph) -> Result<(), GraphError> {
    for idx in graph.vertices_stable_order() {
        let mut deps = graph.vertex(idx).resource.auto_edges();
        // Deterministic within a vertex: the order the resource returns
        // them in is preserved (spec.md §4.4), but duplicate target pairs
        // collapse naturally via `has_edge` below.
        deps.sort();
        deps.dedup();
        for (kind, name) in deps {
            let from_id = VertexId::for_kind_name(&kind, &name);
            let Some(from_idx) = graph.index_of(&from_id) else {
                // Implied dependency isn't part of this graph; nothing to
                // link to.
                continue;
            };
            if from_idx == idx || graph.has_edge(from_idx, idx) {
                continue;
            }
            match graph.add_edge_by_index(from_idx, idx, "auto", false) {
                Ok(()) => {}
                Err(GraphError::WouldCycle { from, to }) => {
                    tracing::warn!(%from, %to, "auto-edge skipped: would create a cycle");
                }
                Err(err) => return Err(err),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "autoedges_tests.rs"]
mod tests;
