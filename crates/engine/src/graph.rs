// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The live resource graph (spec.md §3 "Graph", §9 "Cyclic references").
//!
//! Implemented as an arena: vertices live in a `Vec`, edges are pairs of
//! indices into it, and an identity map resolves a [`VertexId`] to its
//! index. This sidesteps the self-referential-structure problem a graph of
//! owned vertices pointing at each other would otherwise create, and is the
//! representation the executor's per-vertex runtime state (mailboxes,
//! semaphores, timers — held beside the graph, keyed by the same indices)
//! is built against.

use std::collections::{HashMap, HashSet, VecDeque};

use cvg_core::resource::ResourceRef;
use cvg_core::{Resource, VertexId};

use crate::error::GraphError;

/// One live vertex: a resource plus its stable identity.
#[derive(Clone)]
pub struct VertexSlot {
    pub id: VertexId,
    pub resource: ResourceRef,
}

/// A directed edge: "`to` must be applied after `from`" (spec.md §3
/// "Edge / Edge").
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
    pub name: String,
    pub notify: bool,
}

/// Cloning a `Graph` is cheap: every [`VertexSlot::resource`] is an `Arc`,
/// so a clone shares the underlying resources (and their live state, for a
/// carried-over vertex) with the original — used by the swap coordinator to
/// hand the executor a graph while retaining its own copy to diff against
/// on the next swap.
#[derive(Default, Clone)]
pub struct Graph {
    vertices: Vec<VertexSlot>,
    index: HashMap<VertexId, usize>,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Add a resource as a new vertex. Rejects a second vertex with the
    /// same identity (spec.md §3 "at most one vertex per identity per
    /// graph").
    pub fn add_vertex(&mut self, resource: ResourceRef) -> Result<usize, GraphError> {
        let id = resource.id();
        if self.index.contains_key(&id) {
            return Err(GraphError::DuplicateVertex(id));
        }
        let idx = self.vertices.len();
        self.index.insert(id, idx);
        self.vertices.push(VertexSlot { id, resource });
        Ok(idx)
    }

    pub fn index_of(&self, id: &VertexId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn vertex(&self, idx: usize) -> &VertexSlot {
        &self.vertices[idx]
    }

    /// Vertices in a stable order (sorted by kind then name), required by
    /// AutoEdges/AutoGroup determinism (spec.md §4.4).
    pub fn vertices_stable_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.vertices.len()).collect();
        order.sort_by(|&a, &b| {
            let va = &self.vertices[a];
            let vb = &self.vertices[b];
            (va.resource.kind(), va.resource.name()).cmp(&(vb.resource.kind(), vb.resource.name()))
        });
        order
    }

    /// Add an edge, rejecting unknown endpoints and any addition that would
    /// create a cycle (spec.md §3 invariants, §4.4 AutoEdges).
    pub fn add_edge(&mut self, from: VertexId, to: VertexId, name: impl Into<String>, notify: bool) -> Result<(), GraphError> {
        let from_idx = self.index_of(&from).ok_or(GraphError::UnknownEndpoint(from))?;
        let to_idx = self.index_of(&to).ok_or(GraphError::UnknownEndpoint(to))?;
        self.add_edge_by_index(from_idx, to_idx, name, notify)
    }

    pub fn add_edge_by_index(
        &mut self,
        from_idx: usize,
        to_idx: usize,
        name: impl Into<String>,
        notify: bool,
    ) -> Result<(), GraphError> {
        if from_idx == to_idx || self.reaches(to_idx, from_idx) {
            return Err(GraphError::WouldCycle {
                from: self.vertices[from_idx].id,
                to: self.vertices[to_idx].id,
            });
        }
        self.edges.push(Edge { from: from_idx, to: to_idx, name: name.into(), notify });
        Ok(())
    }

    /// True if there is already a directed path `from -> ... -> to`.
    fn reaches(&self, from: usize, to: usize) -> bool {
        if from == to {
            return true;
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([from]);
        while let Some(node) = queue.pop_front() {
            if !seen.insert(node) {
                continue;
            }
            for edge in &self.edges {
                if edge.from == node {
                    if edge.to == to {
                        return true;
                    }
                    queue.push_back(edge.to);
                }
            }
        }
        false
    }

    /// True if an edge `from -> to` already exists (ignoring name/notify).
    pub fn has_edge(&self, from_idx: usize, to_idx: usize) -> bool {
        self.edges.iter().any(|e| e.from == from_idx && e.to == to_idx)
    }

    pub fn outgoing(&self, idx: usize) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.from == idx)
    }

    pub fn incoming(&self, idx: usize) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.to == idx)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// A topological order (sources before successors), deterministic given
    /// a deterministic `vertices_stable_order` as tie-break among vertices
    /// that become ready at the same time. Used by the executor to wire
    /// edges vertex-by-vertex without a forward reference (spec.md §4.4).
    pub fn topological_order(&self) -> Result<Vec<usize>, GraphError> {
        let n = self.vertices.len();
        let stable_rank: HashMap<usize, usize> =
            self.vertices_stable_order().into_iter().enumerate().map(|(rank, idx)| (idx, rank)).collect();
        let mut in_degree = vec![0usize; n];
        for edge in &self.edges {
            in_degree[edge.to] += 1;
        }
        // Ready set ordered by stable rank rather than a plain FIFO queue:
        // whenever more than one vertex becomes ready at the same step
        // (e.g. both branches of a diamond), the lower-ranked one is always
        // emitted first, so the build order stays deterministic across
        // runs (spec.md §4.4).
        let mut ready: std::collections::BTreeSet<(usize, usize)> =
            (0..n).filter(|&i| in_degree[i] == 0).map(|i| (stable_rank[&i], i)).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(&(rank, node)) = ready.iter().next() {
            ready.remove(&(rank, node));
            order.push(node);
            for edge in self.outgoing(node) {
                in_degree[edge.to] -= 1;
                if in_degree[edge.to] == 0 {
                    ready.insert((stable_rank[&edge.to], edge.to));
                }
            }
        }
        if order.len() == n {
            Ok(order)
        } else {
            Err(GraphError::Cyclic)
        }
    }

    /// Reject a graph that contains a cycle (defensive re-check; building
    /// edges one at a time through [`Graph::add_edge`] already prevents
    /// this, but a graph assembled by other means — e.g. AutoGroup merging
    /// — must still be validated before the executor starts it).
    pub fn validate_acyclic(&self) -> Result<(), GraphError> {
        let n = self.vertices.len();
        let mut in_degree = vec![0usize; n];
        for edge in &self.edges {
            in_degree[edge.to] += 1;
        }
        let mut queue: VecDeque<usize> =
            (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut visited = 0;
        while let Some(node) = queue.pop_front() {
            visited += 1;
            for edge in self.outgoing(node) {
                in_degree[edge.to] -= 1;
                if in_degree[edge.to] == 0 {
                    queue.push_back(edge.to);
                }
            }
        }
        if visited == n {
            Ok(())
        } else {
            Err(GraphError::Cyclic)
        }
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
