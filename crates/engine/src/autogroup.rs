// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! AutoGroup: merge sibling vertices sharing a resource-provided grouping
//! key into one composite vertex, preserving external edges (spec.md §4.4).
//!
//! Grouping key is `(kind, autogroup_key)` — vertices with no
//! `autogroup_key` (the default) are never merged. Run after AutoEdges and,
//! per the swap coordinator's Open Question resolution (spec.md §9 /
//! SPEC_FULL.md §9), after identity matching so composites in the new graph
//! adopt live sub-vertices transferred from the old one.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cvg_core::resource::{identity_eq, Resource, ResourceError, ResourceMeta, ResourceRef};
use cvg_core::WatchHandle;
use futures_util::future::join_all;

use crate::error::GraphError;
use crate::graph::Graph;

/// A vertex standing in for several resources that share an autogroup key.
/// `check_apply` fans out to every member; the composite is satisfied only
/// when all members are.
pub struct CompositeResource {
    kind: String,
    name: String,
    meta: ResourceMeta,
    members: Vec<ResourceRef>,
}

impl CompositeResource {
    fn new(shared_kind: String, group_key: String, members: Vec<ResourceRef>) -> Self {
        let noop = members.iter().any(|m| m.meta().noop);
        let reverse = members.iter().any(|m| m.meta().reverse);
        Self {
            kind: "autogroup".to_string(),
            name: format!("{shared_kind}:{group_key}"),
            meta: ResourceMeta { noop, reverse, autogroup_key: None },
            members,
        }
    }

    pub fn members(&self) -> &[ResourceRef] {
        &self.members
    }
}

#[async_trait]
impl Resource for CompositeResource {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    async fn init(&self) -> Result<(), ResourceError> {
        for member in &self.members {
            member.init().await?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ResourceError> {
        for member in &self.members {
            member.validate()?;
        }
        Ok(())
    }

    async fn watch(&self, handle: WatchHandle) -> Result<(), ResourceError> {
        let tasks: Vec<_> = self
            .members
            .iter()
            .map(|member| {
                let member = member.clone();
                let handle = handle.clone();
                tokio::spawn(async move { member.watch(handle).await })
            })
            .collect();
        for task in tasks {
            match task.await {
                Ok(Err(err)) => tracing::error!(error = %err, "composite member watch failed"),
                Err(err) => tracing::error!(error = %err, "composite member watch task panicked"),
                Ok(Ok(())) => {}
            }
        }
        Ok(())
    }

    async fn check_apply(&self, apply: bool) -> Result<bool, ResourceError> {
        let results = join_all(self.members.iter().map(|m| m.check_apply(apply))).await;
        let mut all_ok = true;
        for result in results {
            all_ok &= result?;
        }
        Ok(all_ok)
    }

    fn compare(&self, other: &dyn Resource) -> bool {
        identity_eq(self, other)
    }

    async fn close(&self) -> Result<(), ResourceError> {
        for member in &self.members {
            member.close().await?;
        }
        Ok(())
    }

    fn member_identities(&self) -> Option<Vec<cvg_core::VertexId>> {
        Some(self.members.iter().map(|m| m.id()).collect())
    }
}

/// Build a new graph with autogroup-compatible siblings merged into
/// [`CompositeResource`] vertices. Deterministic: groups and their members
/// are processed in stable `(kind, name)` order (spec.md §4.4).
pub fn apply_auto_group(graph: &Graph) -> Result<Graph, GraphError> {
    let mut groups: HashMap<(String, String), Vec<usize>> = HashMap::new();
    for idx in graph.vertices_stable_order() {
        let resource = &graph.vertex(idx).resource;
        if let Some(key) = resource.meta().autogroup_key.clone() {
            groups.entry((resource.kind().to_string(), key)).or_default().push(idx);
        }
    }
    groups.retain(|_, members| members.len() > 1);

    let mut group_keys: Vec<_> = groups.keys().cloned().collect();
    group_keys.sort();

    let mut new_graph = Graph::new();
    let mut old_to_new: HashMap<usize, usize> = HashMap::new();

    for key in &group_keys {
        let member_indices = &groups[key];
        let members: Vec<ResourceRef> =
            member_indices.iter().map(|&i| graph.vertex(i).resource.clone()).collect();
        let composite = Arc::new(CompositeResource::new(key.0.clone(), key.1.clone(), members));
        let new_idx = new_graph.add_vertex(composite)?;
        for &old_idx in member_indices {
            old_to_new.insert(old_idx, new_idx);
        }
    }

    for idx in graph.vertices_stable_order() {
        if old_to_new.contains_key(&idx) {
            continue;
        }
        let new_idx = new_graph.add_vertex(graph.vertex(idx).resource.clone())?;
        old_to_new.insert(idx, new_idx);
    }

    for edge in graph.edges() {
        let from = old_to_new[&edge.from];
        let to = old_to_new[&edge.to];
        // An edge between two members of the same composite is absorbed by
        // the merge — both sides now execute as one vertex.
        if from == to || new_graph.has_edge(from, to) {
            continue;
        }
        new_graph.add_edge_by_index(from, to, edge.name.clone(), edge.notify)?;
    }

    new_graph.validate_acyclic()?;
    Ok(new_graph)
}

#[cfg(test)]
#[path = "autogroup_tests.rs"]
mod tests;
