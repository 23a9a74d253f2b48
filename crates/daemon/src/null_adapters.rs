// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Zero-configuration default [`ConfigSource`]/[`Store`]: an always-empty
//! graph and a store that never persists anything. Real desired-state
//! readers and the embedded replicated store are external collaborators
//! specified only by trait (spec.md §1, §6) -- this binary ships runnable
//! out of the box against these no-op defaults, and an embedder wires in
//! real adapters by constructing [`crate::run::RunOptions`] directly
//! instead of going through [`crate::main`]'s env-driven wiring.

use async_trait::async_trait;
use cvg_engine::graph::Graph;
use cvg_engine::swap::{ConfigError, ConfigSource, Store, StoreError, StoreEvent};
use tokio::sync::mpsc;

/// Always resolves to an empty [`Graph`] and never signals a watch update
/// -- an agent run against this source converges immediately and stays
/// quiescent forever.
#[derive(Default)]
pub struct NullConfigSource;

#[async_trait]
impl ConfigSource for NullConfigSource {
    async fn parse_config(&self) -> Result<Graph, ConfigError> {
        Ok(Graph::new())
    }

    fn watch(&self) -> mpsc::Receiver<bool> {
        let (_tx, rx) = mpsc::channel(1);
        rx
    }
}

/// A [`Store`] that accepts writes and discards them -- adequate for a
/// single, non-clustered agent with no peers to coordinate with.
#[derive(Default)]
pub struct NullStore;

#[async_trait]
impl Store for NullStore {
    async fn startup(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn destroy(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn watch(&self, _key_prefix: &str) -> mpsc::Receiver<StoreEvent> {
        let (_tx, rx) = mpsc::channel(1);
        rx
    }

    async fn set_txn(&self, _writes: Vec<(String, Vec<u8>)>) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(None)
    }

    fn local_client_urls(&self) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
#[path = "null_adapters_tests.rs"]
mod tests;
