// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted [`ConfigSource`] and [`Store`] doubles for `cvg-engine` and
//! `cvg-daemon` tests, mirroring the style of `cvg_core::test_support`'s
//! `FakeResource` (a small queue of canned responses, a handle the test
//! drives directly, no background I/O).

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use cvg_engine::Graph;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{ConfigError, ConfigSource, Store, StoreError, StoreEvent};

/// Hands back one scripted `Graph` (or error) per call to `parse_config`,
/// repeating the last entry once the queue drains. `ready()` pushes a
/// value onto the watch channel the same way a real file watcher would.
pub struct FakeConfigSource {
    responses: Mutex<VecDeque<Result<Graph, ConfigError>>>,
    watch_tx: Mutex<Option<mpsc::Sender<bool>>>,
}

impl Default for FakeConfigSource {
    fn default() -> Self {
        Self { responses: Mutex::new(VecDeque::new()), watch_tx: Mutex::new(None) }
    }
}

impl FakeConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next `parse_config` result.
    pub fn push(&self, result: Result<Graph, ConfigError>) {
        self.responses.lock().push_back(result);
    }

    /// Post a ready signal on the watch channel, as a real config source
    /// would after observing the underlying definition change.
    pub async fn signal_ready(&self, ready: bool) {
        let tx = self.watch_tx.lock().clone();
        if let Some(tx) = tx {
            let _ = tx.send(ready).await;
        }
    }
}

#[async_trait]
impl ConfigSource for FakeConfigSource {
    async fn parse_config(&self) -> Result<Graph, ConfigError> {
        let mut responses = self.responses.lock();
        // Drain down to the last queued response, then keep repeating it --
        // a real config source re-parses the same file every call too.
        if responses.len() > 1 {
            return responses.pop_front().expect("len > 1 checked above");
        }
        match responses.front() {
            Some(Ok(graph)) => Ok(graph.clone()),
            Some(Err(err)) => Err(err.clone()),
            None => Ok(Graph::new()),
        }
    }

    fn watch(&self) -> mpsc::Receiver<bool> {
        let (tx, rx) = mpsc::channel(8);
        *self.watch_tx.lock() = Some(tx);
        rx
    }
}

/// In-memory [`Store`]: a plain map plus a scripted watch channel, no
/// networking or persistence -- the real replicated store is out of scope
/// (spec.md §1).
#[derive(Default)]
pub struct FakeStore {
    data: Mutex<std::collections::HashMap<String, Vec<u8>>>,
    watch_tx: Mutex<Option<mpsc::Sender<StoreEvent>>>,
    fail_set_txn: Mutex<bool>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next (and every subsequent) `set_txn` call fail, modeling
    /// the "write coordination record" failure path the swap coordinator
    /// must abort on (spec.md §4.6 step 5).
    pub fn fail_set_txn(&self) {
        *self.fail_set_txn.lock() = true;
    }

    pub async fn emit(&self, event: StoreEvent) {
        let tx = self.watch_tx.lock().clone();
        if let Some(tx) = tx {
            let _ = tx.send(event).await;
        }
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn startup(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn destroy(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn watch(&self, _key_prefix: &str) -> mpsc::Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel(8);
        *self.watch_tx.lock() = Some(tx);
        rx
    }

    async fn set_txn(&self, writes: Vec<(String, Vec<u8>)>) -> Result<(), StoreError> {
        if *self.fail_set_txn.lock() {
            return Err(StoreError::Op("fake store rejected the transaction".to_string()));
        }
        let mut data = self.data.lock();
        for (key, value) in writes {
            data.insert(key, value);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn local_client_urls(&self) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
#[path = "fakes_tests.rs"]
mod tests;
