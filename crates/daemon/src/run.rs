// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon wiring: construct the engine's pieces from a [`RunOptions`] and
//! drive them for the life of the process (spec.md §6 "Operational
//! surface"), following the teacher's startup/shutdown sequencing in
//! `oj-daemon`'s `lifecycle/startup.rs`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cvg_core::SystemClock;
use cvg_engine::convergence::{ConvergenceCallback, ConvergenceDetector};
use cvg_engine::executor::spawn_executor;
use cvg_engine::graph::Graph;
use cvg_engine::swap::{spawn_trigger_fanin, ConfigSource, Store};
use cvg_engine::{GraphExecutor, SwapCoordinator};
use cvg_storage::WorkingPrefix;

use crate::error::DaemonError;

/// Everything the daemon needs to start one agent (spec.md §6 "one run
/// command with options for desired-state source, cluster seeds, host
/// identity, noop mode, converged-timeout T, max-runtime, working prefix,
/// and remote list"). Cluster seeds and remotes are carried through purely
/// for the (out of scope) store/bootstrap adapters the caller constructs;
/// the engine itself never reads them.
pub struct RunOptions {
    pub config_source: Arc<dyn ConfigSource>,
    pub store: Option<Arc<dyn Store>>,
    /// Key prefix the store is watched under for cross-host coordination
    /// records written during a graph swap (spec.md §4.6 step 5).
    pub store_key_prefix: String,
    pub working_prefix: PathBuf,
    pub host_id: String,
    pub noop: bool,
    /// `None` disables auto-exit-on-convergence (spec.md §6 "negative T
    /// disables auto-exit").
    pub converged_timeout: Option<Duration>,
    pub max_runtime: Option<Duration>,
    pub swap_tick_interval: Duration,
}

/// Run the agent until an exit is requested (Ctrl-C, the max-runtime
/// watchdog, or the caller dropping every clone of `exit`), then tear down
/// in the order spec.md §7(e) mandates: stop config watchers, exit
/// remotes (no-op, out of scope), exit the executor, destroy the store.
pub async fn run(opts: RunOptions) -> Result<(), DaemonError> {
    let _working_prefix = WorkingPrefix::open(&opts.working_prefix)?;
    tracing::info!(host_id = %opts.host_id, noop = opts.noop, "agent starting");

    if let Some(store) = &opts.store {
        store.startup().await.map_err(|err| DaemonError::StoreStartup(err.to_string()))?;
        tracing::info!("store started up");
    }

    let (exit_tx, exit_rx) = tokio::sync::watch::channel(false);

    // Converged-timeout T doubles as the auto-exit trigger (spec.md §6
    // "converged-timeout T (negative disables auto-exit)"): a negative T is
    // resolved to `None` by `env::converged_timeout`, which disables the
    // detector outright, so it never calls back and this agent simply never
    // auto-exits.
    let auto_exit_tx = exit_tx.clone();
    let callback: ConvergenceCallback = Box::new(move |converged| {
        tracing::info!(converged, "convergence state changed");
        if converged {
            let _ = auto_exit_tx.send(true);
        }
        Ok(())
    });
    let (detector, convergence) = ConvergenceDetector::new(SystemClock, opts.converged_timeout, callback);
    tokio::spawn(detector.run());

    let executor = GraphExecutor::new(Graph::new(), convergence, opts.noop);
    let executor_handle = spawn_executor(executor);
    executor_handle.start(true).await?;

    let swap = SwapCoordinator::new(executor_handle.clone(), Graph::new());

    let store_pair = opts.store.as_deref().map(|s| (s, opts.store_key_prefix.clone()));
    let triggers = spawn_trigger_fanin(opts.config_source.as_ref(), store_pair, opts.swap_tick_interval, exit_rx);

    if let Some(max_runtime) = opts.max_runtime {
        let exit_tx = exit_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(max_runtime).await;
            tracing::warn!(?max_runtime, "max runtime exceeded, requesting shutdown");
            let _ = exit_tx.send(true);
        });
    }

    let ctrl_c_exit_tx = exit_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received interrupt, requesting shutdown");
            let _ = ctrl_c_exit_tx.send(true);
        }
    });

    // Blocks until spawn_trigger_fanin observes `exit_tx` flip (spec.md
    // §4.6 "fan-in of ... an exit event") -- step "stop config watchers"
    // happens implicitly when this loop returns and drops the fan-in task's
    // receiver handles.
    swap.run(opts.config_source.as_ref(), triggers).await;
    tracing::info!("config/store watch loop stopped");

    executor_handle.exit().await;
    tracing::info!("executor exited");

    if let Some(store) = &opts.store {
        if let Err(err) = store.destroy().await {
            tracing::warn!(error = %err, "store destroy failed during shutdown");
        } else {
            tracing::info!("store destroyed");
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
