// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cvgd`: the agent process. Resolves run options from the environment
//! (spec.md §6 "Operational surface") and drives [`cvg_daemon::run::run`]
//! until shutdown. Exit code 0 on clean shutdown, non-zero on startup
//! validation failure (spec.md §6).

use std::sync::Arc;

use cvg_daemon::{env, run, NullConfigSource, NullStore, RunOptions};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "cvgd starting");

    match build_options() {
        Ok(opts) => {
            if let Err(err) = run(opts).await {
                tracing::error!(error = %err, "agent exited with a fatal error");
                std::process::exit(1);
            }
            tracing::info!("agent shut down cleanly");
        }
        Err(err) => {
            tracing::error!(error = %err, "startup validation failed");
            std::process::exit(1);
        }
    }
}

fn build_options() -> Result<RunOptions, cvg_daemon::DaemonError> {
    let host_id = env::host_id()?;
    let working_prefix = env::working_prefix()?;
    let converged_timeout = env::converged_timeout()?;
    let seeds = env::cluster_seeds();
    let remotes = env::remotes();
    if !seeds.is_empty() {
        tracing::info!(?seeds, "cluster seeds configured (embedded store is an external collaborator, unused by this build)");
    }
    if !remotes.is_empty() {
        tracing::info!(?remotes, "remote agents configured (bootstrap over secure shell is an external collaborator, unused by this build)");
    }

    Ok(RunOptions {
        config_source: Arc::new(NullConfigSource),
        store: Some(Arc::new(NullStore)),
        store_key_prefix: format!("cvg/{host_id}/"),
        working_prefix,
        host_id,
        noop: env::noop(),
        converged_timeout,
        max_runtime: env::max_runtime(),
        swap_tick_interval: env::swap_tick_interval(),
    })
}
