// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate (spec.md
//! §6 "Operational surface"). CLI argument parsing is an explicit external
//! collaborator (spec.md §1); this crate reads its run options entirely
//! from the environment, the way the teacher's `env.rs` resolves its state
//! directory.

use std::path::PathBuf;
use std::time::Duration;

/// Resolve the working-prefix directory: `CVG_STATE_DIR` >
/// `XDG_STATE_HOME/cvg` > `~/.local/state/cvg`.
pub fn working_prefix() -> Result<PathBuf, EnvError> {
    if let Ok(dir) = std::env::var("CVG_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("cvg"));
    }
    let home = dirs::home_dir().ok_or(EnvError::NoHomeDir)?;
    Ok(home.join(".local/state/cvg"))
}

/// `CVG_HOST_ID`: this agent's identity within the cluster. Falls back to
/// the machine hostname.
pub fn host_id() -> Result<String, EnvError> {
    if let Ok(id) = std::env::var("CVG_HOST_ID") {
        return Ok(id);
    }
    hostname().ok_or(EnvError::NoHostId)
}

#[cfg(unix)]
fn hostname() -> Option<String> {
    std::env::var("HOSTNAME").ok().or_else(|| {
        let output = std::process::Command::new("hostname").output().ok()?;
        String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
    })
}

#[cfg(not(unix))]
fn hostname() -> Option<String> {
    std::env::var("HOSTNAME").ok()
}

/// `CVG_SEEDS`: comma-separated peer addresses for cluster bootstrap, used
/// only to construct the (out of scope) embedded store -- the engine never
/// inspects it.
pub fn cluster_seeds() -> Vec<String> {
    std::env::var("CVG_SEEDS")
        .ok()
        .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

/// `CVG_NOOP`: global noop flag (spec.md §6 "noop mode").
pub fn noop() -> bool {
    std::env::var("CVG_NOOP").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// `CVG_CONVERGED_TIMEOUT_SECS`: converged-timeout T in seconds. Negative
/// disables auto-exit, mapped to [`None`] (spec.md §6 "negative T disables
/// auto-exit"). Unset defaults to disabled too -- a daemon with no
/// configured timeout keeps running indefinitely, converged or not.
pub fn converged_timeout() -> Result<Option<Duration>, EnvError> {
    match std::env::var("CVG_CONVERGED_TIMEOUT_SECS") {
        Ok(raw) => {
            let secs: i64 = raw.parse().map_err(|_| EnvError::InvalidTimeout(raw))?;
            Ok(if secs < 0 { None } else { Some(Duration::from_secs(secs as u64)) })
        }
        Err(_) => Ok(None),
    }
}

/// `CVG_MAX_RUNTIME_SECS`: global max-runtime watchdog (spec.md §5). `None`
/// means unbounded.
pub fn max_runtime() -> Option<Duration> {
    std::env::var("CVG_MAX_RUNTIME_SECS").ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_secs)
}

/// `CVG_REMOTES`: comma-separated remote-agent hostnames this agent
/// bootstraps over secure shell (out of scope, spec.md §1 -- carried
/// through only as configuration, never dialed here).
pub fn remotes() -> Vec<String> {
    std::env::var("CVG_REMOTES")
        .ok()
        .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Periodic manifest-compile tick interval (spec.md §4.6 "periodic
/// manifest-compile ticks"), overridable for tests.
pub fn swap_tick_interval() -> Duration {
    std::env::var("CVG_SWAP_TICK_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(30))
}

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("could not determine a home directory for the default state dir; set CVG_STATE_DIR")]
    NoHomeDir,
    #[error("could not determine a host identity; set CVG_HOST_ID")]
    NoHostId,
    #[error("invalid CVG_CONVERGED_TIMEOUT_SECS value: {0}")]
    InvalidTimeout(String),
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
