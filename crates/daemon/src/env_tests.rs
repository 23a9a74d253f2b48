// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

// Environment variables are process-global, so every case here runs
// sequentially inside one test rather than racing in parallel `#[test]`s.
#[test]
fn env_precedence_and_parsing() {
    for var in [
        "CVG_STATE_DIR",
        "XDG_STATE_HOME",
        "CVG_HOST_ID",
        "CVG_SEEDS",
        "CVG_NOOP",
        "CVG_CONVERGED_TIMEOUT_SECS",
        "CVG_MAX_RUNTIME_SECS",
        "CVG_REMOTES",
    ] {
        std::env::remove_var(var);
    }

    // working_prefix: explicit CVG_STATE_DIR wins over XDG_STATE_HOME.
    std::env::set_var("XDG_STATE_HOME", "/xdg");
    assert_eq!(working_prefix().unwrap(), PathBuf::from("/xdg/cvg"));
    std::env::set_var("CVG_STATE_DIR", "/explicit");
    assert_eq!(working_prefix().unwrap(), PathBuf::from("/explicit"));
    std::env::remove_var("CVG_STATE_DIR");
    std::env::remove_var("XDG_STATE_HOME");

    // host_id: explicit override wins.
    std::env::set_var("CVG_HOST_ID", "agent-1");
    assert_eq!(host_id().unwrap(), "agent-1");
    std::env::remove_var("CVG_HOST_ID");

    // cluster_seeds / remotes: comma-separated, trimmed, empties dropped.
    std::env::set_var("CVG_SEEDS", " a:1, b:2 ,,c:3");
    assert_eq!(cluster_seeds(), vec!["a:1", "b:2", "c:3"]);
    std::env::remove_var("CVG_SEEDS");
    assert_eq!(cluster_seeds(), Vec::<String>::new());

    // noop: "1" and "true" (any case) both enable it; default is off.
    assert!(!noop());
    std::env::set_var("CVG_NOOP", "1");
    assert!(noop());
    std::env::set_var("CVG_NOOP", "TRUE");
    assert!(noop());
    std::env::remove_var("CVG_NOOP");

    // converged_timeout: unset disables auto-exit, negative disables it
    // explicitly, otherwise parses seconds.
    assert_eq!(converged_timeout().unwrap(), None);
    std::env::set_var("CVG_CONVERGED_TIMEOUT_SECS", "-1");
    assert_eq!(converged_timeout().unwrap(), None);
    std::env::set_var("CVG_CONVERGED_TIMEOUT_SECS", "30");
    assert_eq!(converged_timeout().unwrap(), Some(Duration::from_secs(30)));
    std::env::set_var("CVG_CONVERGED_TIMEOUT_SECS", "not-a-number");
    assert!(converged_timeout().is_err());
    std::env::remove_var("CVG_CONVERGED_TIMEOUT_SECS");

    // max_runtime: unset means unbounded.
    assert_eq!(max_runtime(), None);
    std::env::set_var("CVG_MAX_RUNTIME_SECS", "3600");
    assert_eq!(max_runtime(), Some(Duration::from_secs(3600)));
    std::env::remove_var("CVG_MAX_RUNTIME_SECS");
}
