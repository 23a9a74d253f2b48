// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted state layout (spec.md §6 "Persisted state layout"): a
//! working-prefix directory owned by the agent, containing subdirectories
//! per resource kind. The core only guarantees the directory exists and is
//! writable -- no format is imposed by the core (spec.md §6) -- and that it
//! is exclusively owned by one process at a time (spec.md §5 "The on-disk
//! working prefix is exclusively owned by one process").

use std::fs::File;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::StorageError;

/// Exclusive ownership handle over a working-prefix directory. Dropping
/// this releases the lock (via `File`'s own `Drop`, same as the teacher's
/// `fs2`-based daemon lock), so the caller keeps it alive for the life of
/// the process.
pub struct WorkingPrefix {
    root: PathBuf,
    _lock: File,
}

impl WorkingPrefix {
    /// Create (if needed) and exclusively lock `root`. Fails with
    /// [`StorageError::Locked`] if another process already holds the lock
    /// -- the precondition spec.md §5 assumes the caller enforces.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        let lock_path = root.join(".lock");
        let lock = File::options().write(true).create(true).truncate(false).open(&lock_path)?;
        lock.try_lock_exclusive().map_err(StorageError::Locked)?;

        Ok(Self { root, _lock: lock })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Subdirectory for one resource kind's persisted state, creating it on
    /// first use. The engine imposes no format on what a resource writes
    /// there (spec.md §6).
    pub fn kind_dir(&self, kind: &str) -> Result<PathBuf, StorageError> {
        let dir = self.root.join(kind);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

#[cfg(test)]
#[path = "workdir_tests.rs"]
mod tests;
