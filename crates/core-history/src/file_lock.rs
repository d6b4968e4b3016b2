//! Cross-process advisory lock on `<history>.lock`.
//!
//! `flock(2)` locks belong to the open file description, so two guards in the
//! same process exclude each other just like guards in different processes.
//! The lock file is created on demand and never removed.

use crate::HistoryError;
use rustix::fs::{FlockOperation, flock};
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Lock guarding `history`: the same path with `.lock` appended.
    pub fn for_file(history: &Path) -> Self {
        let mut name = OsString::from(history.as_os_str());
        name.push(".lock");
        Self::new(name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the exclusive lock is held.
    pub fn acquire(&self) -> Result<FileLockGuard, HistoryError> {
        let lock_err = |source: std::io::Error| HistoryError::Lock {
            path: self.path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(lock_err)?;
        flock(&file, FlockOperation::LockExclusive).map_err(|e| lock_err(e.into()))?;
        tracing::trace!(target: "history.lock", path = %self.path.display(), "acquired");
        Ok(FileLockGuard {
            file,
            path: self.path.clone(),
        })
    }
}

/// Held exclusive lock; unlocked on drop.
#[derive(Debug)]
pub struct FileLockGuard {
    file: File,
    path: PathBuf,
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        match flock(&self.file, FlockOperation::Unlock) {
            Ok(()) => {
                tracing::trace!(target: "history.lock", path = %self.path.display(), "released")
            }
            Err(e) => tracing::warn!(
                target: "history.lock",
                path = %self.path.display(),
                error = %e,
                "unlock_failed"
            ),
        }
    }
}
