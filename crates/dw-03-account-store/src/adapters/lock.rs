//! # Data Directory Lock
//!
//! Keeps two wallet processes from sharing one data directory. Uses `fs2`
//! (flock on Unix, LockFile on Windows); the OS drops the lock when the
//! process dies, so a lock left by a crash never blocks a restart.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("failed to create lock file {}: {source}", .path.display())]
    CreateFailed { path: PathBuf, source: io::Error },

    #[error("data directory {} already in use (pid {pid:?})", .path.display())]
    AlreadyLocked { pid: Option<u32>, path: PathBuf },
}

/// Exclusive lock on a data directory, released on drop.
pub struct DatabaseLock {
    file: File,
    path: PathBuf,
}

impl DatabaseLock {
    const LOCK_FILE: &'static str = "LOCK";

    /// Take the lock without waiting.
    pub fn acquire(data_dir: &Path) -> Result<Self, LockError> {
        let path = data_dir.join(Self::LOCK_FILE);
        let create_failed = |source| LockError::CreateFailed {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(data_dir).map_err(create_failed)?;

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(create_failed)?;

        if file.try_lock_exclusive().is_err() {
            return Err(LockError::AlreadyLocked {
                pid: Self::read_existing_pid(&path),
                path,
            });
        }

        // Best effort; the PID only improves the error other processes see.
        let pid = std::process::id();
        if file.set_len(0).is_ok() {
            let _ = writeln!(file, "{pid}").and_then(|_| file.sync_all());
        }
        debug!(path = %path.display(), pid, "[dw-03] Data directory locked");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_existing_pid(path: &Path) -> Option<u32> {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }
}

impl Drop for DatabaseLock {
    fn drop(&mut self) {
        #[allow(clippy::incompatible_msrv)]
        let _ = FileExt::unlock(&self.file);
    }
}
