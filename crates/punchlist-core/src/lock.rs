use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;

use crate::store::state_dir;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Timed out after {waited:?} waiting for ledger lock at {path}")]
    Timeout { path: PathBuf, waited: Duration },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

pub fn lock_path(repo_root: &Path) -> PathBuf {
    state_dir(repo_root).join("punchlist.lock")
}

/// Exclusive advisory lock held while the ledger document is rewritten.
///
/// The lock lives in the sidecar state directory, never next to the document,
/// so a locked repo still round-trips cleanly through plain file copies.
#[derive(Debug)]
pub struct LedgerLock {
    file: File,
    path: PathBuf,
}

impl LedgerLock {
    pub fn acquire(repo_root: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = lock_path(repo_root);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let start = Instant::now();
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&path)?;

            if file.try_lock_exclusive().is_ok() {
                return Ok(Self { file, path });
            }

            if start.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    path,
                    waited: start.elapsed(),
                });
            }

            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Explicitly release the lock. Release also happens automatically on drop.
    pub fn release(self) {
        let _ = self.file.unlock();
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::{LedgerLock, LockError};
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn lock_acquires_and_releases() {
        let temp = TempDir::new().expect("tempdir");
        let lock = LedgerLock::acquire(temp.path(), Duration::from_millis(50)).expect("acquire");
        assert!(lock.path().starts_with(temp.path()));
        lock.release();
    }

    #[test]
    fn second_acquire_times_out_while_held() {
        let temp = TempDir::new().expect("tempdir");
        let _held = LedgerLock::acquire(temp.path(), Duration::from_millis(50)).expect("acquire");

        let started = std::time::Instant::now();
        let err = LedgerLock::acquire(temp.path(), Duration::from_millis(20)).expect_err("held");
        assert!(matches!(err, LockError::Timeout { .. }));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn drop_releases_for_follow_up_acquire() {
        let temp = TempDir::new().expect("tempdir");
        {
            let _first =
                LedgerLock::acquire(temp.path(), Duration::from_millis(50)).expect("first");
        }
        let second = LedgerLock::acquire(temp.path(), Duration::from_millis(50)).expect("second");
        second.release();
    }
}
