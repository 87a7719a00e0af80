// src/lock.rs

//! Process-wide exclusive advisory lock.
//!
//! The lock is tied to the open file description: dropping the guard (or the
//! process exiting for any reason) releases it. There is no explicit unlock.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tracing::debug;

use crate::errors::{BackupError, Result};

/// Held for the duration of a backup run.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    _lock: Flock<File>,
}

impl LockGuard {
    /// Open (or create) `path` and take a non-blocking exclusive lock on it.
    ///
    /// Only an interrupted system call is retried. A lock held elsewhere is
    /// reported immediately as [`BackupError::LockBusy`].
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o644)
            .open(&path)
            .map_err(|cause| BackupError::Lock {
                path: path.clone(),
                cause,
            })?;

        loop {
            match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(lock) => {
                    debug!(path = %path.display(), "acquired exclusive lock");
                    return Ok(Self { path, _lock: lock });
                }
                Err((returned, Errno::EINTR)) => {
                    file = returned;
                }
                Err((_, errno)) if errno == Errno::EWOULDBLOCK => {
                    return Err(BackupError::LockBusy { path });
                }
                Err((_, errno)) => {
                    return Err(BackupError::Lock {
                        path,
                        cause: std::io::Error::from(errno),
                    });
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_busy_until_first_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("borg.lock");

        let first = LockGuard::acquire(&path).expect("first lock should succeed");
        assert_eq!(first.path(), path.as_path());

        match LockGuard::acquire(&path) {
            Err(BackupError::LockBusy { path: busy }) => assert_eq!(busy, path),
            other => panic!("expected LockBusy, got {other:?}"),
        }

        drop(first);
        LockGuard::acquire(&path).expect("lock should be free again");
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("borg.lock");

        assert!(matches!(
            LockGuard::acquire(&path),
            Err(BackupError::Lock { .. })
        ));
    }
}
