//! Cross-process mutual exclusion for store access

use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::errors::{PoolError, PoolResult};

const MAX_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Mutual exclusion guarding read-modify-write access to the pool document.
///
/// Implementations are swappable (lock file, advisory OS lock, external
/// coordination service); the pool logic only relies on acquire/release.
/// Fairness across waiters is whatever the implementation provides.
#[async_trait]
pub trait DistributedMutex: Send + Sync {
    /// Acquire the lock, polling with backoff until `timeout` elapses.
    async fn acquire(&self, timeout: Duration) -> PoolResult<()>;

    /// Release the lock. Releasing an already-released lock is not an error.
    async fn release(&self) -> PoolResult<()>;
}

/// Lock-file implementation: exclusive creation of a marker file.
///
/// The file holds the owning pid for diagnostics. Contending processes poll
/// with a doubling interval until the acquisition budget runs out.
#[derive(Debug)]
pub struct FileMutex {
    path: PathBuf,
    poll_interval: Duration,
}

impl FileMutex {
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
        }
    }
}

#[async_trait]
impl DistributedMutex for FileMutex {
    async fn acquire(&self, timeout: Duration) -> PoolResult<()> {
        let deadline = Instant::now() + timeout;
        let mut interval = self.poll_interval;

        loop {
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.path)
            {
                Ok(mut file) => {
                    let _ = write!(file, "{}", std::process::id());
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    if Instant::now() + interval >= deadline {
                        debug!(path = %self.path.display(), "lock acquisition timed out");
                        return Err(PoolError::LockTimeout(timeout));
                    }
                    tokio::time::sleep(interval).await;
                    interval = (interval * 2).min(MAX_POLL_INTERVAL);
                }
                Err(err) => return Err(PoolError::Persistence(err.to_string())),
            }
        }
    }

    async fn release(&self) -> PoolResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(PoolError::Persistence(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mutex(dir: &tempfile::TempDir) -> FileMutex {
        FileMutex::new(dir.path().join("pool.lock"), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = mutex(&dir);

        lock.acquire(Duration::from_millis(100)).await.unwrap();
        assert!(dir.path().join("pool.lock").exists());

        lock.release().await.unwrap();
        assert!(!dir.path().join("pool.lock").exists());
    }

    #[tokio::test]
    async fn contention_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let holder = mutex(&dir);
        let waiter = mutex(&dir);

        holder.acquire(Duration::from_millis(100)).await.unwrap();

        let err = waiter.acquire(Duration::from_millis(40)).await.unwrap_err();
        assert!(matches!(err, PoolError::LockTimeout(_)));

        holder.release().await.unwrap();
        waiter.acquire(Duration::from_millis(100)).await.unwrap();
    }

    #[tokio::test]
    async fn double_release_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let lock = mutex(&dir);

        lock.acquire(Duration::from_millis(100)).await.unwrap();
        lock.release().await.unwrap();
        lock.release().await.unwrap();
    }
}
