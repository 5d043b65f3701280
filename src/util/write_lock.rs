use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

/// Lock acquisition gave up after the configured wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Server busy, please try again.")]
pub struct LockTimeout;

/// Process-wide mutual exclusion for writes to the tabular store.
///
/// Reads never take it. The guard releases the lock when dropped, so every
/// exit path of a write (including errors and panics) frees it.
#[derive(Debug, Clone)]
pub struct WriteLock {
    inner: Arc<Mutex<()>>,
    timeout: Duration,
}

pub type WriteGuard = OwnedMutexGuard<()>;

impl WriteLock {
    pub fn new(timeout: Duration) -> Self {
        Self { inner: Arc::new(Mutex::new(())), timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn acquire(&self) -> Result<WriteGuard, LockTimeout> {
        match tokio::time::timeout(self.timeout, self.inner.clone().lock_owned()).await {
            Ok(guard) => {
                debug!("Write lock acquired");
                Ok(guard)
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Write lock wait timed out");
                Err(LockTimeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_writer_times_out() {
        let lock = WriteLock::new(Duration::from_millis(50));
        let _held = lock.acquire().await.unwrap();
        assert_eq!(lock.acquire().await.unwrap_err(), LockTimeout);
    }

    #[tokio::test]
    async fn test_lock_released_on_drop() {
        let lock = WriteLock::new(Duration::from_millis(50));
        {
            let _guard = lock.acquire().await.unwrap();
        }
        assert!(lock.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_waiter_gets_lock_when_released_in_time() {
        let lock = WriteLock::new(Duration::from_secs(2));
        let guard = lock.acquire().await.unwrap();
        let waiter = {
            let lock = lock.clone();
            tokio::spawn(async move { lock.acquire().await.is_ok() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);
        assert!(waiter.await.unwrap());
    }
}
