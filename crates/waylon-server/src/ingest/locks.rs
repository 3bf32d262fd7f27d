//! Per-work mutual exclusion
//!
//! Messages for different works may be processed concurrently; two messages
//! for the same work id must not store and reconcile at the same time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct WorkLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl WorkLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `work_id`; released when the guard drops
    pub async fn lock(&self, work_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries nobody holds or waits on can go.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks.entry(work_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub fn tracked(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_work_is_serialised() {
        let locks = WorkLocks::new();
        let guard = locks.lock("b1").await;

        let contender = locks.clone();
        let waiting = tokio::spawn(async move {
            let _g = contender.lock("b1").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        waiting.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_works_do_not_block() {
        let locks = WorkLocks::new();
        let _a = locks.lock("a").await;
        let _b = tokio::time::timeout(Duration::from_millis(100), locks.lock("b"))
            .await
            .unwrap();
        assert_eq!(locks.tracked(), 2);
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = WorkLocks::new();
        drop(locks.lock("a").await);
        drop(locks.lock("b").await);
        let _c = locks.lock("c").await;
        assert_eq!(locks.tracked(), 1);
    }
}
