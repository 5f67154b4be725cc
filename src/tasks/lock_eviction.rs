//! Lock eviction task - drops idle per-dashboard locks

use crate::storage::KeyLocks;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Background task that periodically removes dashboard locks nobody holds.
///
/// Keeps the lock registry proportional to the dashboards being written
/// right now instead of every dashboard ever seen.
pub async fn lock_eviction_task(locks: Arc<KeyLocks>, every: Duration) {
    let mut interval = tokio::time::interval(every);

    info!(interval_secs = every.as_secs(), "Lock eviction task started");

    loop {
        interval.tick().await;

        let evicted = locks.evict_idle();
        if evicted > 0 {
            debug!(evicted = evicted, remaining = locks.len(), "Evicted idle dashboard locks");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_evicts_idle_locks() {
        let locks = Arc::new(KeyLocks::default());
        drop(locks.write("d1").await);
        assert_eq!(locks.len(), 1);

        let task = tokio::spawn(lock_eviction_task(Arc::clone(&locks), Duration::from_secs(60)));
        // the first tick fires immediately
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(locks.is_empty());

        task.abort();
    }
}
