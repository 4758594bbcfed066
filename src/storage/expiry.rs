//! Active Expiry
//!
//! Reads purge expired keys lazily, but a key nobody touches again would keep
//! its region mapped forever. [`ExpirySweeper`] is a Tokio task that wakes on
//! a fixed interval and calls [`StorageEngine::sweep_expired`], which:
//!
//! 1. gathers up to `batch_size` keys whose deadline has passed,
//! 2. deletes each one whose deadline is still in the past under its shard lock,
//! 3. goes again while a pass deleted at least `min_deleted` keys,
//!    stopping after `max_passes`.

use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Tuning for [`ExpirySweeper`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryConfig {
    /// Sleep between wake-ups (15s)
    pub interval: Duration,

    /// Keys gathered per pass (20)
    pub batch_size: usize,

    /// Minimum deletions for a pass to earn a follow-up pass (5)
    pub min_deleted: usize,

    /// Cap on passes per wake-up (64)
    pub max_passes: usize,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            batch_size: 20,
            min_deleted: 5,
            max_passes: 64,
        }
    }
}

/// Owner of the background sweep task. Dropping it stops the task.
#[derive(Debug)]
pub struct ExpirySweeper {
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ExpirySweeper {
    /// Spawns the sweep task on the current Tokio runtime.
    ///
    /// ```no_run
    /// # async fn demo() {
    /// use emberkv::storage::{ExpiryConfig, ExpirySweeper, StorageEngine};
    /// use std::sync::Arc;
    ///
    /// let storage = Arc::new(StorageEngine::new());
    /// let sweeper = ExpirySweeper::start(Arc::clone(&storage), ExpiryConfig::default());
    /// sweeper.shutdown().await;
    /// # }
    /// ```
    pub fn start(engine: Arc<StorageEngine>, config: ExpiryConfig) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run(engine, config, stop_rx));

        info!(
            interval_ms = config.interval.as_millis() as u64,
            batch_size = config.batch_size,
            max_passes = config.max_passes,
            "Expiry sweeper running"
        );

        Self {
            stop_tx,
            task: Some(task),
        }
    }

    /// Signals the task to exit at its next wake-up. Idempotent.
    pub fn stop(&self) {
        let already_stopped = self.stop_tx.send_replace(true);
        if !already_stopped {
            info!("Expiry sweeper stopping");
        }
    }

    /// Stops the task and waits for it to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(engine: Arc<StorageEngine>, config: ExpiryConfig, mut stop_rx: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            changed = stop_rx.changed() => {
                // a closed channel means the handle is gone
                if changed.is_err() || *stop_rx.borrow() {
                    debug!("Expiry sweeper exiting");
                    return;
                }
            }
        }

        let removed = engine.sweep_expired(&config);
        if removed > 0 {
            debug!(removed, remaining = engine.len(), "Swept expired keys");
        }
    }
}

/// [`ExpirySweeper::start`] with [`ExpiryConfig::default`].
pub fn start_expiry_sweeper(engine: Arc<StorageEngine>) -> ExpirySweeper {
    ExpirySweeper::start(engine, ExpiryConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::time::sleep;

    fn every_10ms() -> ExpiryConfig {
        ExpiryConfig {
            interval: Duration::from_millis(10),
            ..ExpiryConfig::default()
        }
    }

    fn fill(storage: &StorageEngine, count: usize, ttl_ms: u64) {
        for i in 0..count {
            let key = format!("session:{i}");
            storage.set(Bytes::from(key.clone()), b"value");
            storage.expire(key.as_bytes(), ttl_ms).unwrap();
        }
    }

    #[tokio::test]
    async fn test_untouched_keys_are_reclaimed() {
        let storage = Arc::new(StorageEngine::new());
        fill(&storage, 10, 50);
        storage.set(Bytes::from("keep"), b"value");

        let _sweeper = ExpirySweeper::start(Arc::clone(&storage), every_10ms());
        sleep(Duration::from_millis(200)).await;

        assert_eq!(storage.len(), 1);
        assert!(storage.exists(b"keep"));
        // only "keep"'s region is still mapped: tag byte + 5 bytes
        assert_eq!(storage.off_heap_used(), 6);
    }

    #[tokio::test]
    async fn test_backlog_drains_across_passes() {
        let storage = Arc::new(StorageEngine::new());
        fill(&storage, 1000, 20);

        let _sweeper = ExpirySweeper::start(Arc::clone(&storage), every_10ms());
        sleep(Duration::from_millis(300)).await;

        assert!(storage.is_empty());
        assert_eq!(storage.stats().expired, 1000);
    }

    #[tokio::test]
    async fn test_shutdown_ends_task() {
        let storage = Arc::new(StorageEngine::new());
        let sweeper = ExpirySweeper::start(Arc::clone(&storage), every_10ms());
        sweeper.shutdown().await;

        fill(&storage, 1, 10);
        sleep(Duration::from_millis(100)).await;

        // still mapped until a read purges it
        assert_eq!(storage.len(), 1);
        assert!(storage.get(b"session:0").is_err());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_drop_stops_task() {
        let storage = Arc::new(StorageEngine::new());
        drop(ExpirySweeper::start(Arc::clone(&storage), every_10ms()));
        sleep(Duration::from_millis(30)).await;

        fill(&storage, 3, 10);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(storage.len(), 3);
    }
}
