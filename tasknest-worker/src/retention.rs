/// Retention sweeper
///
/// Permanently removes tasks that have been soft-deleted for longer than the
/// retention window, once per interval, until the shutdown token fires.
///
/// A failed run is logged and retried on the next tick; it never stops the
/// loop. The first run happens immediately on start.

use crate::config::RetentionConfig;
use tasknest_shared::{service::TaskService, store::StoreError};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub struct RetentionSweeper {
    tasks: TaskService,
    config: RetentionConfig,
    shutdown_token: CancellationToken,
}

impl RetentionSweeper {
    pub fn new(tasks: TaskService, config: RetentionConfig) -> Self {
        Self {
            tasks,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Cancelling this token ends [`run`](Self::run) after the current purge
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// A single purge pass
    pub async fn sweep_once(&self) -> Result<u64, StoreError> {
        self.tasks.purge_expired(self.config.retention_days).await
    }

    /// Runs until shutdown; returns the number of tasks purged overall
    pub async fn run(&self) -> u64 {
        tracing::info!(
            retention_days = self.config.retention_days,
            interval_secs = self.config.interval.as_secs(),
            "Retention sweeper starting"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut total = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.sweep_once().await {
                Ok(0) => tracing::debug!("Nothing to purge"),
                Ok(purged) => {
                    total += purged;
                    tracing::info!(purged, total, "Purged expired tasks");
                }
                Err(e) => {
                    tracing::error!(error = %e, retryable = e.is_retryable(), "Retention purge failed");
                }
            }
        }

        tracing::info!(total, "Retention sweeper stopped");
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tasknest_shared::clock::ManualClock;
    use tasknest_shared::models::task::{NewTask, Task, TaskChanges};
    use tasknest_shared::store::query::{Page, TaskFilter, TaskQuery};
    use tasknest_shared::store::{MemoryTaskStore, TaskStore};
    use uuid::Uuid;

    const CONFIG: RetentionConfig = RetentionConfig {
        retention_days: 30,
        interval: Duration::from_secs(60),
    };

    /// Fails the first `failures` purges, then delegates
    struct FlakyStore {
        inner: MemoryTaskStore,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl TaskStore for FlakyStore {
        async fn insert(&self, owner: Uuid, data: NewTask) -> Result<Task, StoreError> {
            self.inner.insert(owner, data).await
        }
        async fn find_active(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, StoreError> {
            self.inner.find_active(owner, id).await
        }
        async fn list(&self, owner: Uuid, query: &TaskQuery) -> Result<Vec<Task>, StoreError> {
            self.inner.list(owner, query).await
        }
        async fn count(&self, owner: Uuid, filter: &TaskFilter) -> Result<i64, StoreError> {
            self.inner.count(owner, filter).await
        }
        async fn list_deleted(&self, owner: Uuid, page: Page) -> Result<Vec<Task>, StoreError> {
            self.inner.list_deleted(owner, page).await
        }
        async fn update(
            &self,
            owner: Uuid,
            id: Uuid,
            changes: TaskChanges,
        ) -> Result<Option<Task>, StoreError> {
            self.inner.update(owner, id, changes).await
        }
        async fn toggle_completion(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, StoreError> {
            self.inner.toggle_completion(owner, id).await
        }
        async fn soft_delete(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
            self.inner.soft_delete(owner, id).await
        }
        async fn restore(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, StoreError> {
            self.inner.restore(owner, id).await
        }
        async fn hard_delete(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
            self.inner.hard_delete(owner, id).await
        }
        async fn purge_deleted_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            self.inner.purge_deleted_before(cutoff).await
        }
        async fn due_with_reminders(
            &self,
            owner: Uuid,
            due_before: DateTime<Utc>,
        ) -> Result<Vec<Task>, StoreError> {
            self.inner.due_with_reminders(owner, due_before).await
        }
    }

    fn service_over(store: Arc<dyn TaskStore>, clock: Arc<ManualClock>) -> TaskService {
        TaskService::new(store, clock)
    }

    async fn deleted_task(svc: &TaskService, owner: Uuid, title: &str) {
        let task = svc.create(owner, NewTask::titled(title)).await.unwrap();
        assert!(svc.soft_delete(owner, task.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_once_respects_retention_window() {
        let clock = Arc::new(ManualClock::epoch());
        let svc = service_over(Arc::new(MemoryTaskStore::with_clock(clock.clone())), clock.clone());
        let owner = Uuid::new_v4();

        deleted_task(&svc, owner, "old").await;
        svc.create(owner, NewTask::titled("active")).await.unwrap();

        let sweeper = RetentionSweeper::new(svc.clone(), CONFIG);

        clock.advance(ChronoDuration::days(29));
        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);

        clock.advance(ChronoDuration::days(2));
        assert_eq!(sweeper.sweep_once().await.unwrap(), 1);
        assert!(svc.list_deleted(owner, Page::default()).await.unwrap().is_empty());
        assert_eq!(svc.count(owner, &TaskFilter::default()).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_purges_each_interval_until_cancelled() {
        let clock = Arc::new(ManualClock::epoch());
        let svc = service_over(Arc::new(MemoryTaskStore::with_clock(clock.clone())), clock.clone());
        let owner = Uuid::new_v4();

        deleted_task(&svc, owner, "first").await;
        clock.advance(ChronoDuration::days(31));

        let sweeper = RetentionSweeper::new(svc.clone(), CONFIG);
        let shutdown = sweeper.shutdown_token();
        let handle = tokio::spawn(async move { sweeper.run().await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(svc.list_deleted(owner, Page::default()).await.unwrap().is_empty());

        deleted_task(&svc, owner, "second").await;
        clock.advance(ChronoDuration::days(31));
        tokio::time::sleep(Duration::from_secs(60)).await;

        shutdown.cancel();
        assert_eq!(handle.await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_storage_errors() {
        let clock = Arc::new(ManualClock::epoch());
        let store = Arc::new(FlakyStore {
            inner: MemoryTaskStore::with_clock(clock.clone()),
            failures: AtomicUsize::new(2),
        });
        let svc = service_over(store, clock.clone());
        let owner = Uuid::new_v4();

        deleted_task(&svc, owner, "stubborn").await;
        clock.advance(ChronoDuration::days(31));

        let sweeper = RetentionSweeper::new(svc.clone(), CONFIG);
        let shutdown = sweeper.shutdown_token();
        let handle = tokio::spawn(async move { sweeper.run().await });

        // Ticks at 0s and 60s fail, 120s succeeds
        tokio::time::sleep(Duration::from_secs(121)).await;
        shutdown.cancel();

        assert_eq!(handle.await.unwrap(), 1);
        assert!(svc.list_deleted(owner, Page::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_does_nothing() {
        let clock = Arc::new(ManualClock::epoch());
        let svc = service_over(Arc::new(MemoryTaskStore::with_clock(clock.clone())), clock.clone());
        let owner = Uuid::new_v4();
        deleted_task(&svc, owner, "kept").await;
        clock.advance(ChronoDuration::days(31));

        let sweeper = RetentionSweeper::new(svc.clone(), CONFIG);
        sweeper.shutdown_token().cancel();

        assert_eq!(sweeper.run().await, 0);
        assert_eq!(svc.list_deleted(owner, Page::default()).await.unwrap().len(), 1);
    }
}
