/// Task operations as seen by handlers and the worker
///
/// [`TaskService`] wraps a [`TaskStore`] and adds:
///
/// - a time budget on every storage call ([`StoreError::Timeout`] on expiry)
/// - the reminder side step after create and update, which can log but
///   never fail the mutation
/// - derived operations: stats, retention purge, upcoming reminders
///
/// Every method takes the owner explicitly; authorization has already
/// happened by the time a handler calls in.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tasknest_shared::clock::system_clock;
/// use tasknest_shared::models::task::NewTask;
/// use tasknest_shared::service::TaskService;
/// use tasknest_shared::store::MemoryTaskStore;
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = TaskService::new(Arc::new(MemoryTaskStore::new()), system_clock());
/// let owner = Uuid::new_v4();
///
/// service.create(owner, NewTask::titled("T1")).await?;
/// assert_eq!(service.stats(owner).await?.pending, 1);
/// # Ok(())
/// # }
/// ```

use chrono::Duration;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use uuid::Uuid;

use crate::clock::SharedClock;
use crate::models::task::{NewTask, Task, TaskChanges, TaskStats};
use crate::reminder::{LogNotifier, Notifier, ReminderInfo, ReminderOutcome, ReminderPlanner};
use crate::store::query::{Page, StatusFilter, TaskFilter, TaskQuery};
use crate::store::{StoreError, TaskStore};

/// Default time budget for a single storage call
pub const DEFAULT_STORAGE_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// Default retention for soft-deleted tasks
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Task operations with timeouts and reminders
#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    planner: ReminderPlanner,
    notifier: Arc<dyn Notifier>,
    clock: SharedClock,
    timeout: StdDuration,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>, clock: SharedClock) -> Self {
        Self {
            store,
            planner: ReminderPlanner::new(clock.clone()),
            notifier: Arc::new(LogNotifier),
            clock,
            timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation = op, timeout_ms = self.timeout.as_millis() as u64, "Storage call timed out");
                Err(StoreError::Timeout)
            }
        }
    }

    async fn remind(&self, task: &Task) {
        match self.planner.plan(task) {
            ReminderOutcome::Planned(plan) => {
                if let Err(e) = self.notifier.send(&plan).await {
                    tracing::warn!(task_id = %task.id, error = %e, "Reminder delivery failed");
                }
            }
            ReminderOutcome::Skipped(reason) => {
                tracing::debug!(task_id = %task.id, ?reason, "Reminder skipped");
            }
        }
    }

    pub async fn create(&self, owner: Uuid, data: NewTask) -> Result<Task, StoreError> {
        let task = self.bounded("insert", self.store.insert(owner, data)).await?;
        tracing::info!(task_id = %task.id, user_id = %owner, "Task created");
        self.remind(&task).await;
        Ok(task)
    }

    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, StoreError> {
        self.bounded("find_active", self.store.find_active(owner, id)).await
    }

    pub async fn list(&self, owner: Uuid, query: &TaskQuery) -> Result<Vec<Task>, StoreError> {
        self.bounded("list", self.store.list(owner, query)).await
    }

    pub async fn count(&self, owner: Uuid, filter: &TaskFilter) -> Result<i64, StoreError> {
        self.bounded("count", self.store.count(owner, filter)).await
    }

    /// Completion counters over active tasks
    pub async fn stats(&self, owner: Uuid) -> Result<TaskStats, StoreError> {
        let total = self.count(owner, &TaskFilter::default()).await?;
        let completed = self
            .count(owner, &TaskFilter::status(StatusFilter::Completed))
            .await?;

        Ok(TaskStats {
            total,
            completed,
            pending: total - completed,
        })
    }

    pub async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Option<Task>, StoreError> {
        let updated = self
            .bounded("update", self.store.update(owner, id, changes))
            .await?;
        if let Some(task) = &updated {
            tracing::info!(task_id = %task.id, version = task.version, "Task updated");
            self.remind(task).await;
        }
        Ok(updated)
    }

    pub async fn toggle_completion(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, StoreError> {
        self.bounded("toggle_completion", self.store.toggle_completion(owner, id))
            .await
    }

    pub async fn soft_delete(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let deleted = self
            .bounded("soft_delete", self.store.soft_delete(owner, id))
            .await?;
        if deleted {
            tracing::info!(task_id = %id, user_id = %owner, "Task soft-deleted");
        }
        Ok(deleted)
    }

    pub async fn restore(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, StoreError> {
        self.bounded("restore", self.store.restore(owner, id)).await
    }

    pub async fn hard_delete(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let deleted = self
            .bounded("hard_delete", self.store.hard_delete(owner, id))
            .await?;
        if deleted {
            tracing::info!(task_id = %id, user_id = %owner, "Task permanently deleted");
        }
        Ok(deleted)
    }

    pub async fn list_deleted(&self, owner: Uuid, page: Page) -> Result<Vec<Task>, StoreError> {
        self.bounded("list_deleted", self.store.list_deleted(owner, page))
            .await
    }

    /// Permanently removes tasks soft-deleted more than `retention_days` ago
    pub async fn purge_expired(&self, retention_days: u32) -> Result<u64, StoreError> {
        let cutoff = self.clock.utc() - Duration::days(i64::from(retention_days));
        let purged = self
            .bounded("purge_deleted_before", self.store.purge_deleted_before(cutoff))
            .await?;
        tracing::info!(purged, retention_days, %cutoff, "Retention purge finished");
        Ok(purged)
    }

    /// Reminder-enabled tasks due within the next `within_hours`
    ///
    /// Tasks whose due date has already passed are included and flagged
    /// overdue.
    pub async fn upcoming_reminders(
        &self,
        owner: Uuid,
        within_hours: u32,
    ) -> Result<Vec<ReminderInfo>, StoreError> {
        let horizon = self.clock.utc() + Duration::hours(i64::from(within_hours));
        let tasks = self
            .bounded("due_with_reminders", self.store.due_with_reminders(owner, horizon))
            .await?;

        Ok(tasks.iter().filter_map(|t| self.planner.info(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::models::task::NotificationSettings;
    use crate::reminder::{NotifyError, ReminderPlan};
    use crate::store::MemoryTaskStore;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn service() -> (Arc<ManualClock>, TaskService) {
        let clock = Arc::new(ManualClock::epoch());
        let store = Arc::new(MemoryTaskStore::with_clock(clock.clone()));
        (clock.clone(), TaskService::new(store, clock))
    }

    struct FailingNotifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, _plan: &ReminderPlan) -> Result<(), NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(NotifyError::Delivery("smtp down".to_string()))
        }
    }

    struct StalledStore;

    #[async_trait]
    impl TaskStore for StalledStore {
        async fn insert(&self, _: Uuid, _: NewTask) -> Result<Task, StoreError> {
            std::future::pending().await
        }
        async fn find_active(&self, _: Uuid, _: Uuid) -> Result<Option<Task>, StoreError> {
            std::future::pending().await
        }
        async fn list(&self, _: Uuid, _: &TaskQuery) -> Result<Vec<Task>, StoreError> {
            std::future::pending().await
        }
        async fn count(&self, _: Uuid, _: &TaskFilter) -> Result<i64, StoreError> {
            std::future::pending().await
        }
        async fn list_deleted(&self, _: Uuid, _: Page) -> Result<Vec<Task>, StoreError> {
            std::future::pending().await
        }
        async fn update(&self, _: Uuid, _: Uuid, _: TaskChanges) -> Result<Option<Task>, StoreError> {
            std::future::pending().await
        }
        async fn toggle_completion(&self, _: Uuid, _: Uuid) -> Result<Option<Task>, StoreError> {
            std::future::pending().await
        }
        async fn soft_delete(&self, _: Uuid, _: Uuid) -> Result<bool, StoreError> {
            std::future::pending().await
        }
        async fn restore(&self, _: Uuid, _: Uuid) -> Result<Option<Task>, StoreError> {
            std::future::pending().await
        }
        async fn hard_delete(&self, _: Uuid, _: Uuid) -> Result<bool, StoreError> {
            std::future::pending().await
        }
        async fn purge_deleted_before(&self, _: DateTime<Utc>) -> Result<u64, StoreError> {
            std::future::pending().await
        }
        async fn due_with_reminders(&self, _: Uuid, _: DateTime<Utc>) -> Result<Vec<Task>, StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stats_track_completion() {
        let (_, svc) = service();
        let owner = Uuid::new_v4();
        let task = svc.create(owner, NewTask::titled("T1")).await.unwrap();

        let stats = svc.stats(owner).await.unwrap();
        assert_eq!((stats.total, stats.completed, stats.pending), (1, 0, 1));

        svc.toggle_completion(owner, task.id).await.unwrap();
        let stats = svc.stats(owner).await.unwrap();
        assert_eq!((stats.total, stats.completed, stats.pending), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_fail_create() {
        let (clock, svc) = service();
        let notifier = Arc::new(FailingNotifier {
            calls: AtomicUsize::new(0),
        });
        let svc = svc.with_notifier(notifier.clone());

        let mut new = NewTask::titled("with reminder");
        new.due_date = Some(clock.utc() + Duration::days(2));
        new.notification_settings = NotificationSettings::remind_before(1);

        assert!(svc.create(Uuid::new_v4(), new).await.is_ok());
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_reminder_settings_do_not_fail_update() {
        let (clock, svc) = service();
        let owner = Uuid::new_v4();
        let task = svc.create(owner, NewTask::titled("t")).await.unwrap();

        let updated = svc
            .update(
                owner,
                task.id,
                TaskChanges {
                    due_date: Some(Some(clock.utc())),
                    notification_settings: Some(NotificationSettings::remind_before(-5)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.is_some());
    }

    #[tokio::test]
    async fn test_purge_uses_retention_window() {
        let (clock, svc) = service();
        let owner = Uuid::new_v4();
        let old = svc.create(owner, NewTask::titled("old")).await.unwrap();
        svc.soft_delete(owner, old.id).await.unwrap();

        clock.advance(Duration::days(29));
        assert_eq!(svc.purge_expired(30).await.unwrap(), 0);

        clock.advance(Duration::days(2));
        assert_eq!(svc.purge_expired(30).await.unwrap(), 1);
        assert!(svc.list_deleted(owner, Page::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upcoming_reminders_window_and_order() {
        let (clock, svc) = service();
        let owner = Uuid::new_v4();
        let now = clock.utc();

        let make = |title: &str, due: DateTime<Utc>, enabled: bool| {
            let mut t = NewTask::titled(title);
            t.due_date = Some(due);
            t.notification_settings = NotificationSettings {
                reminder_enabled: enabled,
                reminder_lead_hours: None,
            };
            t
        };

        svc.create(owner, make("later", now + Duration::hours(10), true)).await.unwrap();
        svc.create(owner, make("overdue", now - Duration::hours(2), true)).await.unwrap();
        svc.create(owner, make("silent", now + Duration::hours(1), false)).await.unwrap();
        svc.create(owner, make("far", now + Duration::hours(48), true)).await.unwrap();

        let upcoming = svc.upcoming_reminders(owner, 24).await.unwrap();
        let titles: Vec<&str> = upcoming.iter().map(|r| r.task_title.as_str()).collect();

        assert_eq!(titles, vec!["overdue", "later"]);
        assert!(upcoming[0].is_overdue);
        assert!(!upcoming[1].is_overdue);
        assert_eq!(upcoming[1].reminder_time, 24);
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_timeout() {
        let svc = TaskService::new(Arc::new(StalledStore), Arc::new(ManualClock::epoch()))
            .with_timeout(StdDuration::from_millis(50));

        let result = svc.get(Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(matches!(result, Err(StoreError::Timeout)));
        assert!(result.unwrap_err().is_retryable());
    }
}
