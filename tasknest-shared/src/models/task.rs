/// Task model and database operations
///
/// A task belongs to exactly one user for its whole lifetime. Tasks are
/// soft-deleted by stamping `deleted_at`; every read path defaults to the
/// active subset (`deleted_at IS NULL`).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     description VARCHAR(1000),
///     is_completed BOOLEAN NOT NULL DEFAULT FALSE,
///     priority INTEGER NOT NULL DEFAULT 1 CHECK (priority BETWEEN 1 AND 5),
///     due_date TIMESTAMPTZ,
///     notification_settings JSONB NOT NULL
///         DEFAULT '{"reminder_enabled": false, "reminder_time": null}',
///     version INTEGER NOT NULL DEFAULT 1,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use tasknest_shared::models::task::{NewTask, Task};
/// use tasknest_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let owner = Uuid::new_v4();
///
/// let task = Task::create(&pool, owner, NewTask::titled("Write report")).await?;
/// Task::soft_delete(&pool, owner, task.id).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::store::query::{Page, TaskFilter, TaskQuery};

/// Lead time used when reminders are enabled without an explicit `reminder_time`
pub const DEFAULT_REMINDER_LEAD_HOURS: i64 = 24;

/// Lowest accepted priority
pub const MIN_PRIORITY: i32 = 1;

/// Highest accepted priority
pub const MAX_PRIORITY: i32 = 5;

const TASK_COLUMNS: &str = "id, user_id, title, description, is_completed, priority, due_date, \
     notification_settings, version, created_at, updated_at, deleted_at";

/// Per-task reminder preferences, stored as JSONB
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Whether a reminder should be planned for this task
    #[serde(default)]
    pub reminder_enabled: bool,

    /// Hours before the due date the reminder fires (None = 24)
    #[serde(default, rename = "reminder_time")]
    pub reminder_lead_hours: Option<i64>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            reminder_enabled: false,
            reminder_lead_hours: None,
        }
    }
}

impl NotificationSettings {
    /// Reminder enabled with the given lead time
    pub fn remind_before(hours: i64) -> Self {
        Self {
            reminder_enabled: true,
            reminder_lead_hours: Some(hours),
        }
    }

    /// Effective lead time in hours
    pub fn lead_hours(&self) -> i64 {
        self.reminder_lead_hours.unwrap_or(DEFAULT_REMINDER_LEAD_HOURS)
    }
}

/// A user's task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    /// Unique task ID
    pub id: Uuid,

    /// Owning user, never reassigned
    pub user_id: Uuid,

    /// Title (1..=255 characters)
    pub title: String,

    /// Optional description (at most 1000 characters)
    pub description: Option<String>,

    /// Completion flag
    pub is_completed: bool,

    /// Priority 1..=5
    pub priority: i32,

    /// Optional due date
    pub due_date: Option<DateTime<Utc>>,

    /// Reminder preferences
    #[sqlx(json)]
    pub notification_settings: NotificationSettings,

    /// Incremented on every field update
    pub version: i32,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Last modification time (equal to `created_at` until first change)
    pub updated_at: DateTime<Utc>,

    /// Soft-delete marker
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Input for creating a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: i32,
    pub due_date: Option<DateTime<Utc>>,
    pub notification_settings: NotificationSettings,
}

impl NewTask {
    /// Task with only a title and every other field defaulted
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: MIN_PRIORITY,
            due_date: None,
            notification_settings: NotificationSettings::default(),
        }
    }
}

/// Partial update
///
/// `None` leaves a field untouched. For nullable columns `Some(None)` clears
/// the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub is_completed: Option<bool>,
    pub priority: Option<i32>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub notification_settings: Option<NotificationSettings>,

    /// Optimistic-concurrency precondition
    pub expected_version: Option<i32>,
}

/// Completion counters over a user's active tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: i64,
    pub completed: i64,
    pub pending: i64,
}

impl Task {
    /// Builds a fresh task for `owner` as the database would
    pub fn from_new(owner: Uuid, data: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: owner,
            title: data.title,
            description: data.description,
            is_completed: false,
            priority: data.priority,
            due_date: data.due_date,
            notification_settings: data.notification_settings,
            version: 1,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// True unless soft-deleted
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Applies a partial update in place, bumping `version` and `updated_at`
    pub fn apply(&mut self, changes: TaskChanges, now: DateTime<Utc>) {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(description) = changes.description {
            self.description = description;
        }
        if let Some(is_completed) = changes.is_completed {
            self.is_completed = is_completed;
        }
        if let Some(priority) = changes.priority {
            self.priority = priority;
        }
        if let Some(due_date) = changes.due_date {
            self.due_date = due_date;
        }
        if let Some(settings) = changes.notification_settings {
            self.notification_settings = settings;
        }
        self.version += 1;
        self.updated_at = now;
    }

    /// Inserts a new task owned by `owner`
    ///
    /// # Errors
    ///
    /// Returns an error if the owner does not exist (foreign key) or the
    /// database is unreachable.
    pub async fn create(pool: &PgPool, owner: Uuid, data: NewTask) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO tasks (user_id, title, description, priority, due_date, notification_settings) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {TASK_COLUMNS}"
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(owner)
            .bind(data.title)
            .bind(data.description)
            .bind(data.priority)
            .bind(data.due_date)
            .bind(Json(data.notification_settings))
            .fetch_one(pool)
            .await
    }

    /// Finds an active task of `owner`
    pub async fn find_active(
        pool: &PgPool,
        owner: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL"
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(pool)
            .await
    }

    /// Lists active tasks of `owner` with filter, sort and pagination applied
    pub async fn list(
        pool: &PgPool,
        owner: Uuid,
        query: &TaskQuery,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {TASK_COLUMNS} FROM tasks"));
        qb.push(" WHERE user_id = ").push_bind(owner);
        qb.push(" AND deleted_at IS NULL");
        query.filter.push_conditions(&mut qb);
        qb.push(" ORDER BY ").push(query.sort.order_by_clause());
        push_page(&mut qb, query.page);

        qb.build_query_as::<Task>().fetch_all(pool).await
    }

    /// Counts active tasks of `owner` matching `filter`
    pub async fn count(pool: &PgPool, owner: Uuid, filter: &TaskFilter) -> Result<i64, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tasks");
        qb.push(" WHERE user_id = ").push_bind(owner);
        qb.push(" AND deleted_at IS NULL");
        filter.push_conditions(&mut qb);

        qb.build_query_scalar::<i64>().fetch_one(pool).await
    }

    /// Lists soft-deleted tasks of `owner`, most recently deleted first
    pub async fn list_deleted(
        pool: &PgPool,
        owner: Uuid,
        page: Page,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {TASK_COLUMNS} FROM tasks"));
        qb.push(" WHERE user_id = ").push_bind(owner);
        qb.push(" AND deleted_at IS NOT NULL");
        qb.push(" ORDER BY deleted_at DESC, id ASC");
        push_page(&mut qb, page);

        qb.build_query_as::<Task>().fetch_all(pool).await
    }

    /// Applies a partial update to an active task
    ///
    /// Returns None when the task is missing, deleted, or (when
    /// `expected_version` is set) at a different version. Callers that need
    /// to tell those apart re-read the row.
    pub async fn update(
        pool: &PgPool,
        owner: Uuid,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb =
            QueryBuilder::<Postgres>::new("UPDATE tasks SET updated_at = NOW(), version = version + 1");

        if let Some(title) = changes.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(description) = changes.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(is_completed) = changes.is_completed {
            qb.push(", is_completed = ").push_bind(is_completed);
        }
        if let Some(priority) = changes.priority {
            qb.push(", priority = ").push_bind(priority);
        }
        if let Some(due_date) = changes.due_date {
            qb.push(", due_date = ").push_bind(due_date);
        }
        if let Some(settings) = changes.notification_settings {
            qb.push(", notification_settings = ").push_bind(Json(settings));
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND user_id = ").push_bind(owner);
        qb.push(" AND deleted_at IS NULL");
        if let Some(expected) = changes.expected_version {
            qb.push(" AND version = ").push_bind(expected);
        }
        qb.push(" RETURNING ").push(TASK_COLUMNS);

        qb.build_query_as::<Task>().fetch_optional(pool).await
    }

    /// Flips the completion flag of an active task
    pub async fn toggle_completion(
        pool: &PgPool,
        owner: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE tasks SET is_completed = NOT is_completed, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL \
             RETURNING {TASK_COLUMNS}"
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(pool)
            .await
    }

    /// Stamps `deleted_at` on an active task
    ///
    /// Returns false if the task is missing or already deleted.
    pub async fn soft_delete(pool: &PgPool, owner: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE tasks SET deleted_at = NOW()
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(owner)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Clears `deleted_at` on a soft-deleted task
    pub async fn restore(pool: &PgPool, owner: Uuid, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE tasks SET deleted_at = NULL \
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NOT NULL \
             RETURNING {TASK_COLUMNS}"
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(pool)
            .await
    }

    /// Permanently removes a task whatever its soft-delete state
    pub async fn hard_delete(pool: &PgPool, owner: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Permanently removes every soft-deleted task (all owners) deleted before `cutoff`
    pub async fn purge_deleted_before(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE deleted_at IS NOT NULL AND deleted_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Active tasks of `owner` with reminders enabled and due no later than `due_before`
    pub async fn due_with_reminders(
        pool: &PgPool,
        owner: Uuid,
        due_before: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE user_id = $1 AND deleted_at IS NULL \
               AND due_date IS NOT NULL AND due_date <= $2 \
               AND (notification_settings->>'reminder_enabled')::boolean IS TRUE \
             ORDER BY due_date ASC, id ASC"
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(owner)
            .bind(due_before)
            .fetch_all(pool)
            .await
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, page: Page) {
    qb.push(" LIMIT ").push_bind(page.limit as i64);
    qb.push(" OFFSET ").push_bind(page.skip as i64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> Task {
        Task::from_new(Uuid::new_v4(), NewTask::titled("Pay rent"), Utc::now())
    }

    #[test]
    fn test_from_new_defaults() {
        let owner = Uuid::new_v4();
        let now = Utc::now();
        let task = Task::from_new(owner, NewTask::titled("Pay rent"), now);

        assert_eq!(task.user_id, owner);
        assert!(!task.is_completed);
        assert_eq!(task.priority, 1);
        assert_eq!(task.version, 1);
        assert_eq!(task.created_at, now);
        assert_eq!(task.updated_at, now);
        assert!(task.is_active());
        assert!(!task.notification_settings.reminder_enabled);
    }

    #[test]
    fn test_apply_only_touches_provided_fields() {
        let mut task = sample();
        task.description = Some("monthly".to_string());
        let before = task.clone();
        let later = before.updated_at + Duration::minutes(1);

        task.apply(
            TaskChanges {
                priority: Some(4),
                ..Default::default()
            },
            later,
        );

        assert_eq!(task.priority, 4);
        assert_eq!(task.title, before.title);
        assert_eq!(task.description, before.description);
        assert_eq!(task.version, before.version + 1);
        assert_eq!(task.updated_at, later);
    }

    #[test]
    fn test_apply_clears_nullable_fields() {
        let mut task = sample();
        task.description = Some("old".to_string());
        task.due_date = Some(Utc::now());

        task.apply(
            TaskChanges {
                description: Some(None),
                due_date: Some(None),
                ..Default::default()
            },
            Utc::now(),
        );

        assert!(task.description.is_none());
        assert!(task.due_date.is_none());
    }

    #[test]
    fn test_notification_settings_json_shape() {
        let settings: NotificationSettings =
            serde_json::from_str(r#"{"reminder_enabled": true, "reminder_time": null}"#).unwrap();
        assert!(settings.reminder_enabled);
        assert_eq!(settings.lead_hours(), DEFAULT_REMINDER_LEAD_HOURS);

        let json = serde_json::to_value(NotificationSettings::remind_before(2)).unwrap();
        assert_eq!(json["reminder_time"], 2);
        assert_eq!(json["reminder_enabled"], true);
    }

    #[test]
    fn test_notification_settings_missing_keys_default() {
        let settings: NotificationSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, NotificationSettings::default());
    }
}
