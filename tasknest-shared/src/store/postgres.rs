/// PostgreSQL store backends
///
/// Thin adapters over the model queries. The only logic here is error
/// translation: a unique-violation on the email constraint becomes
/// [`StoreError::DuplicateEmail`], everything else is
/// [`StoreError::Unavailable`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::query::{Page, TaskFilter, TaskQuery};
use super::{StoreError, TaskStore, UserStore};
use crate::models::auth_token::{AuthToken, NewAuthToken};
use crate::models::task::{NewTask, Task, TaskChanges};
use crate::models::user::{NewUser, User, EMAIL_UNIQUE_CONSTRAINT};

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.constraint() == Some(EMAIL_UNIQUE_CONSTRAINT) {
                return StoreError::DuplicateEmail;
            }
        }
        tracing::error!(error = %err, "Database operation failed");
        StoreError::Unavailable(err.to_string())
    }
}

/// Task store over a connection pool
#[derive(Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn insert(&self, owner: Uuid, data: NewTask) -> Result<Task, StoreError> {
        Ok(Task::create(&self.pool, owner, data).await?)
    }

    async fn find_active(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(Task::find_active(&self.pool, owner, id).await?)
    }

    async fn list(&self, owner: Uuid, query: &TaskQuery) -> Result<Vec<Task>, StoreError> {
        Ok(Task::list(&self.pool, owner, query).await?)
    }

    async fn count(&self, owner: Uuid, filter: &TaskFilter) -> Result<i64, StoreError> {
        Ok(Task::count(&self.pool, owner, filter).await?)
    }

    async fn list_deleted(&self, owner: Uuid, page: Page) -> Result<Vec<Task>, StoreError> {
        Ok(Task::list_deleted(&self.pool, owner, page).await?)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Option<Task>, StoreError> {
        let expected = changes.expected_version;
        let updated = Task::update(&self.pool, owner, id, changes).await?;

        match (updated, expected) {
            (Some(task), _) => Ok(Some(task)),
            (None, None) => Ok(None),
            (None, Some(expected)) => match Task::find_active(&self.pool, owner, id).await? {
                Some(current) => Err(StoreError::VersionConflict {
                    expected,
                    actual: current.version,
                }),
                None => Ok(None),
            },
        }
    }

    async fn toggle_completion(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(Task::toggle_completion(&self.pool, owner, id).await?)
    }

    async fn soft_delete(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
        Ok(Task::soft_delete(&self.pool, owner, id).await?)
    }

    async fn restore(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(Task::restore(&self.pool, owner, id).await?)
    }

    async fn hard_delete(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
        Ok(Task::hard_delete(&self.pool, owner, id).await?)
    }

    async fn purge_deleted_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(Task::purge_deleted_before(&self.pool, cutoff).await?)
    }

    async fn due_with_reminders(
        &self,
        owner: Uuid,
        due_before: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError> {
        Ok(Task::due_with_reminders(&self.pool, owner, due_before).await?)
    }
}

/// User store over a connection pool
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create_user(&self, data: NewUser) -> Result<User, StoreError> {
        Ok(User::create(&self.pool, data).await?)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn record_token(&self, data: NewAuthToken) -> Result<AuthToken, StoreError> {
        Ok(AuthToken::create(&self.pool, data).await?)
    }

    async fn find_token(&self, token: &str) -> Result<Option<AuthToken>, StoreError> {
        Ok(AuthToken::find_by_token(&self.pool, token).await?)
    }

    async fn revoke_token(&self, token: &str) -> Result<bool, StoreError> {
        Ok(AuthToken::revoke(&self.pool, token).await?)
    }
}
