/// Storage seams for users, tokens and tasks
///
/// Handlers and services depend on the [`TaskStore`] and [`UserStore`]
/// traits only. Two backends ship with the crate:
///
/// - [`postgres`]: sqlx over a `PgPool`, delegating to the model queries
/// - [`memory`]: mutex-guarded maps, used by tests and standalone runs
///
/// Every task operation takes the owner id explicitly; no backend ever
/// returns or mutates a row belonging to a different owner.

pub mod memory;
pub mod postgres;
pub mod query;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::auth_token::{AuthToken, NewAuthToken};
use crate::models::task::{NewTask, Task, TaskChanges};
use crate::models::user::{NewUser, User};
use query::{Page, TaskFilter, TaskQuery};

pub use memory::{MemoryTaskStore, MemoryUserStore};
pub use postgres::{PgTaskStore, PgUserStore};

/// Storage failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend unreachable or query failed
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Storage call exceeded its time budget
    #[error("Storage operation timed out")]
    Timeout,

    /// Email uniqueness constraint hit
    #[error("Email already registered")]
    DuplicateEmail,

    /// Update precondition failed
    #[error("Version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: i32, actual: i32 },
}

impl StoreError {
    /// Whether a caller may retry the same operation later
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout)
    }
}

/// Owner-scoped task persistence
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persists a new active task for `owner`
    async fn insert(&self, owner: Uuid, data: NewTask) -> Result<Task, StoreError>;

    /// Active task of `owner`, if any
    async fn find_active(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, StoreError>;

    /// Active tasks of `owner` filtered, sorted and paged
    async fn list(&self, owner: Uuid, query: &TaskQuery) -> Result<Vec<Task>, StoreError>;

    /// Number of active tasks of `owner` matching `filter`
    async fn count(&self, owner: Uuid, filter: &TaskFilter) -> Result<i64, StoreError>;

    /// Soft-deleted tasks of `owner`, most recently deleted first
    async fn list_deleted(&self, owner: Uuid, page: Page) -> Result<Vec<Task>, StoreError>;

    /// Partial update of an active task
    ///
    /// `Ok(None)` means missing or deleted. A stale `expected_version` on an
    /// existing task yields [`StoreError::VersionConflict`].
    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Option<Task>, StoreError>;

    /// Flips the completion flag of an active task
    async fn toggle_completion(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, StoreError>;

    /// Marks an active task deleted; false if missing or already deleted
    async fn soft_delete(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError>;

    /// Clears the delete marker of a soft-deleted task
    async fn restore(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, StoreError>;

    /// Removes a task permanently regardless of its delete marker
    async fn hard_delete(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError>;

    /// Removes every task (any owner) soft-deleted strictly before `cutoff`
    async fn purge_deleted_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Active tasks of `owner` with reminders enabled, due at or before
    /// `due_before`, ordered by due date ascending
    async fn due_with_reminders(
        &self,
        owner: Uuid,
        due_before: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError>;
}

/// User and token-ledger persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user; the backend's uniqueness check is authoritative
    async fn create_user(&self, data: NewUser) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Lookup by already-normalised email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Records a locally issued token
    async fn record_token(&self, data: NewAuthToken) -> Result<AuthToken, StoreError>;

    async fn find_token(&self, token: &str) -> Result<Option<AuthToken>, StoreError>;

    /// Revokes a recorded token; false if it was never recorded
    async fn revoke_token(&self, token: &str) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(StoreError::Unavailable("down".into()).is_retryable());
        assert!(StoreError::Timeout.is_retryable());
        assert!(!StoreError::DuplicateEmail.is_retryable());
        assert!(!StoreError::VersionConflict {
            expected: 1,
            actual: 2
        }
        .is_retryable());
    }
}
