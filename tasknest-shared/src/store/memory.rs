/// In-memory store backends
///
/// Both stores keep their maps behind a single async mutex. Timestamps come
/// from the injected clock so tests can age soft-deleted tasks and tokens
/// deterministically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex as TokioMutex;
use uuid::Uuid;

use super::query::{Page, TaskFilter, TaskQuery};
use super::{StoreError, TaskStore, UserStore};
use crate::clock::{system_clock, SharedClock};
use crate::models::auth_token::{AuthToken, NewAuthToken};
use crate::models::task::{NewTask, Task, TaskChanges};
use crate::models::user::{NewUser, User};

/// Task store backed by a `HashMap`
pub struct MemoryTaskStore {
    tasks: TokioMutex<HashMap<Uuid, Task>>,
    clock: SharedClock,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            tasks: TokioMutex::new(HashMap::new()),
            clock,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

fn owned_by(task: &Task, owner: Uuid) -> bool {
    task.user_id == owner
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn insert(&self, owner: Uuid, data: NewTask) -> Result<Task, StoreError> {
        let task = Task::from_new(owner, data, self.now());
        self.tasks.lock().await.insert(task.id, task.clone());
        Ok(task)
    }

    async fn find_active(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, StoreError> {
        let tasks = self.tasks.lock().await;
        Ok(tasks
            .get(&id)
            .filter(|t| owned_by(t, owner) && t.is_active())
            .cloned())
    }

    async fn list(&self, owner: Uuid, query: &TaskQuery) -> Result<Vec<Task>, StoreError> {
        let tasks = self.tasks.lock().await;
        let mut matching: Vec<Task> = tasks
            .values()
            .filter(|t| owned_by(t, owner) && t.is_active() && query.filter.matches(t))
            .cloned()
            .collect();
        drop(tasks);

        matching.sort_by(|a, b| query.sort.compare(a, b));
        Ok(query.page.apply(matching))
    }

    async fn count(&self, owner: Uuid, filter: &TaskFilter) -> Result<i64, StoreError> {
        let tasks = self.tasks.lock().await;
        let n = tasks
            .values()
            .filter(|t| owned_by(t, owner) && t.is_active() && filter.matches(t))
            .count();
        Ok(n as i64)
    }

    async fn list_deleted(&self, owner: Uuid, page: Page) -> Result<Vec<Task>, StoreError> {
        let tasks = self.tasks.lock().await;
        let mut deleted: Vec<Task> = tasks
            .values()
            .filter(|t| owned_by(t, owner) && !t.is_active())
            .cloned()
            .collect();
        drop(tasks);

        deleted.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at).then_with(|| a.id.cmp(&b.id)));
        Ok(page.apply(deleted))
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Option<Task>, StoreError> {
        let now = self.now();
        let mut tasks = self.tasks.lock().await;
        let Some(task) = tasks
            .get_mut(&id)
            .filter(|t| owned_by(t, owner) && t.is_active())
        else {
            return Ok(None);
        };

        if let Some(expected) = changes.expected_version {
            if expected != task.version {
                return Err(StoreError::VersionConflict {
                    expected,
                    actual: task.version,
                });
            }
        }

        task.apply(changes, now);
        Ok(Some(task.clone()))
    }

    async fn toggle_completion(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, StoreError> {
        let now = self.now();
        let mut tasks = self.tasks.lock().await;
        let Some(task) = tasks
            .get_mut(&id)
            .filter(|t| owned_by(t, owner) && t.is_active())
        else {
            return Ok(None);
        };

        task.is_completed = !task.is_completed;
        task.updated_at = now;
        Ok(Some(task.clone()))
    }

    async fn soft_delete(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let now = self.now();
        let mut tasks = self.tasks.lock().await;
        match tasks
            .get_mut(&id)
            .filter(|t| owned_by(t, owner) && t.is_active())
        {
            Some(task) => {
                task.deleted_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn restore(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, StoreError> {
        let mut tasks = self.tasks.lock().await;
        let Some(task) = tasks
            .get_mut(&id)
            .filter(|t| owned_by(t, owner) && !t.is_active())
        else {
            return Ok(None);
        };

        task.deleted_at = None;
        Ok(Some(task.clone()))
    }

    async fn hard_delete(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.lock().await;
        if tasks.get(&id).is_some_and(|t| owned_by(t, owner)) {
            tasks.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn purge_deleted_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tasks = self.tasks.lock().await;
        let before = tasks.len();
        tasks.retain(|_, t| !matches!(t.deleted_at, Some(at) if at < cutoff));
        Ok((before - tasks.len()) as u64)
    }

    async fn due_with_reminders(
        &self,
        owner: Uuid,
        due_before: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError> {
        let tasks = self.tasks.lock().await;
        let mut due: Vec<Task> = tasks
            .values()
            .filter(|t| {
                owned_by(t, owner)
                    && t.is_active()
                    && t.notification_settings.reminder_enabled
                    && t.due_date.is_some_and(|d| d <= due_before)
            })
            .cloned()
            .collect();
        drop(tasks);

        due.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));
        Ok(due)
    }
}

#[derive(Default)]
struct UserTables {
    users: HashMap<Uuid, User>,
    tokens: HashMap<String, AuthToken>,
}

/// User store backed by a `HashMap`
pub struct MemoryUserStore {
    tables: TokioMutex<UserTables>,
    clock: SharedClock,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            tables: TokioMutex::new(UserTables::default()),
            clock,
        }
    }

    /// Flips the active flag of a user (used to exercise the inactive-user path)
    pub async fn set_active(&self, id: Uuid, active: bool) -> bool {
        let now = self.clock.utc();
        let mut tables = self.tables.lock().await;
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.is_active = active;
                user.updated_at = now;
                true
            }
            None => false,
        }
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_user(&self, data: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email == data.email) {
            return Err(StoreError::DuplicateEmail);
        }

        let user = User::from_new(data, self.clock.utc());
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn record_token(&self, data: NewAuthToken) -> Result<AuthToken, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&data.user_id) {
            return Err(StoreError::Unavailable(format!(
                "token owner {} does not exist",
                data.user_id
            )));
        }

        let token = AuthToken::from_new(data);
        tables.tokens.insert(token.token.clone(), token.clone());
        Ok(token)
    }

    async fn find_token(&self, token: &str) -> Result<Option<AuthToken>, StoreError> {
        Ok(self.tables.lock().await.tokens.get(token).cloned())
    }

    async fn revoke_token(&self, token: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.tokens.get_mut(token) {
            Some(record) => {
                record.is_revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::store::query::{Sort, SortField, SortOrder, StatusFilter};
    use chrono::Duration;
    use std::sync::Arc;

    fn store() -> (Arc<ManualClock>, MemoryTaskStore) {
        let clock = Arc::new(ManualClock::epoch());
        let store = MemoryTaskStore::with_clock(clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn test_owner_isolation() {
        let (_, store) = store();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let task = store.insert(alice, NewTask::titled("mine")).await.unwrap();

        assert!(store.find_active(bob, task.id).await.unwrap().is_none());
        assert!(store.list(bob, &TaskQuery::default()).await.unwrap().is_empty());
        assert!(store.update(bob, task.id, TaskChanges::default()).await.unwrap().is_none());
        assert!(!store.soft_delete(bob, task.id).await.unwrap());
        assert!(!store.hard_delete(bob, task.id).await.unwrap());
        assert!(store.find_active(alice, task.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_soft_delete_restore_cycle() {
        let (_, store) = store();
        let owner = Uuid::new_v4();
        let original = store.insert(owner, NewTask::titled("cycle")).await.unwrap();

        assert!(store.soft_delete(owner, original.id).await.unwrap());
        assert!(!store.soft_delete(owner, original.id).await.unwrap());
        assert!(store.find_active(owner, original.id).await.unwrap().is_none());
        assert_eq!(store.list_deleted(owner, Page::default()).await.unwrap().len(), 1);

        let restored = store.restore(owner, original.id).await.unwrap().unwrap();
        assert_eq!(restored, original);
        assert!(store.restore(owner, original.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_everything_but_updated_at() {
        let (clock, store) = store();
        let owner = Uuid::new_v4();
        let original = store.insert(owner, NewTask::titled("flip")).await.unwrap();

        clock.advance(Duration::seconds(5));
        let once = store.toggle_completion(owner, original.id).await.unwrap().unwrap();
        assert!(once.is_completed);

        clock.advance(Duration::seconds(5));
        let mut twice = store.toggle_completion(owner, original.id).await.unwrap().unwrap();
        assert_ne!(twice.updated_at, original.updated_at);
        twice.updated_at = original.updated_at;
        assert_eq!(twice, original);
    }

    #[tokio::test]
    async fn test_version_conflict() {
        let (_, store) = store();
        let owner = Uuid::new_v4();
        let task = store.insert(owner, NewTask::titled("v")).await.unwrap();

        let first = TaskChanges {
            title: Some("first".to_string()),
            expected_version: Some(1),
            ..Default::default()
        };
        let updated = store.update(owner, task.id, first.clone()).await.unwrap().unwrap();
        assert_eq!(updated.version, 2);

        let stale = store.update(owner, task.id, first).await;
        assert!(matches!(
            stale,
            Err(StoreError::VersionConflict {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_pagination_partitions_sorted_fixture() {
        let (clock, store) = store();
        let owner = Uuid::new_v4();
        for i in 0..5 {
            store.insert(owner, NewTask::titled(format!("t{i}"))).await.unwrap();
            clock.advance(Duration::seconds(1));
        }

        let query = |skip| TaskQuery {
            sort: Sort::new(SortField::CreatedAt, SortOrder::Asc),
            page: Page::new(skip, 2).unwrap(),
            ..Default::default()
        };
        let all = store
            .list(
                owner,
                &TaskQuery {
                    sort: Sort::new(SortField::CreatedAt, SortOrder::Asc),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let first = store.list(owner, &query(0)).await.unwrap();
        let second = store.list(owner, &query(2)).await.unwrap();
        let joined: Vec<Uuid> = first.iter().chain(second.iter()).map(|t| t.id).collect();
        let expected: Vec<Uuid> = all.iter().take(4).map(|t| t.id).collect();

        assert_eq!(joined, expected);
        assert!(store.list(owner, &query(10)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_by_status() {
        let (_, store) = store();
        let owner = Uuid::new_v4();
        let done = store.insert(owner, NewTask::titled("a")).await.unwrap();
        store.insert(owner, NewTask::titled("b")).await.unwrap();
        store.insert(owner, NewTask::titled("c")).await.unwrap();
        store.toggle_completion(owner, done.id).await.unwrap();

        let completed = TaskFilter::status(StatusFilter::Completed);
        let pending = TaskFilter::status(StatusFilter::Pending);
        assert_eq!(store.count(owner, &completed).await.unwrap(), 1);
        assert_eq!(store.count(owner, &pending).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_purge_respects_cutoff_across_owners() {
        let (clock, store) = store();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let old_a = store.insert(a, NewTask::titled("old a")).await.unwrap();
        let old_b = store.insert(b, NewTask::titled("old b")).await.unwrap();
        store.soft_delete(a, old_a.id).await.unwrap();
        store.soft_delete(b, old_b.id).await.unwrap();

        clock.advance(Duration::days(10));
        let recent = store.insert(a, NewTask::titled("recent")).await.unwrap();
        store.soft_delete(a, recent.id).await.unwrap();
        let live = store.insert(a, NewTask::titled("live")).await.unwrap();

        let purged = store
            .purge_deleted_before(clock.utc() - Duration::days(5))
            .await
            .unwrap();

        assert_eq!(purged, 2);
        assert_eq!(store.list_deleted(a, Page::default()).await.unwrap().len(), 1);
        assert!(store.find_active(a, live.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let users = MemoryUserStore::new();
        let new_user = || NewUser {
            email: "dup@example.com".to_string(),
            hashed_password: "hash".to_string(),
            first_name: None,
            last_name: None,
        };

        users.create_user(new_user()).await.unwrap();
        assert!(matches!(
            users.create_user(new_user()).await,
            Err(StoreError::DuplicateEmail)
        ));
    }

    #[tokio::test]
    async fn test_token_ledger_revocation() {
        let clock = Arc::new(ManualClock::epoch());
        let users = MemoryUserStore::with_clock(clock.clone());
        let user = users
            .create_user(NewUser {
                email: "t@example.com".to_string(),
                hashed_password: "hash".to_string(),
                first_name: None,
                last_name: None,
            })
            .await
            .unwrap();

        users
            .record_token(NewAuthToken {
                token: "tok".to_string(),
                user_id: user.id,
                issued_at: clock.utc(),
                expires_at: clock.utc() + Duration::minutes(30),
            })
            .await
            .unwrap();

        assert!(users.revoke_token("tok").await.unwrap());
        assert!(!users.revoke_token("missing").await.unwrap());
        let record = users.find_token("tok").await.unwrap().unwrap();
        assert!(!record.is_valid(clock.utc()));
    }
}
