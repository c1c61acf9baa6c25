/// Task endpoints
///
/// Every route lives under `/api/:user_id/tasks` and runs behind the bearer
/// layer and the owner guard, so by the time a handler runs `:user_id` is
/// known to be the caller. Handlers scope all storage calls to
/// `auth.user_id`.
///
/// # Endpoints
///
/// - `GET    /api/:user_id/tasks` - List active tasks (filter, sort, paginate)
/// - `POST   /api/:user_id/tasks` - Create a task
/// - `GET    /api/:user_id/tasks/stats` - `{total, completed, pending}`
/// - `GET    /api/:user_id/tasks/deleted` - List soft-deleted tasks
/// - `GET    /api/:user_id/tasks/reminders` - Reminders due soon
/// - `GET    /api/:user_id/tasks/:task_id` - Fetch one active task
/// - `PUT    /api/:user_id/tasks/:task_id` - Partial update
/// - `DELETE /api/:user_id/tasks/:task_id` - Soft delete
/// - `PATCH  /api/:user_id/tasks/:task_id/complete` - Toggle completion
/// - `POST   /api/:user_id/tasks/:task_id/restore` - Undo a soft delete
/// - `DELETE /api/:user_id/tasks/:task_id/permanent` - Hard delete

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Json, Path, Query},
    routes::MessageResponse,
};
use axum::{extract::State, http::StatusCode, Extension};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use tasknest_shared::{
    auth::middleware::AuthContext,
    models::task::{NewTask, NotificationSettings, Task, TaskChanges, TaskStats, MIN_PRIORITY},
    reminder::ReminderInfo,
    store::query::{
        Page, PriorityLevel, Sort, SortField, SortOrder, StatusFilter, TaskFilter, TaskQuery,
        DEFAULT_LIMIT,
    },
};
use uuid::Uuid;
use validator::Validate;

/// Longest description accepted
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// Default look-ahead for the reminders listing
pub const DEFAULT_REMINDER_WINDOW_HOURS: u32 = 24;

/// Longest look-ahead for the reminders listing (30 days)
pub const MAX_REMINDER_WINDOW_HOURS: u32 = 720;

/// `:task_id` segment
#[derive(Debug, Deserialize)]
pub struct TaskPath {
    pub task_id: String,
}

impl TaskPath {
    /// A malformed id cannot name a task of the caller
    fn id(&self) -> ApiResult<Uuid> {
        Uuid::parse_str(&self.task_id).map_err(|_| ApiError::task_not_found())
    }
}

/// Query string of the list endpoint
#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    /// `all`, `completed` or `pending`
    pub status: Option<String>,

    /// `low`, `medium` or `high`; anything else is ignored
    pub priority: Option<String>,

    pub due_date_from: Option<DateTime<Utc>>,
    pub due_date_to: Option<DateTime<Utc>>,

    pub skip: Option<i64>,
    pub limit: Option<i64>,

    /// `created_at`, `updated_at`, `due_date` or `priority`
    pub sort_by: Option<String>,

    /// `asc` or `desc`
    pub sort_order: Option<String>,
}

impl ListTasksQuery {
    /// Parses into a store query; unknown enum values are validation errors
    pub fn into_query(self) -> ApiResult<TaskQuery> {
        let status = match self.status.as_deref() {
            Some(s) => s.parse::<StatusFilter>()?,
            None => StatusFilter::All,
        };
        let field = match self.sort_by.as_deref() {
            Some(s) => s.parse::<SortField>()?,
            None => SortField::default(),
        };
        let order = match self.sort_order.as_deref() {
            Some(s) => s.parse::<SortOrder>()?,
            None => SortOrder::default(),
        };

        Ok(TaskQuery {
            filter: TaskFilter {
                status,
                priority: self.priority.as_deref().and_then(PriorityLevel::parse),
                due_from: self.due_date_from,
                due_to: self.due_date_to,
            },
            sort: Sort::new(field, order),
            page: page(self.skip, self.limit)?,
        })
    }
}

/// Query string of the deleted-tasks endpoint
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReminderQuery {
    pub within_hours: Option<u32>,
}

fn page(skip: Option<i64>, limit: Option<i64>) -> ApiResult<Page> {
    let skip = u64::try_from(skip.unwrap_or(0))
        .map_err(|_| ApiError::invalid("skip", "skip must be zero or greater"))?;
    let limit = match limit {
        None => DEFAULT_LIMIT,
        Some(l) => u64::try_from(l)
            .map_err(|_| ApiError::invalid("limit", "limit must be between 1 and 1000"))?,
    };
    Ok(Page::new(skip, limit)?)
}

/// Create request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    #[validate(range(min = 1, max = 5, message = "Priority must be between 1 and 5"))]
    pub priority: Option<i32>,

    pub due_date: Option<DateTime<Utc>>,

    pub notification_settings: Option<NotificationSettings>,
}

impl From<CreateTaskRequest> for NewTask {
    fn from(req: CreateTaskRequest) -> Self {
        NewTask {
            title: req.title,
            description: req.description,
            priority: req.priority.unwrap_or(MIN_PRIORITY),
            due_date: req.due_date,
            notification_settings: req.notification_settings.unwrap_or_default(),
        }
    }
}

/// Distinguishes an explicit `null` from an absent field
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial update request
///
/// Absent fields are left untouched; `description` and `due_date` accept
/// `null` to clear the value.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,

    pub is_completed: Option<bool>,

    #[validate(range(min = 1, max = 5, message = "Priority must be between 1 and 5"))]
    pub priority: Option<i32>,

    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<DateTime<Utc>>>,

    pub notification_settings: Option<NotificationSettings>,

    /// Rejects the update with 409 when the stored version differs
    pub expected_version: Option<i32>,
}

impl UpdateTaskRequest {
    fn into_changes(self) -> ApiResult<TaskChanges> {
        self.validate()?;
        if let Some(Some(description)) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LENGTH {
                return Err(ApiError::invalid(
                    "description",
                    "Description must be at most 1000 characters",
                ));
            }
        }

        Ok(TaskChanges {
            title: self.title,
            description: self.description,
            is_completed: self.is_completed,
            priority: self.priority,
            due_date: self.due_date,
            notification_settings: self.notification_settings,
            expected_version: self.expected_version,
        })
    }
}

/// List active tasks
///
/// # Query
///
/// `status`, `priority`, `due_date_from`, `due_date_to` (RFC 3339, inclusive),
/// `skip` (default 0), `limit` (1..=1000, default 100), `sort_by`
/// (default `created_at`), `sort_order` (default `desc`).
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    let query = query.into_query()?;
    let tasks = state.tasks.list(auth.user_id, &query).await?;
    Ok(Json(tasks))
}

/// Create a task owned by the caller
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    req.validate()?;
    let task = state.tasks.create(auth.user_id, req.into()).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(path): Path<TaskPath>,
) -> ApiResult<Json<Task>> {
    state
        .tasks
        .get(auth.user_id, path.id()?)
        .await?
        .map(Json)
        .ok_or_else(ApiError::task_not_found)
}

/// Partial update
///
/// # Errors
///
/// - `404 Not Found`: No such active task
/// - `409 Conflict`: `expected_version` is stale
/// - `422 Unprocessable Entity`: Field out of range
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(path): Path<TaskPath>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    let id = path.id()?;
    let changes = req.into_changes()?;

    state
        .tasks
        .update(auth.user_id, id, changes)
        .await?
        .map(Json)
        .ok_or_else(ApiError::task_not_found)
}

/// Soft delete
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(path): Path<TaskPath>,
) -> ApiResult<Json<MessageResponse>> {
    if !state.tasks.soft_delete(auth.user_id, path.id()?).await? {
        return Err(ApiError::task_not_found());
    }
    Ok(Json(MessageResponse::new("Task deleted successfully")))
}

pub async fn toggle_task_completion(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(path): Path<TaskPath>,
) -> ApiResult<Json<Task>> {
    state
        .tasks
        .toggle_completion(auth.user_id, path.id()?)
        .await?
        .map(Json)
        .ok_or_else(ApiError::task_not_found)
}

/// Undo a soft delete; 404 unless the task is currently deleted
pub async fn restore_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(path): Path<TaskPath>,
) -> ApiResult<Json<Task>> {
    state
        .tasks
        .restore(auth.user_id, path.id()?)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Deleted task not found".to_string()))
}

/// Hard delete, whether or not the task is soft-deleted
pub async fn permanently_delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(path): Path<TaskPath>,
) -> ApiResult<Json<MessageResponse>> {
    if !state.tasks.hard_delete(auth.user_id, path.id()?).await? {
        return Err(ApiError::task_not_found());
    }
    Ok(Json(MessageResponse::new("Task permanently deleted")))
}

pub async fn task_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<TaskStats>> {
    Ok(Json(state.tasks.stats(auth.user_id).await?))
}

pub async fn list_deleted_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    let page = page(query.skip, query.limit)?;
    Ok(Json(state.tasks.list_deleted(auth.user_id, page).await?))
}

/// Reminder-enabled tasks due within `within_hours` (default 24)
pub async fn upcoming_reminders(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ReminderQuery>,
) -> ApiResult<Json<Vec<ReminderInfo>>> {
    let within_hours = query.within_hours.unwrap_or(DEFAULT_REMINDER_WINDOW_HOURS);
    if within_hours == 0 || within_hours > MAX_REMINDER_WINDOW_HOURS {
        return Err(ApiError::invalid(
            "within_hours",
            format!("within_hours must be between 1 and {MAX_REMINDER_WINDOW_HOURS}"),
        ));
    }

    let reminders = state
        .tasks
        .upcoming_reminders(auth.user_id, within_hours)
        .await?;
    Ok(Json(reminders))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_defaults() {
        let query = ListTasksQuery::default().into_query().unwrap();
        assert_eq!(query, TaskQuery::default());
    }

    #[test]
    fn test_list_query_parsing() {
        let query = ListTasksQuery {
            status: Some("Completed".into()),
            priority: Some("urgent".into()),
            sort_by: Some("due_date".into()),
            sort_order: Some("asc".into()),
            skip: Some(10),
            limit: Some(5),
            ..Default::default()
        }
        .into_query()
        .unwrap();

        assert_eq!(query.filter.status, StatusFilter::Completed);
        assert_eq!(query.filter.priority, None);
        assert_eq!(query.sort, Sort::new(SortField::DueDate, SortOrder::Asc));
        assert_eq!(query.page, Page { skip: 10, limit: 5 });
    }

    #[test]
    fn test_list_query_rejections() {
        let cases = [
            ListTasksQuery {
                status: Some("done".into()),
                ..Default::default()
            },
            ListTasksQuery {
                sort_by: Some("title".into()),
                ..Default::default()
            },
            ListTasksQuery {
                sort_order: Some("up".into()),
                ..Default::default()
            },
            ListTasksQuery {
                skip: Some(-1),
                ..Default::default()
            },
            ListTasksQuery {
                limit: Some(0),
                ..Default::default()
            },
            ListTasksQuery {
                limit: Some(1001),
                ..Default::default()
            },
        ];

        for case in cases {
            assert!(matches!(
                case.into_query(),
                Err(ApiError::ValidationError(_))
            ));
        }
    }

    #[test]
    fn test_update_request_null_vs_absent() {
        let absent: UpdateTaskRequest = serde_json::from_str(r#"{"title": "x"}"#).unwrap();
        assert_eq!(absent.description, None);
        assert_eq!(absent.due_date, None);

        let cleared: UpdateTaskRequest =
            serde_json::from_str(r#"{"description": null, "due_date": null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));
        assert_eq!(cleared.due_date, Some(None));
    }

    #[test]
    fn test_update_request_validation() {
        let long = UpdateTaskRequest {
            description: Some(Some("x".repeat(1001))),
            ..Default::default()
        };
        assert!(long.into_changes().is_err());

        let bad_priority = UpdateTaskRequest {
            priority: Some(6),
            ..Default::default()
        };
        assert!(bad_priority.into_changes().is_err());

        let empty_title = UpdateTaskRequest {
            title: Some(String::new()),
            ..Default::default()
        };
        assert!(empty_title.into_changes().is_err());
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateTaskRequest = serde_json::from_str(r#"{"title": "T1"}"#).unwrap();
        assert!(req.validate().is_ok());

        let new: NewTask = req.into();
        assert_eq!(new.priority, 1);
        assert_eq!(new.notification_settings, NotificationSettings::default());
    }

    #[test]
    fn test_malformed_task_id_is_not_found() {
        let path = TaskPath {
            task_id: "not-a-uuid".into(),
        };
        assert!(matches!(path.id(), Err(ApiError::NotFound(_))));
    }
}
