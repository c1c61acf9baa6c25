/// Filter, sort and pagination model for task listings
///
/// The same [`TaskQuery`] drives both backends: the in-memory store calls
/// [`TaskFilter::matches`] and [`Sort::compare`], the PostgreSQL store calls
/// [`TaskFilter::push_conditions`] and [`Sort::order_by_clause`]. The two
/// renderings must agree; the tests at the bottom pin the in-memory side.
///
/// # Semantics
///
/// - Filters are ANDed. `status` selects completed / pending / all;
///   `priority` ("low", "medium", "high") selects stored priority 1 / 2 / 3
///   and unknown values are ignored; due-date bounds are inclusive and
///   exclude tasks without a due date.
/// - Sort fields: `created_at`, `updated_at`, `due_date` (nulls last in both
///   directions), `priority`. Default is `created_at` descending. Ties are
///   broken by id ascending so pages never overlap.
/// - Pagination: `skip >= 0`, `1 <= limit <= 1000` (default 100).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::models::task::Task;

/// Default page size
pub const DEFAULT_LIMIT: u64 = 100;

/// Largest accepted page size
pub const MAX_LIMIT: u64 = 1000;

/// Rejected query parameter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("Invalid status '{0}': expected all, completed or pending")]
    InvalidStatus(String),

    #[error("Invalid sort field '{0}': expected created_at, updated_at, due_date or priority")]
    InvalidSortField(String),

    #[error("Invalid sort order '{0}': expected asc or desc")]
    InvalidSortOrder(String),

    #[error("Limit {0} out of range: expected 1..={MAX_LIMIT}")]
    LimitOutOfRange(u64),
}

impl QueryError {
    /// Name of the query parameter at fault
    pub fn field(&self) -> &'static str {
        match self {
            QueryError::InvalidStatus(_) => "status",
            QueryError::InvalidSortField(_) => "sort_by",
            QueryError::InvalidSortOrder(_) => "sort_order",
            QueryError::LimitOutOfRange(_) => "limit",
        }
    }
}

/// Completion filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Completed,
    Pending,
}

impl FromStr for StatusFilter {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(StatusFilter::All),
            "completed" => Ok(StatusFilter::Completed),
            "pending" => Ok(StatusFilter::Pending),
            _ => Err(QueryError::InvalidStatus(s.to_string())),
        }
    }
}

/// Named priority bands accepted by the list filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
}

impl PriorityLevel {
    /// Parses a band name; anything unrecognised means "no filter"
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(PriorityLevel::Low),
            "medium" => Some(PriorityLevel::Medium),
            "high" => Some(PriorityLevel::High),
            _ => None,
        }
    }

    /// Stored priority value
    pub fn value(self) -> i32 {
        match self {
            PriorityLevel::Low => 1,
            PriorityLevel::Medium => 2,
            PriorityLevel::High => 3,
        }
    }
}

/// Composable task filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: StatusFilter,
    pub priority: Option<PriorityLevel>,
    pub due_from: Option<DateTime<Utc>>,
    pub due_to: Option<DateTime<Utc>>,
}

impl TaskFilter {
    /// Filter selecting only one completion state
    pub fn status(status: StatusFilter) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// In-memory evaluation (owner and visibility are checked by the caller)
    pub fn matches(&self, task: &Task) -> bool {
        let status_ok = match self.status {
            StatusFilter::All => true,
            StatusFilter::Completed => task.is_completed,
            StatusFilter::Pending => !task.is_completed,
        };
        if !status_ok {
            return false;
        }

        if let Some(level) = self.priority {
            if task.priority != level.value() {
                return false;
            }
        }

        if let Some(from) = self.due_from {
            match task.due_date {
                Some(due) if due >= from => {}
                _ => return false,
            }
        }

        if let Some(to) = self.due_to {
            match task.due_date {
                Some(due) if due <= to => {}
                _ => return false,
            }
        }

        true
    }

    /// Appends ` AND ...` conditions to a query that already has a WHERE clause
    pub fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self.status {
            StatusFilter::All => {}
            StatusFilter::Completed => {
                qb.push(" AND is_completed = TRUE");
            }
            StatusFilter::Pending => {
                qb.push(" AND is_completed = FALSE");
            }
        }

        if let Some(level) = self.priority {
            qb.push(" AND priority = ").push_bind(level.value());
        }

        // NULL due dates fail both comparisons, which is the wanted exclusion
        if let Some(from) = self.due_from {
            qb.push(" AND due_date >= ").push_bind(from);
        }
        if let Some(to) = self.due_to {
            qb.push(" AND due_date <= ").push_bind(to);
        }
    }
}

/// Sortable columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    DueDate,
    Priority,
}

impl FromStr for SortField {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "created_at" => Ok(SortField::CreatedAt),
            "updated_at" => Ok(SortField::UpdatedAt),
            "due_date" => Ok(SortField::DueDate),
            "priority" => Ok(SortField::Priority),
            _ => Err(QueryError::InvalidSortField(s.to_string())),
        }
    }
}

/// Sort direction, descending unless asked otherwise
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }

    fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(QueryError::InvalidSortOrder(s.to_string())),
        }
    }
}

/// Sort field and direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub order: SortOrder,
}

impl Sort {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    /// Total order over tasks, id ascending as the final tie-breaker
    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let primary = match self.field {
            SortField::CreatedAt => self.order.apply(a.created_at.cmp(&b.created_at)),
            SortField::UpdatedAt => self.order.apply(a.updated_at.cmp(&b.updated_at)),
            SortField::Priority => self.order.apply(a.priority.cmp(&b.priority)),
            SortField::DueDate => match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => self.order.apply(x.cmp(&y)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        };

        primary.then_with(|| a.id.cmp(&b.id))
    }

    /// SQL `ORDER BY` body matching [`Sort::compare`]
    pub fn order_by_clause(&self) -> String {
        let dir = self.order.sql();
        match self.field {
            SortField::CreatedAt => format!("created_at {dir}, id ASC"),
            SortField::UpdatedAt => format!("COALESCE(updated_at, created_at) {dir}, id ASC"),
            SortField::DueDate => format!("due_date {dir} NULLS LAST, id ASC"),
            SortField::Priority => format!("COALESCE(priority, 0) {dir}, id ASC"),
        }
    }
}

/// Offset pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: u64,
    pub limit: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Page {
    /// Validated page; `skip` beyond the result set simply yields nothing
    pub fn new(skip: u64, limit: u64) -> Result<Self, QueryError> {
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(QueryError::LimitOutOfRange(limit));
        }
        Ok(Self { skip, limit })
    }

    /// Slices an already sorted sequence
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit).unwrap_or(usize::MAX);
        items.into_iter().skip(skip).take(limit).collect()
    }
}

/// Full listing request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub filter: TaskFilter,
    pub sort: Sort,
    pub page: Page,
}
