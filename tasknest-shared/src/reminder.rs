/// Reminder planning
///
/// The planner only decides *when* a reminder is due:
/// `fire_at = due_date - reminder_time hours`. Delivery is behind the
/// [`Notifier`] trait; the bundled [`LogNotifier`] writes a log line.
///
/// Planning never fails the caller. Disabled reminders, tasks without a due
/// date and unusable settings all come back as [`ReminderOutcome::Skipped`].
/// A `fire_at` already in the past is still planned and flagged
/// `already_passed`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::clock::SharedClock;
use crate::models::task::Task;

/// A computed reminder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderPlan {
    pub task_id: Uuid,
    pub owner_id: Uuid,
    pub task_title: String,
    pub due_date: DateTime<Utc>,
    pub fire_at: DateTime<Utc>,
    pub lead_hours: i64,
    pub already_passed: bool,
}

/// Why no reminder was planned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    NoDueDate,
    InvalidSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderOutcome {
    Planned(ReminderPlan),
    Skipped(SkipReason),
}

/// Entry of the upcoming-reminders listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderInfo {
    pub task_id: Uuid,
    pub task_title: String,
    pub due_date: DateTime<Utc>,
    /// Lead time in hours
    pub reminder_time: i64,
    pub fire_at: Option<DateTime<Utc>>,
    /// Due date already behind us
    pub is_overdue: bool,
}

fn fire_time(due: DateTime<Utc>, lead_hours: i64) -> Option<DateTime<Utc>> {
    if lead_hours < 0 {
        return None;
    }
    due.checked_sub_signed(Duration::try_hours(lead_hours)?)
}

/// Derives reminder times from task settings
#[derive(Clone)]
pub struct ReminderPlanner {
    clock: SharedClock,
}

impl ReminderPlanner {
    pub fn new(clock: SharedClock) -> Self {
        Self { clock }
    }

    /// Plans the reminder for `task`
    pub fn plan(&self, task: &Task) -> ReminderOutcome {
        let settings = &task.notification_settings;
        if !settings.reminder_enabled {
            return ReminderOutcome::Skipped(SkipReason::Disabled);
        }
        let Some(due_date) = task.due_date else {
            tracing::debug!(task_id = %task.id, "No due date, skipping reminder");
            return ReminderOutcome::Skipped(SkipReason::NoDueDate);
        };

        let lead_hours = settings.lead_hours();
        let Some(fire_at) = fire_time(due_date, lead_hours) else {
            tracing::warn!(
                task_id = %task.id,
                lead_hours,
                "Unusable reminder settings, skipping reminder"
            );
            return ReminderOutcome::Skipped(SkipReason::InvalidSettings);
        };

        let already_passed = fire_at <= self.clock.utc();
        if already_passed {
            tracing::info!(task_id = %task.id, %fire_at, "Reminder time already passed");
        }

        ReminderOutcome::Planned(ReminderPlan {
            task_id: task.id,
            owner_id: task.user_id,
            task_title: task.title.clone(),
            due_date,
            fire_at,
            lead_hours,
            already_passed,
        })
    }

    /// Listing entry for a task with a due date
    pub fn info(&self, task: &Task) -> Option<ReminderInfo> {
        let due_date = task.due_date?;
        let lead_hours = task.notification_settings.lead_hours();

        Some(ReminderInfo {
            task_id: task.id,
            task_title: task.title.clone(),
            due_date,
            reminder_time: lead_hours,
            fire_at: fire_time(due_date, lead_hours),
            is_overdue: due_date < self.clock.utc(),
        })
    }
}

/// Delivery failure
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Delivers planned reminders
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, plan: &ReminderPlan) -> Result<(), NotifyError>;
}

/// Logs reminders instead of delivering them
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, plan: &ReminderPlan) -> Result<(), NotifyError> {
        tracing::info!(
            task_id = %plan.task_id,
            user_id = %plan.owner_id,
            fire_at = %plan.fire_at,
            "Reminder scheduled"
        );
        Ok(())
    }
}
