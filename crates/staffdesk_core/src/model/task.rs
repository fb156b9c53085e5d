//! Task and task-action domain model.
//!
//! # Responsibility
//! - Define the task lifecycle states and the audit record shape.
//!
//! # Invariants
//! - `status` is always one of `PENDING | IN_PROGRESS | DONE`.
//! - A task always references exactly one project and one assignee.
//! - `TaskAction` rows are append-only and ordered by `seq`.

use crate::model::employee::EmployeeId;
use crate::model::identity::UserId;
use crate::model::project::ProjectId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type TaskId = Uuid;
pub type TaskActionId = Uuid;

/// Task lifecycle state. Linear: `Pending -> InProgress -> Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [Self::Pending, Self::InProgress, Self::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "IN_PROGRESS" => Some(Self::InProgress),
            "DONE" => Some(Self::Done),
            _ => None,
        }
    }

    /// The single forward step, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::InProgress),
            Self::InProgress => Some(Self::Done),
            Self::Done => None,
        }
    }

    /// Position in the linear lifecycle.
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Done => 2,
        }
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub assignee_id: EmployeeId,
    /// User account of the assignee, denormalized for permission checks.
    pub assignee_user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: TaskStatus,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

/// One immutable audit entry for a task mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAction {
    pub id: TaskActionId,
    pub task_id: TaskId,
    /// Monotonic insertion order within the store.
    pub seq: i64,
    pub description: String,
    pub old_status: Option<TaskStatus>,
    pub new_status: Option<TaskStatus>,
    pub note: Option<String>,
    pub user_id: UserId,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Audit entry content before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaskAction {
    pub description: String,
    pub old_status: Option<TaskStatus>,
    pub new_status: Option<TaskStatus>,
    pub note: Option<String>,
    pub user_id: UserId,
}

impl NewTaskAction {
    pub fn described(description: impl Into<String>, user_id: UserId) -> Self {
        Self {
            description: description.into(),
            old_status: None,
            new_status: None,
            note: None,
            user_id,
        }
    }
}

/// Validated task creation input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub project_id: ProjectId,
    pub assignee_id: EmployeeId,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
}

/// Editable task fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDetailsPatch {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
}

/// Task with its full action history, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetails {
    pub task: Task,
    pub actions: Vec<TaskAction>,
}

/// Tasks bucketed by lifecycle state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct TasksByStatus {
    pub pending: Vec<Task>,
    pub in_progress: Vec<Task>,
    pub done: Vec<Task>,
}

impl TasksByStatus {
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let mut grouped = Self::default();
        for task in tasks {
            match task.status {
                TaskStatus::Pending => grouped.pending.push(task),
                TaskStatus::InProgress => grouped.in_progress.push(task),
                TaskStatus::Done => grouped.done.push(task),
            }
        }
        grouped
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct TaskStatusCounts {
    pub pending: u32,
    pub in_progress: u32,
    pub done: u32,
}

#[cfg(test)]
mod tests {
    use super::TaskStatus;

    #[test]
    fn status_wire_names_roundtrip() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("COMPLETED"), None);
    }

    #[test]
    fn next_is_single_forward_step() {
        assert_eq!(TaskStatus::Pending.next(), Some(TaskStatus::InProgress));
        assert_eq!(TaskStatus::InProgress.next(), Some(TaskStatus::Done));
        assert_eq!(TaskStatus::Done.next(), None);
    }
}
