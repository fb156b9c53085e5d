//! Task and salary workflows.
//!
//! # Responsibility
//! - Task State Machine: role-aware status transitions with audit actions.
//! - Notification Dispatcher: best-effort fan-out after primary writes.
//! - Orchestrator: authorizes, validates and composes the above per
//!   operation.
//!
//! # Invariants
//! - A primary write and its audit action commit together.
//! - Notifications are created after the primary write commits, except
//!   for task deletion where the assignee is notified first.
//! - One attempt per call; nothing is retried except stale status
//!   re-validation.

pub mod dispatcher;
pub mod error;
pub mod orchestrator;
pub mod policy;
pub mod state_machine;

pub use dispatcher::{DispatchReport, NotificationDispatcher, NotificationLinks, WorkflowEvent};
pub use error::{WorkflowError, WorkflowResult};
pub use orchestrator::Workflow;
pub use policy::{AdminPolicy, AssigneePolicy, TransitionPolicy};
pub use state_machine::{StatusChange, TaskStateMachine};

const DEFAULT_MAX_EMPLOYEE_CODE_ATTEMPTS: u32 = 64;
const DEFAULT_MAX_STATUS_ROUNDS: u32 = 3;
const DEFAULT_INBOX_LIMIT: u32 = 10;
const MAX_INBOX_LIMIT: u32 = 100;

/// Workflow tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSettings {
    /// Random samples tried before employee creation gives up.
    pub max_employee_code_attempts: u32,
    /// Re-validation rounds for a status write that lost a race.
    pub max_status_rounds: u32,
    /// Notification page size when the caller gives none.
    pub default_inbox_limit: u32,
    pub links: NotificationLinks,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_employee_code_attempts: DEFAULT_MAX_EMPLOYEE_CODE_ATTEMPTS,
            max_status_rounds: DEFAULT_MAX_STATUS_ROUNDS,
            default_inbox_limit: DEFAULT_INBOX_LIMIT,
            links: NotificationLinks::default(),
        }
    }
}

impl WorkflowSettings {
    pub(crate) fn inbox_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_inbox_limit)
            .clamp(1, MAX_INBOX_LIMIT)
    }
}
