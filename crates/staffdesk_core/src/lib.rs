//! Core domain logic for StaffDesk.
//! This crate is the single source of truth for task, payroll and
//! notification invariants.

pub mod api;
pub mod db;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod repo;
pub mod workflow;

pub use api::{ActionResponse, PortalApi};
pub use db::{open_db, open_db_in_memory, DbError};
pub use ledger::{compute_payable, validate_changes, ImmutableRecord, InvalidAdjustment};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::employee::{Employee, EmployeeId, EmployeeProfile};
pub use model::identity::{Actor, IdentityContext, Role, StaticIdentity, User, UserId};
pub use model::notification::{Notification, NotificationInbox, NotificationType};
pub use model::project::{Project, ProjectId, ProjectSummary};
pub use model::salary::{
    GenerationReport, PayPeriod, Salary, SalaryChange, SalaryChangeType, SalaryDraft, SalaryId,
    SalaryTotals,
};
pub use model::task::{
    NewTask, Task, TaskAction, TaskDetails, TaskDetailsPatch, TaskId, TaskStatus, TasksByStatus,
};
pub use model::validation::ValidationError;
pub use repo::{RepoError, RepoResult};
pub use workflow::{Workflow, WorkflowError, WorkflowResult, WorkflowSettings};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
