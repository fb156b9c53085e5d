//! Operation surface for the portal UI.
//!
//! # Responsibility
//! - Wrap workflow commands into `{ success, message, data }` envelopes.
//! - Keep infrastructure detail out of caller-visible messages.
//!
//! # Invariants
//! - Never panics and never returns `Err`; every failure becomes
//!   `success = false`.
//! - User-facing failures keep their message; infrastructure failures
//!   are logged and replaced by a generic per-operation message.

use crate::model::employee::{Employee, EmployeeId, EmployeeProfile};
use crate::model::identity::IdentityContext;
use crate::model::notification::NotificationId;
use crate::model::project::{Project, ProjectId};
use crate::model::salary::{GenerationReport, PayPeriod, Salary, SalaryDraft, SalaryId};
use crate::model::task::{NewTask, Task, TaskAction, TaskDetailsPatch, TaskId, TaskStatus};
use crate::workflow::{Workflow, WorkflowError, WorkflowResult};
use log::{error, info};
use serde::Serialize;

/// Response envelope returned by every command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResponse<T> {
    pub success: bool,
    /// Human-readable outcome for the UI.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ActionResponse<T> {
    fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// Command facade over one [`Workflow`].
pub struct PortalApi<'conn, I: IdentityContext> {
    workflow: Workflow<'conn, I>,
}

impl<'conn, I: IdentityContext> PortalApi<'conn, I> {
    pub fn new(workflow: Workflow<'conn, I>) -> Self {
        Self { workflow }
    }

    /// Read access for list/detail queries, which return typed results.
    pub fn workflow(&self) -> &Workflow<'conn, I> {
        &self.workflow
    }

    pub fn create_task(&self, input: &NewTask) -> ActionResponse<Task> {
        respond(
            "create_task",
            self.workflow.create_task(input),
            "Task created successfully",
            "Failed to create task",
        )
    }

    pub fn update_task_details(&self, id: TaskId, patch: &TaskDetailsPatch) -> ActionResponse<Task> {
        respond(
            "update_task_details",
            self.workflow.update_task_details(id, patch),
            "Task updated successfully",
            "Failed to update task",
        )
    }

    pub fn update_task_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        note: Option<&str>,
    ) -> ActionResponse<Task> {
        respond(
            "update_task_status",
            self.workflow.update_task_status(id, status, note),
            "Task status updated successfully",
            "Failed to update task status",
        )
    }

    pub fn add_task_note(&self, id: TaskId, note: &str) -> ActionResponse<TaskAction> {
        respond(
            "add_task_note",
            self.workflow.add_task_note(id, note),
            "Note added successfully",
            "Failed to add note",
        )
    }

    pub fn delete_task(&self, id: TaskId) -> ActionResponse<()> {
        respond(
            "delete_task",
            self.workflow.delete_task(id),
            "Task deleted successfully",
            "Failed to delete task",
        )
    }

    pub fn create_salary(
        &self,
        employee_id: EmployeeId,
        month: &str,
        draft: &SalaryDraft,
    ) -> ActionResponse<Salary> {
        let result = parse_month(month)
            .and_then(|month| self.workflow.create_salary(employee_id, month, draft));
        respond(
            "create_salary",
            result,
            "Salary created successfully",
            "Failed to create salary",
        )
    }

    pub fn update_salary(&self, id: SalaryId, draft: &SalaryDraft) -> ActionResponse<Salary> {
        respond(
            "update_salary",
            self.workflow.update_salary(id, draft),
            "Salary updated successfully",
            "Failed to update salary",
        )
    }

    pub fn delete_salary(&self, id: SalaryId) -> ActionResponse<()> {
        respond(
            "delete_salary",
            self.workflow.delete_salary(id),
            "Salary deleted successfully",
            "Failed to delete salary",
        )
    }

    /// Runs the monthly payroll job for `month` (`YYYY-MM`).
    pub fn generate_monthly_salaries(&self, month: &str) -> ActionResponse<GenerationReport> {
        let result =
            parse_month(month).and_then(|month| self.workflow.generate_monthly_salaries(month));
        match result {
            Ok(report) if report.created == 0 && report.skipped == 0 => {
                ActionResponse::failure("No active employees found")
            }
            Ok(report) => {
                let message = format!(
                    "Generated {} salary records (Skipped {} existing records)",
                    report.created, report.skipped
                );
                ActionResponse::ok(message, report)
            }
            Err(err) => reject(
                "generate_monthly_salaries",
                err,
                "Failed to generate monthly salaries",
            ),
        }
    }

    pub fn create_employee(&self, profile: &EmployeeProfile) -> ActionResponse<Employee> {
        respond(
            "create_employee",
            self.workflow.create_employee(profile),
            "Employee created successfully.",
            "Failed to create employee.",
        )
    }

    pub fn update_employee(
        &self,
        id: EmployeeId,
        profile: &EmployeeProfile,
    ) -> ActionResponse<Employee> {
        respond(
            "update_employee",
            self.workflow.update_employee(id, profile),
            "Employee updated successfully.",
            "Failed to update employee.",
        )
    }

    pub fn set_employee_active(&self, id: EmployeeId, is_active: bool) -> ActionResponse<Employee> {
        respond(
            "set_employee_active",
            self.workflow.set_employee_active(id, is_active),
            if is_active {
                "Employee activated."
            } else {
                "Employee deactivated."
            },
            "Failed to update employee.",
        )
    }

    pub fn delete_employee(&self, id: EmployeeId) -> ActionResponse<()> {
        respond(
            "delete_employee",
            self.workflow.delete_employee(id),
            "Employee deleted successfully.",
            "Failed to delete employee.",
        )
    }

    pub fn create_project(&self, name: &str, description: Option<&str>) -> ActionResponse<Project> {
        respond(
            "create_project",
            self.workflow.create_project(name, description),
            "Project created successfully",
            "Failed to create project",
        )
    }

    pub fn update_project(
        &self,
        id: ProjectId,
        name: &str,
        description: Option<&str>,
    ) -> ActionResponse<Project> {
        respond(
            "update_project",
            self.workflow.update_project(id, name, description),
            "Project updated successfully",
            "Failed to update project",
        )
    }

    pub fn set_project_archived(&self, id: ProjectId, is_archived: bool) -> ActionResponse<Project> {
        respond(
            "set_project_archived",
            self.workflow.set_project_archived(id, is_archived),
            if is_archived {
                "Project archived successfully"
            } else {
                "Project unarchived successfully"
            },
            "Failed to update project archive status",
        )
    }

    pub fn delete_project(&self, id: ProjectId) -> ActionResponse<()> {
        respond(
            "delete_project",
            self.workflow.delete_project(id),
            "Project deleted successfully",
            "Failed to delete project",
        )
    }

    pub fn mark_notification_read(&self, id: NotificationId) -> ActionResponse<()> {
        respond(
            "mark_notification_read",
            self.workflow.mark_notification_read(id),
            "Notification marked as read",
            "Failed to mark notification as read",
        )
    }

    pub fn mark_all_notifications_read(&self) -> ActionResponse<u32> {
        respond(
            "mark_all_notifications_read",
            self.workflow.mark_all_notifications_read(),
            "All notifications marked as read",
            "Failed to mark all notifications as read",
        )
    }
}

fn parse_month(value: &str) -> WorkflowResult<PayPeriod> {
    Ok(value.parse::<PayPeriod>()?)
}

fn respond<T>(
    operation: &'static str,
    result: WorkflowResult<T>,
    success_message: &str,
    failure_message: &'static str,
) -> ActionResponse<T> {
    match result {
        Ok(data) => ActionResponse::ok(success_message, data),
        Err(err) => reject(operation, err, failure_message),
    }
}

fn reject<T>(
    operation: &'static str,
    err: WorkflowError,
    failure_message: &'static str,
) -> ActionResponse<T> {
    if err.is_user_facing() {
        info!("event=api_call module=api status=rejected op={operation} reason={err}");
        return ActionResponse::failure(err.to_string());
    }
    error!("event=api_call module=api status=error op={operation} error={err}");
    ActionResponse::failure(failure_message)
}
