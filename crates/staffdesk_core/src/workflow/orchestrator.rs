//! Workflow orchestrator.
//!
//! # Responsibility
//! - Resolve the caller and enforce role/ownership before any write.
//! - Validate input shape, then compose ledger, state machine, repository
//!   and dispatcher calls into one operation each.
//!
//! # Invariants
//! - `Unauthorized` is returned before anything else when no caller is
//!   signed in.
//! - Notification failures never fail the operation.

use crate::ledger::{compute_payable, ensure_mutable, validate_changes};
use crate::model::employee::{Employee, EmployeeId, EmployeeProfile};
use crate::model::identity::{Actor, IdentityContext, Role, User, UserId};
use crate::model::notification::{NotificationId, NotificationInbox};
use crate::model::project::{Project, ProjectId, ProjectSummary};
use crate::model::salary::{GenerationReport, PayPeriod, Salary, SalaryDraft, SalaryId, SalaryTotals};
use crate::model::task::{
    NewTask, NewTaskAction, Task, TaskAction, TaskDetails, TaskDetailsPatch, TaskId, TaskStatus,
    TaskStatusCounts, TasksByStatus,
};
use crate::model::validation::{
    self, bounded_text, non_blank, optional_text, positive_amount, ValidationError,
    EMPLOYEE_NAME_MAX, EMPLOYEE_NAME_MIN, PROJECT_DESCRIPTION_MAX, PROJECT_NAME_MAX,
    PROJECT_NAME_MIN, TASK_DESCRIPTION_MAX, TASK_NOTE_MAX, TASK_TITLE_MAX, TASK_TITLE_MIN,
};
use crate::repo::employee_repo::{EmployeeRepository, SqliteEmployeeRepository};
use crate::repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
use crate::repo::project_repo::{ProjectRepository, SqliteProjectRepository};
use crate::repo::salary_repo::{SalaryQuery, SalaryRepository, SalaryWrite, SqliteSalaryRepository};
use crate::repo::task_repo::{SqliteTaskRepository, TaskRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::RepoError;
use crate::workflow::dispatcher::{NotificationDispatcher, WorkflowEvent};
use crate::workflow::error::{WorkflowError, WorkflowResult};
use crate::workflow::state_machine::TaskStateMachine;
use crate::workflow::WorkflowSettings;
use log::{info, warn};
use rand::RngCore;
use rusqlite::Connection;

const TASK_CREATED: &str = "Task created";
const TASK_DETAILS_UPDATED: &str = "Task details updated";
const NOTE_ADDED: &str = "Note added";

type SqliteDispatcher<'conn> =
    NotificationDispatcher<SqliteNotificationRepository<'conn>, SqliteUserRepository<'conn>>;

/// Entry point for every portal operation, bound to one caller identity.
pub struct Workflow<'conn, I: IdentityContext> {
    identity: I,
    settings: WorkflowSettings,
    users: SqliteUserRepository<'conn>,
    employees: SqliteEmployeeRepository<'conn>,
    projects: SqliteProjectRepository<'conn>,
    tasks: SqliteTaskRepository<'conn>,
    salaries: SqliteSalaryRepository<'conn>,
    dispatcher: SqliteDispatcher<'conn>,
}

impl<'conn, I: IdentityContext> Workflow<'conn, I> {
    /// Binds repositories to a migrated connection.
    ///
    /// # Errors
    /// - `Repo(UninitializedConnection)` when the schema is not current.
    pub fn try_new(
        conn: &'conn Connection,
        identity: I,
        settings: WorkflowSettings,
    ) -> WorkflowResult<Self> {
        let dispatcher = NotificationDispatcher::new(
            SqliteNotificationRepository::try_new(conn)?,
            SqliteUserRepository::try_new(conn)?,
            settings.links.clone(),
        );
        Ok(Self {
            identity,
            settings,
            users: SqliteUserRepository::try_new(conn)?,
            employees: SqliteEmployeeRepository::try_new(conn)?,
            projects: SqliteProjectRepository::try_new(conn)?,
            tasks: SqliteTaskRepository::try_new(conn)?,
            salaries: SqliteSalaryRepository::try_new(conn)?,
            dispatcher,
        })
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Creates an admin account. Needs no caller; used to seed a store.
    pub fn register_admin(&self, name: &str, email: &str) -> WorkflowResult<User> {
        let name = bounded_text("name", name, EMPLOYEE_NAME_MIN, EMPLOYEE_NAME_MAX)?;
        let email = validation::email(email)?;
        let user = self.users.create_user(&name, &email, Role::Admin)?;
        info!(
            "event=admin_register module=workflow status=ok user_id={}",
            user.id
        );
        Ok(user)
    }

    pub fn create_employee(&self, profile: &EmployeeProfile) -> WorkflowResult<Employee> {
        self.create_employee_with_rng(profile, &mut rand::thread_rng())
    }

    /// Same as [`Self::create_employee`] with a caller-supplied code source.
    pub fn create_employee_with_rng(
        &self,
        profile: &EmployeeProfile,
        rng: &mut dyn RngCore,
    ) -> WorkflowResult<Employee> {
        self.require_admin()?;
        let profile = validate_profile(profile)?;
        let employee = self.employees.create_employee(
            &profile,
            rng,
            self.settings.max_employee_code_attempts,
        )?;
        info!(
            "event=employee_create module=workflow status=ok employee_id={} code={}",
            employee.id, employee.code
        );
        Ok(employee)
    }

    pub fn update_employee(
        &self,
        id: EmployeeId,
        profile: &EmployeeProfile,
    ) -> WorkflowResult<Employee> {
        self.require_admin()?;
        let profile = validate_profile(profile)?;
        Ok(self.employees.update_employee(id, &profile)?)
    }

    /// Soft-disables or re-enables an employee.
    pub fn set_employee_active(&self, id: EmployeeId, is_active: bool) -> WorkflowResult<Employee> {
        self.require_admin()?;
        let employee = self.employees.set_active(id, is_active)?;
        info!(
            "event=employee_set_active module=workflow status=ok employee_id={} active={}",
            id, is_active
        );
        Ok(employee)
    }

    /// Hard-deletes an employee without task, action or salary history.
    pub fn delete_employee(&self, id: EmployeeId) -> WorkflowResult<()> {
        self.require_admin()?;
        self.employees.delete_employee(id)?;
        info!("event=employee_delete module=workflow status=ok employee_id={id}");
        Ok(())
    }

    pub fn list_employees(&self, active_only: bool) -> WorkflowResult<Vec<Employee>> {
        self.require_admin()?;
        Ok(self.employees.list_employees(active_only)?)
    }

    /// Employee record of `user_id`; admins may look up anyone.
    pub fn get_employee_for_user(&self, user_id: UserId) -> WorkflowResult<Option<Employee>> {
        let actor = self.require_actor()?;
        if !actor.is_admin() && actor.user_id != user_id {
            return Err(WorkflowError::PermissionDenied(
                "You don't have permission to view this employee",
            ));
        }
        Ok(self.employees.get_employee_for_user(user_id)?)
    }

    pub fn create_project(&self, name: &str, description: Option<&str>) -> WorkflowResult<Project> {
        self.require_admin()?;
        let (name, description) = validate_project(name, description)?;
        let project = self
            .projects
            .create_project(&name, description.as_deref())?;
        info!(
            "event=project_create module=workflow status=ok project_id={}",
            project.id
        );
        Ok(project)
    }

    pub fn update_project(
        &self,
        id: ProjectId,
        name: &str,
        description: Option<&str>,
    ) -> WorkflowResult<Project> {
        self.require_admin()?;
        let (name, description) = validate_project(name, description)?;
        Ok(self
            .projects
            .update_project(id, &name, description.as_deref())?)
    }

    pub fn set_project_archived(&self, id: ProjectId, is_archived: bool) -> WorkflowResult<Project> {
        self.require_admin()?;
        Ok(self.projects.set_archived(id, is_archived)?)
    }

    /// Deletes a project that owns no tasks.
    ///
    /// # Errors
    /// - `ProjectHasTasks` while any task references the project.
    pub fn delete_project(&self, id: ProjectId) -> WorkflowResult<()> {
        self.require_admin()?;
        self.projects.delete_project(id)?;
        info!("event=project_delete module=workflow status=ok project_id={id}");
        Ok(())
    }

    pub fn list_projects(&self, include_archived: bool) -> WorkflowResult<Vec<ProjectSummary>> {
        self.require_admin()?;
        Ok(self.projects.list_projects(include_archived)?)
    }

    /// Creates a `PENDING` task with its creation action and notifies the
    /// assignee.
    ///
    /// # Errors
    /// - `Validation(ArchivedProject)` for an archived project.
    /// - `Validation(InactiveAssignee)` for a deactivated employee.
    pub fn create_task(&self, input: &NewTask) -> WorkflowResult<Task> {
        let actor = self.require_admin()?;
        let (title, description) = validate_task_details(&input.title, input.description.as_deref())?;

        let project = self
            .projects
            .get_project(input.project_id)?
            .ok_or_else(|| WorkflowError::not_found("project", input.project_id))?;
        if project.is_archived {
            return Err(ValidationError::ArchivedProject.into());
        }
        let assignee = self
            .employees
            .get_employee(input.assignee_id)?
            .ok_or_else(|| WorkflowError::not_found("employee", input.assignee_id))?;
        if !assignee.is_active {
            return Err(ValidationError::InactiveAssignee.into());
        }

        let task = NewTask {
            project_id: project.id,
            assignee_id: assignee.id,
            title,
            description,
            due_date: input.due_date,
        };
        let action = NewTaskAction {
            new_status: Some(TaskStatus::Pending),
            ..NewTaskAction::described(TASK_CREATED, actor.user_id)
        };
        let created = self
            .tasks
            .create_task(&task, TaskStatus::Pending, &action)?;
        info!(
            "event=task_create module=workflow status=ok task_id={} project_id={}",
            created.id, created.project_id
        );

        self.dispatcher
            .dispatch(WorkflowEvent::TaskAssigned { task: &created });
        Ok(created)
    }

    /// Replaces title, description and due date.
    pub fn update_task_details(
        &self,
        id: TaskId,
        patch: &TaskDetailsPatch,
    ) -> WorkflowResult<Task> {
        let actor = self.require_admin()?;
        let (title, description) = validate_task_details(&patch.title, patch.description.as_deref())?;
        let patch = TaskDetailsPatch {
            title,
            description,
            due_date: patch.due_date,
        };
        let action = NewTaskAction::described(TASK_DETAILS_UPDATED, actor.user_id);
        let updated = self.tasks.update_details(id, &patch, &action)?;
        info!("event=task_update module=workflow status=ok task_id={id}");

        self.dispatcher.dispatch(WorkflowEvent::TaskDetailsUpdated {
            task: &updated,
            actor: &actor,
        });
        Ok(updated)
    }

    /// Moves a task to `status` under the caller's transition policy.
    ///
    /// # Errors
    /// - `PermissionDenied` unless the caller is admin or the assignee.
    /// - `InvalidTransition` when the policy rejects the move from the
    ///   persisted status.
    pub fn update_task_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        note: Option<&str>,
    ) -> WorkflowResult<Task> {
        let actor = self.require_actor()?;
        let note = optional_text("note", note, TASK_NOTE_MAX)?;
        let change = TaskStateMachine::new(&self.tasks, self.settings.max_status_rounds)
            .request_transition(id, &actor, status, note)?;

        self.dispatcher.dispatch(WorkflowEvent::TaskStatusChanged {
            task: &change.task,
            from: change.from,
            to: change.to,
            actor: &actor,
        });
        Ok(change.task)
    }

    pub fn add_task_note(&self, id: TaskId, note: &str) -> WorkflowResult<TaskAction> {
        let actor = self.require_actor()?;
        let task = self.load_task(id)?;
        if !may_access(&actor, &task) {
            return Err(WorkflowError::PermissionDenied(
                "You don't have permission to add notes to this task",
            ));
        }
        let note = non_blank("note", note)?;
        if note.chars().count() > TASK_NOTE_MAX {
            return Err(ValidationError::TooLong {
                field: "note",
                max: TASK_NOTE_MAX,
            }
            .into());
        }

        let action = NewTaskAction {
            note: Some(note),
            ..NewTaskAction::described(NOTE_ADDED, actor.user_id)
        };
        let recorded = self.tasks.append_action(id, &action)?;
        info!("event=task_note module=workflow status=ok task_id={id}");

        self.dispatcher.dispatch(WorkflowEvent::TaskNoteAdded {
            task: &task,
            actor: &actor,
        });
        Ok(recorded)
    }

    /// Notifies the assignee, then removes the task and its actions.
    pub fn delete_task(&self, id: TaskId) -> WorkflowResult<()> {
        let actor = self.require_admin()?;
        let task = self.load_task(id)?;

        self.dispatcher.dispatch(WorkflowEvent::TaskDeleted {
            task: &task,
            actor: &actor,
        });
        self.tasks.delete_task(id)?;
        info!("event=task_delete module=workflow status=ok task_id={id}");
        Ok(())
    }

    pub fn get_task_details(&self, id: TaskId) -> WorkflowResult<TaskDetails> {
        let actor = self.require_actor()?;
        let task = self.load_task(id)?;
        if !may_access(&actor, &task) {
            return Err(WorkflowError::PermissionDenied(
                "You don't have permission to view this task",
            ));
        }
        let actions = self.tasks.list_actions(id)?;
        Ok(TaskDetails { task, actions })
    }

    /// Tasks assigned to the caller; empty for callers without an
    /// employee record.
    pub fn list_my_tasks(&self) -> WorkflowResult<Vec<Task>> {
        let actor = self.require_actor()?;
        match self.employees.get_employee_for_user(actor.user_id)? {
            Some(employee) => Ok(self.tasks.list_for_assignee(employee.id)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn list_project_tasks(&self, project_id: ProjectId) -> WorkflowResult<TasksByStatus> {
        self.require_admin()?;
        if self.projects.get_project(project_id)?.is_none() {
            return Err(WorkflowError::not_found("project", project_id));
        }
        let tasks = self.tasks.list_for_project(project_id)?;
        Ok(TasksByStatus::from_tasks(tasks))
    }

    pub fn task_status_counts(&self) -> WorkflowResult<TaskStatusCounts> {
        self.require_admin()?;
        Ok(self.tasks.status_counts()?)
    }

    /// Creates one salary for `(employee_id, month)`.
    ///
    /// # Errors
    /// - `InvalidAdjustment` when a change's sign disagrees with its type.
    /// - `DuplicateSalaryPeriod` when the period already has a record.
    pub fn create_salary(
        &self,
        employee_id: EmployeeId,
        month: PayPeriod,
        draft: &SalaryDraft,
    ) -> WorkflowResult<Salary> {
        self.require_admin()?;
        let employee = self
            .employees
            .get_employee(employee_id)?
            .ok_or_else(|| WorkflowError::not_found("employee", employee_id))?;
        let base_salary = positive_amount("base salary", draft.base_salary)?;
        let changes = validate_changes(&draft.changes)?;
        let write = SalaryWrite {
            base_salary,
            changes: &changes,
            payable: compute_payable(base_salary, &changes),
            is_paid: draft.is_paid,
        };
        let salary = self.salaries.insert_salary(employee.id, month, &write)?;
        info!(
            "event=salary_create module=workflow status=ok salary_id={} month={} paid={}",
            salary.id, salary.month, salary.is_paid
        );

        if salary.is_paid {
            self.dispatcher.dispatch(WorkflowEvent::SalaryPaid {
                salary: &salary,
                recipient: employee.user_id,
            });
        }
        Ok(salary)
    }

    /// Overwrites an unpaid salary and recomputes `payable`.
    ///
    /// # Errors
    /// - `ImmutableRecord` for any call against a paid record.
    pub fn update_salary(&self, id: SalaryId, draft: &SalaryDraft) -> WorkflowResult<Salary> {
        self.require_admin()?;
        let existing = self
            .salaries
            .get_salary(id)?
            .ok_or_else(|| WorkflowError::not_found("salary", id))?;
        ensure_mutable(&existing).map_err(|_| WorkflowError::ImmutableRecord {
            salary_id: id,
            operation: "modify",
        })?;

        let base_salary = positive_amount("base salary", draft.base_salary)?;
        let changes = validate_changes(&draft.changes)?;
        let write = SalaryWrite {
            base_salary,
            changes: &changes,
            payable: compute_payable(base_salary, &changes),
            is_paid: draft.is_paid,
        };
        let updated = self.salaries.update_unpaid(id, &write)?;
        info!(
            "event=salary_update module=workflow status=ok salary_id={} paid={}",
            id, updated.is_paid
        );

        if updated.is_paid {
            self.notify_salary_paid(&updated);
        }
        Ok(updated)
    }

    pub fn delete_salary(&self, id: SalaryId) -> WorkflowResult<()> {
        self.require_admin()?;
        let existing = self
            .salaries
            .get_salary(id)?
            .ok_or_else(|| WorkflowError::not_found("salary", id))?;
        let frozen = WorkflowError::ImmutableRecord {
            salary_id: id,
            operation: "delete",
        };
        if ensure_mutable(&existing).is_err() {
            return Err(frozen);
        }
        match self.salaries.delete_unpaid(id) {
            Ok(()) => {}
            Err(RepoError::PaidSalary(_)) => return Err(frozen),
            Err(err) => return Err(err.into()),
        }
        info!("event=salary_delete module=workflow status=ok salary_id={id}");
        Ok(())
    }

    /// Creates one unpaid salary per active employee for `month`, skipping
    /// employees that already have one. Safe to re-run.
    pub fn generate_monthly_salaries(&self, month: PayPeriod) -> WorkflowResult<GenerationReport> {
        self.require_admin()?;
        let employees = self.employees.list_employees(true)?;
        let mut report = GenerationReport::default();
        for employee in employees {
            if self
                .salaries
                .insert_if_absent(employee.id, month, employee.basic_salary)?
            {
                report.created += 1;
            } else {
                report.skipped += 1;
            }
        }
        info!(
            "event=salary_generate module=workflow status=ok month={} created={} skipped={}",
            month, report.created, report.skipped
        );
        Ok(report)
    }

    pub fn list_salaries(&self, query: &SalaryQuery) -> WorkflowResult<Vec<Salary>> {
        self.require_admin()?;
        Ok(self.salaries.list_salaries(query)?)
    }

    /// Salaries of the caller's own employee record.
    pub fn list_my_salaries(&self, month: Option<PayPeriod>) -> WorkflowResult<Vec<Salary>> {
        let actor = self.require_actor()?;
        let Some(employee) = self.employees.get_employee_for_user(actor.user_id)? else {
            return Ok(Vec::new());
        };
        Ok(self.salaries.list_salaries(&SalaryQuery {
            employee_id: Some(employee.id),
            month,
        })?)
    }

    pub fn salary_totals(&self) -> WorkflowResult<SalaryTotals> {
        self.require_admin()?;
        Ok(self.salaries.totals()?)
    }

    /// Newest notifications of the caller plus their unread count.
    pub fn list_my_notifications(&self, limit: Option<u32>) -> WorkflowResult<NotificationInbox> {
        let actor = self.require_actor()?;
        let store = self.dispatcher.notifications();
        let notifications =
            store.list_for_recipient(actor.user_id, self.settings.inbox_limit(limit))?;
        let unread_count = store.unread_count(actor.user_id)?;
        Ok(NotificationInbox {
            notifications,
            unread_count,
        })
    }

    pub fn mark_notification_read(&self, id: NotificationId) -> WorkflowResult<()> {
        let actor = self.require_actor()?;
        let store = self.dispatcher.notifications();
        let notification = store
            .get_notification(id)?
            .ok_or_else(|| WorkflowError::not_found("notification", id))?;
        if notification.recipient_id != actor.user_id {
            return Err(WorkflowError::PermissionDenied(
                "You can only update your own notifications",
            ));
        }
        Ok(store.mark_read(id)?)
    }

    /// Returns how many notifications were flipped to read.
    pub fn mark_all_notifications_read(&self) -> WorkflowResult<u32> {
        let actor = self.require_actor()?;
        Ok(self.dispatcher.notifications().mark_all_read(actor.user_id)?)
    }

    fn require_actor(&self) -> WorkflowResult<Actor> {
        self.identity
            .current_actor()
            .ok_or(WorkflowError::Unauthorized)
    }

    fn require_admin(&self) -> WorkflowResult<Actor> {
        let actor = self.require_actor()?;
        if !actor.is_admin() {
            return Err(WorkflowError::PermissionDenied(
                "Only admins can perform this action",
            ));
        }
        Ok(actor)
    }

    fn load_task(&self, id: TaskId) -> WorkflowResult<Task> {
        self.tasks
            .get_task(id)?
            .ok_or_else(|| WorkflowError::not_found("task", id))
    }

    fn notify_salary_paid(&self, salary: &Salary) {
        match self.employees.get_employee(salary.employee_id) {
            Ok(Some(employee)) => {
                self.dispatcher.dispatch(WorkflowEvent::SalaryPaid {
                    salary,
                    recipient: employee.user_id,
                });
            }
            Ok(None) => {}
            Err(err) => warn!(
                "event=notify_dispatch module=workflow status=error kind=GENERAL salary_id={} error={}",
                salary.id, err
            ),
        }
    }
}

fn may_access(actor: &Actor, task: &Task) -> bool {
    actor.is_admin() || task.assignee_user_id == actor.user_id
}

fn validate_profile(profile: &EmployeeProfile) -> WorkflowResult<EmployeeProfile> {
    Ok(EmployeeProfile {
        name: bounded_text("name", &profile.name, EMPLOYEE_NAME_MIN, EMPLOYEE_NAME_MAX)?,
        email: validation::email(&profile.email)?,
        employment_date: profile.employment_date,
        basic_salary: positive_amount("basic salary", profile.basic_salary)?,
        is_active: profile.is_active,
    })
}

fn validate_project(
    name: &str,
    description: Option<&str>,
) -> WorkflowResult<(String, Option<String>)> {
    let name = bounded_text("project name", name, PROJECT_NAME_MIN, PROJECT_NAME_MAX)?;
    let description = optional_text("description", description, PROJECT_DESCRIPTION_MAX)?;
    Ok((name, description))
}

fn validate_task_details(
    title: &str,
    description: Option<&str>,
) -> WorkflowResult<(String, Option<String>)> {
    let title = bounded_text("title", title, TASK_TITLE_MIN, TASK_TITLE_MAX)?;
    let description = optional_text("description", description, TASK_DESCRIPTION_MAX)?;
    Ok((title, description))
}
