//! Task status transitions with audit recording.
//!
//! # Responsibility
//! - Authorize the caller against the task (assignee or admin).
//! - Validate the requested move with the caller's [`TransitionPolicy`].
//! - Persist status and its action as one compare-and-set write.
//!
//! # Invariants
//! - Validation always runs against the persisted status. A write that
//!   races with another status change is re-validated, never applied.
//! - Every accepted move produces exactly one `TaskAction`.

use crate::model::identity::Actor;
use crate::model::task::{NewTaskAction, Task, TaskAction, TaskId, TaskStatus};
use crate::repo::task_repo::TaskRepository;
use crate::repo::RepoError;
use crate::workflow::error::{WorkflowError, WorkflowResult};
use crate::workflow::policy::{describe_transition, policy_for};
use log::{info, warn};

/// Accepted status move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub task: Task,
    pub action: TaskAction,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Applies status moves through a task repository.
pub struct TaskStateMachine<'r, R: TaskRepository> {
    tasks: &'r R,
    max_rounds: u32,
}

impl<'r, R: TaskRepository> TaskStateMachine<'r, R> {
    pub fn new(tasks: &'r R, max_rounds: u32) -> Self {
        Self {
            tasks,
            max_rounds: max_rounds.max(1),
        }
    }

    /// Moves `task_id` to `requested` on behalf of `actor`.
    ///
    /// # Errors
    /// - `NotFound` when the task does not exist.
    /// - `PermissionDenied` when `actor` is neither admin nor assignee.
    /// - `InvalidTransition` when the policy rejects the move from the
    ///   current persisted status.
    /// - `Repo(StatusConflict)` when the status kept changing for every
    ///   re-validation round.
    pub fn request_transition(
        &self,
        task_id: TaskId,
        actor: &Actor,
        requested: TaskStatus,
        note: Option<String>,
    ) -> WorkflowResult<StatusChange> {
        let task = self
            .tasks
            .get_task(task_id)?
            .ok_or_else(|| WorkflowError::not_found("task", task_id))?;
        if !actor.is_admin() && task.assignee_user_id != actor.user_id {
            return Err(WorkflowError::PermissionDenied(
                "You don't have permission to update this task",
            ));
        }

        let policy = policy_for(actor.role);
        let mut current = task.status;
        let mut last_conflict = None;
        for round in 1..=self.max_rounds {
            if !policy.allows(current, requested) {
                return Err(WorkflowError::InvalidTransition {
                    from: current,
                    to: requested,
                });
            }

            let action = NewTaskAction {
                description: describe_transition(current, requested),
                old_status: Some(current),
                new_status: Some(requested),
                note: note.clone(),
                user_id: actor.user_id,
            };
            match self
                .tasks
                .compare_and_set_status(task_id, current, requested, &action)
            {
                Ok((task, action)) => {
                    info!(
                        "event=task_status_change module=workflow status=ok task_id={} from={} to={} role={}",
                        task_id,
                        current,
                        requested,
                        actor.role.as_str()
                    );
                    return Ok(StatusChange {
                        task,
                        action,
                        from: current,
                        to: requested,
                    });
                }
                Err(RepoError::StatusConflict { actual, .. }) => {
                    warn!(
                        "event=task_status_change module=workflow status=conflict task_id={} expected={} actual={} round={}",
                        task_id, current, actual, round
                    );
                    last_conflict = Some(RepoError::StatusConflict {
                        task_id,
                        expected: current,
                        actual,
                    });
                    current = actual;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(WorkflowError::Repo(last_conflict.unwrap_or(
            RepoError::StatusConflict {
                task_id,
                expected: current,
                actual: current,
            },
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::TaskStateMachine;
    use crate::model::employee::EmployeeId;
    use crate::model::identity::{Actor, Role};
    use crate::model::project::ProjectId;
    use crate::model::task::{
        NewTask, NewTaskAction, Task, TaskAction, TaskDetailsPatch, TaskId, TaskStatus,
        TaskStatusCounts,
    };
    use crate::repo::task_repo::TaskRepository;
    use crate::repo::{RepoError, RepoResult};
    use crate::workflow::error::WorkflowError;
    use std::cell::{Cell, RefCell};
    use uuid::Uuid;

    /// Single-task store whose status can be moved behind the caller's back.
    struct RacyTasks {
        task: RefCell<Task>,
        /// Status forced in before the next compare-and-set.
        interference: RefCell<Vec<TaskStatus>>,
        writes: Cell<u32>,
    }

    impl RacyTasks {
        fn new(status: TaskStatus, assignee_user_id: Uuid) -> Self {
            Self {
                task: RefCell::new(Task {
                    id: Uuid::new_v4(),
                    project_id: Uuid::new_v4(),
                    assignee_id: Uuid::new_v4(),
                    assignee_user_id,
                    title: "Ship it".to_string(),
                    description: None,
                    due_date: None,
                    status,
                    created_at: 0,
                    updated_at: 0,
                }),
                interference: RefCell::new(Vec::new()),
                writes: Cell::new(0),
            }
        }

        fn id(&self) -> TaskId {
            self.task.borrow().id
        }
    }

    impl TaskRepository for RacyTasks {
        fn create_task(&self, _: &NewTask, _: TaskStatus, _: &NewTaskAction) -> RepoResult<Task> {
            unimplemented!()
        }

        fn get_task(&self, _id: TaskId) -> RepoResult<Option<Task>> {
            Ok(Some(self.task.borrow().clone()))
        }

        fn update_details(
            &self,
            _: TaskId,
            _: &TaskDetailsPatch,
            _: &NewTaskAction,
        ) -> RepoResult<Task> {
            unimplemented!()
        }

        fn compare_and_set_status(
            &self,
            id: TaskId,
            expected: TaskStatus,
            to: TaskStatus,
            action: &NewTaskAction,
        ) -> RepoResult<(Task, TaskAction)> {
            if let Some(forced) = self.interference.borrow_mut().pop() {
                self.task.borrow_mut().status = forced;
            }
            let actual = self.task.borrow().status;
            if actual != expected {
                return Err(RepoError::StatusConflict {
                    task_id: id,
                    expected,
                    actual,
                });
            }
            self.task.borrow_mut().status = to;
            self.writes.set(self.writes.get() + 1);
            let recorded = TaskAction {
                id: Uuid::new_v4(),
                task_id: id,
                seq: i64::from(self.writes.get()),
                description: action.description.clone(),
                old_status: action.old_status,
                new_status: action.new_status,
                note: action.note.clone(),
                user_id: action.user_id,
                created_at: 0,
            };
            Ok((self.task.borrow().clone(), recorded))
        }

        fn append_action(&self, _: TaskId, _: &NewTaskAction) -> RepoResult<TaskAction> {
            unimplemented!()
        }

        fn list_actions(&self, _: TaskId) -> RepoResult<Vec<TaskAction>> {
            unimplemented!()
        }

        fn delete_task(&self, _: TaskId) -> RepoResult<()> {
            unimplemented!()
        }

        fn list_for_assignee(&self, _: EmployeeId) -> RepoResult<Vec<Task>> {
            unimplemented!()
        }

        fn list_for_project(&self, _: ProjectId) -> RepoResult<Vec<Task>> {
            unimplemented!()
        }

        fn status_counts(&self) -> RepoResult<TaskStatusCounts> {
            unimplemented!()
        }
    }

    #[test]
    fn stranger_is_denied() {
        let tasks = RacyTasks::new(TaskStatus::Pending, Uuid::new_v4());
        let stranger = Actor::new(Uuid::new_v4(), Role::Employee, "Eve");
        let result = TaskStateMachine::new(&tasks, 3).request_transition(
            tasks.id(),
            &stranger,
            TaskStatus::InProgress,
            None,
        );
        assert!(matches!(result, Err(WorkflowError::PermissionDenied(_))));
        assert_eq!(tasks.writes.get(), 0);
    }

    #[test]
    fn stale_status_is_revalidated_and_accepted_when_still_legal() {
        let assignee = Actor::new(Uuid::new_v4(), Role::Employee, "Xia");
        let tasks = RacyTasks::new(TaskStatus::Pending, assignee.user_id);
        // Someone else starts the task first; PENDING -> IN_PROGRESS is then
        // no longer legal, so the request must fail rather than overwrite.
        tasks.interference.borrow_mut().push(TaskStatus::InProgress);
        let result = TaskStateMachine::new(&tasks, 3).request_transition(
            tasks.id(),
            &assignee,
            TaskStatus::InProgress,
            None,
        );
        assert!(matches!(
            result,
            Err(WorkflowError::InvalidTransition {
                from: TaskStatus::InProgress,
                to: TaskStatus::InProgress
            })
        ));
        assert_eq!(tasks.writes.get(), 0);
    }

    #[test]
    fn admin_move_survives_a_concurrent_change() {
        let admin = Actor::new(Uuid::new_v4(), Role::Admin, "Ada");
        let tasks = RacyTasks::new(TaskStatus::InProgress, Uuid::new_v4());
        tasks.interference.borrow_mut().push(TaskStatus::Done);
        let change = TaskStateMachine::new(&tasks, 3)
            .request_transition(tasks.id(), &admin, TaskStatus::Pending, None)
            .unwrap();
        assert_eq!(change.from, TaskStatus::Done);
        assert_eq!(change.action.old_status, Some(TaskStatus::Done));
        assert_eq!(change.action.description, "Status reverted from DONE to PENDING");
        assert_eq!(tasks.writes.get(), 1);
    }

    #[test]
    fn gives_up_after_bounded_rounds() {
        let admin = Actor::new(Uuid::new_v4(), Role::Admin, "Ada");
        let tasks = RacyTasks::new(TaskStatus::Pending, Uuid::new_v4());
        tasks.interference.borrow_mut().extend([
            TaskStatus::InProgress,
            TaskStatus::Done,
            TaskStatus::InProgress,
        ]);
        let result = TaskStateMachine::new(&tasks, 2).request_transition(
            tasks.id(),
            &admin,
            TaskStatus::Done,
            None,
        );
        assert!(matches!(
            result,
            Err(WorkflowError::Repo(RepoError::StatusConflict { .. }))
        ));
        assert_eq!(tasks.writes.get(), 0);
    }
}
