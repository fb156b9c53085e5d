//! Notification fan-out for task and salary events.
//!
//! # Responsibility
//! - Pick recipients from the event and the actor's role.
//! - Create one unread notification per recipient.
//!
//! # Invariants
//! - Dispatch is best-effort: failures are logged and counted, never
//!   returned to the caller.
//! - Admin fan-out creates one record per admin, not a shared record.

use crate::model::identity::{Actor, UserId};
use crate::model::notification::{NewNotification, NotificationType};
use crate::model::salary::Salary;
use crate::model::task::{Task, TaskStatus};
use crate::repo::notification_repo::NotificationRepository;
use crate::repo::user_repo::AdminRoster;
use crate::repo::RepoResult;
use log::{info, warn};

/// Event that may produce notifications.
#[derive(Debug, Clone, Copy)]
pub enum WorkflowEvent<'a> {
    TaskAssigned {
        task: &'a Task,
    },
    TaskStatusChanged {
        task: &'a Task,
        from: TaskStatus,
        to: TaskStatus,
        actor: &'a Actor,
    },
    TaskNoteAdded {
        task: &'a Task,
        actor: &'a Actor,
    },
    TaskDetailsUpdated {
        task: &'a Task,
        actor: &'a Actor,
    },
    TaskDeleted {
        task: &'a Task,
        actor: &'a Actor,
    },
    SalaryPaid {
        salary: &'a Salary,
        recipient: UserId,
    },
}

/// Outcome of one dispatch call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub created: u32,
    pub failed: u32,
}

/// Deep-link targets for generated notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationLinks {
    /// Prefix followed by the task id.
    pub task_prefix: String,
    pub salaries: String,
}

impl Default for NotificationLinks {
    fn default() -> Self {
        Self {
            task_prefix: "/dashboard/tasks?taskId=".to_string(),
            salaries: "/dashboard/salaries".to_string(),
        }
    }
}

impl NotificationLinks {
    pub fn task(&self, task: &Task) -> String {
        format!("{}{}", self.task_prefix, task.id)
    }
}

/// Notification dispatcher over a store and an admin roster.
pub struct NotificationDispatcher<N: NotificationRepository, A: AdminRoster> {
    notifications: N,
    roster: A,
    links: NotificationLinks,
}

impl<N: NotificationRepository, A: AdminRoster> NotificationDispatcher<N, A> {
    pub fn new(notifications: N, roster: A, links: NotificationLinks) -> Self {
        Self {
            notifications,
            roster,
            links,
        }
    }

    pub fn notifications(&self) -> &N {
        &self.notifications
    }

    /// Creates the notifications `event` calls for.
    pub fn dispatch(&self, event: WorkflowEvent<'_>) -> DispatchReport {
        let (kind, title, message, link) = self.render(event);
        let recipients = match self.recipients(event) {
            Ok(recipients) => recipients,
            Err(err) => {
                warn!(
                    "event=notify_dispatch module=workflow status=error kind={} error={}",
                    kind.as_str(),
                    err
                );
                return DispatchReport {
                    created: 0,
                    failed: 1,
                };
            }
        };

        let mut report = DispatchReport::default();
        for recipient_id in recipients {
            let notification = NewNotification {
                recipient_id,
                title: title.to_string(),
                message: message.clone(),
                kind,
                link: link.clone(),
            };
            match self.notifications.create_notification(&notification) {
                Ok(_) => report.created += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        "event=notify_dispatch module=workflow status=error kind={} recipient={} error={}",
                        kind.as_str(),
                        recipient_id,
                        err
                    );
                }
            }
        }
        info!(
            "event=notify_dispatch module=workflow status=ok kind={} created={} failed={}",
            kind.as_str(),
            report.created,
            report.failed
        );
        report
    }

    fn recipients(&self, event: WorkflowEvent<'_>) -> RepoResult<Vec<UserId>> {
        match event {
            WorkflowEvent::TaskAssigned { task } => Ok(vec![task.assignee_user_id]),
            WorkflowEvent::TaskDeleted { task, .. } => Ok(vec![task.assignee_user_id]),
            WorkflowEvent::TaskStatusChanged { task, actor, .. }
            | WorkflowEvent::TaskNoteAdded { task, actor }
            | WorkflowEvent::TaskDetailsUpdated { task, actor } => {
                if actor.is_admin() {
                    Ok(vec![task.assignee_user_id])
                } else {
                    self.roster.list_admins()
                }
            }
            WorkflowEvent::SalaryPaid { recipient, .. } => Ok(vec![recipient]),
        }
    }

    fn render(&self, event: WorkflowEvent<'_>) -> (NotificationType, &'static str, String, String) {
        match event {
            WorkflowEvent::TaskAssigned { task } => (
                NotificationType::TaskAssignment,
                "New Task Assigned",
                format!("You've been assigned to a new task: {}", task.title),
                self.links.task(task),
            ),
            WorkflowEvent::TaskStatusChanged {
                task,
                from,
                to,
                actor,
            } => (
                NotificationType::StatusChange,
                "Task Status Updated",
                format!(
                    "Task \"{}\" status changed from {} to {} by {}",
                    task.title,
                    from,
                    to,
                    actor.display_name()
                ),
                self.links.task(task),
            ),
            WorkflowEvent::TaskNoteAdded { task, actor } => {
                self.task_update(task, actor, "has a new note")
            }
            WorkflowEvent::TaskDetailsUpdated { task, actor } => {
                self.task_update(task, actor, "details were updated")
            }
            WorkflowEvent::TaskDeleted { task, actor } => {
                self.task_update(task, actor, "has been deleted")
            }
            WorkflowEvent::SalaryPaid { salary, .. } => (
                NotificationType::General,
                "Salary Paid",
                format!(
                    "Your salary for {} has been marked as paid",
                    salary.month.label()
                ),
                self.links.salaries.clone(),
            ),
        }
    }

    fn task_update(
        &self,
        task: &Task,
        actor: &Actor,
        what: &str,
    ) -> (NotificationType, &'static str, String, String) {
        (
            NotificationType::TaskUpdate,
            "Task Updated",
            format!("Task \"{}\" {} by {}", task.title, what, actor.display_name()),
            self.links.task(task),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{NotificationDispatcher, NotificationLinks, WorkflowEvent};
    use crate::model::identity::{Actor, Role, UserId};
    use crate::model::notification::{
        NewNotification, Notification, NotificationId, NotificationType,
    };
    use crate::model::task::{Task, TaskStatus};
    use crate::repo::notification_repo::NotificationRepository;
    use crate::repo::user_repo::AdminRoster;
    use crate::repo::{RepoError, RepoResult};
    use std::cell::RefCell;
    use uuid::Uuid;

    #[derive(Default)]
    struct Inbox {
        created: RefCell<Vec<NewNotification>>,
        fail_for: Option<UserId>,
    }

    impl NotificationRepository for &Inbox {
        fn create_notification(&self, notification: &NewNotification) -> RepoResult<Notification> {
            if self.fail_for == Some(notification.recipient_id) {
                return Err(RepoError::InvalidData("inbox unavailable".to_string()));
            }
            self.created.borrow_mut().push(notification.clone());
            Ok(Notification {
                id: Uuid::new_v4(),
                recipient_id: notification.recipient_id,
                title: notification.title.clone(),
                message: notification.message.clone(),
                kind: notification.kind,
                link: notification.link.clone(),
                is_read: false,
                created_at: 0,
            })
        }

        fn get_notification(&self, _: NotificationId) -> RepoResult<Option<Notification>> {
            Ok(None)
        }

        fn list_for_recipient(&self, _: UserId, _: u32) -> RepoResult<Vec<Notification>> {
            Ok(Vec::new())
        }

        fn unread_count(&self, _: UserId) -> RepoResult<u32> {
            Ok(0)
        }

        fn mark_read(&self, _: NotificationId) -> RepoResult<()> {
            Ok(())
        }

        fn mark_all_read(&self, _: UserId) -> RepoResult<u32> {
            Ok(0)
        }
    }

    struct Roster(Vec<UserId>);

    impl AdminRoster for Roster {
        fn list_admins(&self) -> RepoResult<Vec<UserId>> {
            Ok(self.0.clone())
        }
    }

    fn task(assignee_user_id: UserId) -> Task {
        Task {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            assignee_id: Uuid::new_v4(),
            assignee_user_id,
            title: "Quarterly report".to_string(),
            description: None,
            due_date: None,
            status: TaskStatus::Pending,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn assignee_status_change_fans_out_to_every_admin() {
        let inbox = Inbox::default();
        let admins = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let dispatcher =
            NotificationDispatcher::new(&inbox, Roster(admins.clone()), NotificationLinks::default());
        let assignee = Actor::new(Uuid::new_v4(), Role::Employee, "Xia");
        let task = task(assignee.user_id);

        let report = dispatcher.dispatch(WorkflowEvent::TaskStatusChanged {
            task: &task,
            from: TaskStatus::Pending,
            to: TaskStatus::InProgress,
            actor: &assignee,
        });

        assert_eq!(report.created, 3);
        let created = inbox.created.borrow();
        let recipients: Vec<UserId> = created.iter().map(|n| n.recipient_id).collect();
        assert_eq!(recipients, admins);
        assert!(created.iter().all(|n| n.kind == NotificationType::StatusChange));
        assert_eq!(
            created[0].message,
            "Task \"Quarterly report\" status changed from PENDING to IN_PROGRESS by Xia"
        );
        assert_eq!(created[0].link, format!("/dashboard/tasks?taskId={}", task.id));
    }

    #[test]
    fn admin_note_goes_to_assignee_only() {
        let inbox = Inbox::default();
        let dispatcher = NotificationDispatcher::new(
            &inbox,
            Roster(vec![Uuid::new_v4()]),
            NotificationLinks::default(),
        );
        let admin = Actor::new(Uuid::new_v4(), Role::Admin, "");
        let assignee_user = Uuid::new_v4();
        let task = task(assignee_user);

        dispatcher.dispatch(WorkflowEvent::TaskNoteAdded {
            task: &task,
            actor: &admin,
        });

        let created = inbox.created.borrow();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].recipient_id, assignee_user);
        assert_eq!(created[0].kind, NotificationType::TaskUpdate);
        assert_eq!(
            created[0].message,
            "Task \"Quarterly report\" has a new note by Admin"
        );
    }

    #[test]
    fn failed_recipient_does_not_stop_the_rest() {
        let broken = Uuid::new_v4();
        let healthy = Uuid::new_v4();
        let inbox = Inbox {
            fail_for: Some(broken),
            ..Inbox::default()
        };
        let dispatcher = NotificationDispatcher::new(
            &inbox,
            Roster(vec![broken, healthy]),
            NotificationLinks::default(),
        );
        let assignee = Actor::new(Uuid::new_v4(), Role::Employee, "Xia");
        let task = task(assignee.user_id);

        let report = dispatcher.dispatch(WorkflowEvent::TaskNoteAdded {
            task: &task,
            actor: &assignee,
        });

        assert_eq!(report.created, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(inbox.created.borrow()[0].recipient_id, healthy);
    }
}
