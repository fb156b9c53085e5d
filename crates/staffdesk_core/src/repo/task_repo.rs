//! Task and task-action repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist task rows together with their audit actions.
//! - Provide compare-and-set status writes for the state machine.
//!
//! # Invariants
//! - Every task mutation and its `task_actions` row commit in one
//!   transaction, or neither does.
//! - `task_actions` rows are only inserted or removed with their task.
//! - Status writes only apply when the persisted status equals the status
//!   the caller validated against.

use crate::db::NOW_MS_SQL;
use crate::model::employee::EmployeeId;
use crate::model::project::ProjectId;
use crate::model::task::{
    NewTask, NewTaskAction, Task, TaskAction, TaskDetailsPatch, TaskId, TaskStatus,
    TaskStatusCounts,
};
use crate::repo::{
    begin_immediate, date_to_db, ensure_connection_ready, parse_date, parse_task_status,
    parse_uuid, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    t.id,
    t.project_id,
    t.assignee_id,
    e.user_id AS assignee_user_id,
    t.title,
    t.description,
    t.due_date,
    t.status,
    t.created_at,
    t.updated_at
FROM tasks t
INNER JOIN employees e ON e.id = t.assignee_id";

const ACTION_SELECT_SQL: &str = "SELECT
    seq,
    id,
    task_id,
    user_id,
    description,
    old_status,
    new_status,
    note,
    created_at
FROM task_actions";

/// Ordering shared by assignee and project listings.
const TASK_LIST_ORDER_SQL: &str = "ORDER BY
    CASE t.status WHEN 'PENDING' THEN 0 WHEN 'IN_PROGRESS' THEN 1 ELSE 2 END ASC,
    t.due_date IS NULL ASC,
    t.due_date ASC,
    t.updated_at DESC,
    t.id ASC";

pub trait TaskRepository {
    /// Inserts a task and its creation action atomically.
    fn create_task(&self, task: &NewTask, status: TaskStatus, action: &NewTaskAction)
        -> RepoResult<Task>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    /// Replaces editable details and appends `action` atomically.
    fn update_details(
        &self,
        id: TaskId,
        patch: &TaskDetailsPatch,
        action: &NewTaskAction,
    ) -> RepoResult<Task>;
    /// Sets `to` only if the persisted status is still `expected`, appending
    /// `action` in the same transaction.
    ///
    /// Returns `StatusConflict` carrying the actual status otherwise.
    fn compare_and_set_status(
        &self,
        id: TaskId,
        expected: TaskStatus,
        to: TaskStatus,
        action: &NewTaskAction,
    ) -> RepoResult<(Task, TaskAction)>;
    /// Appends one action without touching task fields except `updated_at`.
    fn append_action(&self, id: TaskId, action: &NewTaskAction) -> RepoResult<TaskAction>;
    /// Lists actions newest first.
    fn list_actions(&self, id: TaskId) -> RepoResult<Vec<TaskAction>>;
    /// Removes all actions, then the task, in one transaction.
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    fn list_for_assignee(&self, assignee_id: EmployeeId) -> RepoResult<Vec<Task>>;
    fn list_for_project(&self, project_id: ProjectId) -> RepoResult<Vec<Task>>;
    fn status_counts(&self) -> RepoResult<TaskStatusCounts>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(
        &self,
        task: &NewTask,
        status: TaskStatus,
        action: &NewTaskAction,
    ) -> RepoResult<Task> {
        let tx = begin_immediate(self.conn)?;
        let id = Uuid::new_v4();
        tx.execute(
            &format!(
                "INSERT INTO tasks (
                    id, project_id, assignee_id, title, description, due_date, status,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, {NOW_MS_SQL}, {NOW_MS_SQL});"
            ),
            params![
                id.to_string(),
                task.project_id.to_string(),
                task.assignee_id.to_string(),
                task.title.as_str(),
                task.description.as_deref(),
                task.due_date.map(date_to_db),
                status.as_str(),
            ],
        )?;
        insert_action(&tx, id, action)?;
        let created = load_task(&tx, id)?.ok_or_else(|| RepoError::not_found("task", id))?;
        tx.commit()?;
        Ok(created)
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        load_task(self.conn, id)
    }

    fn update_details(
        &self,
        id: TaskId,
        patch: &TaskDetailsPatch,
        action: &NewTaskAction,
    ) -> RepoResult<Task> {
        let tx = begin_immediate(self.conn)?;
        let changed = tx.execute(
            &format!(
                "UPDATE tasks
                 SET title = ?1, description = ?2, due_date = ?3, updated_at = {NOW_MS_SQL}
                 WHERE id = ?4;"
            ),
            params![
                patch.title.as_str(),
                patch.description.as_deref(),
                patch.due_date.map(date_to_db),
                id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("task", id));
        }
        insert_action(&tx, id, action)?;
        let updated = load_task(&tx, id)?.ok_or_else(|| RepoError::not_found("task", id))?;
        tx.commit()?;
        Ok(updated)
    }

    fn compare_and_set_status(
        &self,
        id: TaskId,
        expected: TaskStatus,
        to: TaskStatus,
        action: &NewTaskAction,
    ) -> RepoResult<(Task, TaskAction)> {
        let tx = begin_immediate(self.conn)?;
        let changed = tx.execute(
            &format!(
                "UPDATE tasks
                 SET status = ?1, updated_at = {NOW_MS_SQL}
                 WHERE id = ?2 AND status = ?3;"
            ),
            params![to.as_str(), id.to_string(), expected.as_str()],
        )?;
        if changed == 0 {
            let actual = load_task(&tx, id)?
                .ok_or_else(|| RepoError::not_found("task", id))?
                .status;
            return Err(RepoError::StatusConflict {
                task_id: id,
                expected,
                actual,
            });
        }
        let recorded = insert_action(&tx, id, action)?;
        let updated = load_task(&tx, id)?.ok_or_else(|| RepoError::not_found("task", id))?;
        tx.commit()?;
        Ok((updated, recorded))
    }

    fn append_action(&self, id: TaskId, action: &NewTaskAction) -> RepoResult<TaskAction> {
        let tx = begin_immediate(self.conn)?;
        let changed = tx.execute(
            &format!("UPDATE tasks SET updated_at = {NOW_MS_SQL} WHERE id = ?1;"),
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("task", id));
        }
        let recorded = insert_action(&tx, id, action)?;
        tx.commit()?;
        Ok(recorded)
    }

    fn list_actions(&self, id: TaskId) -> RepoResult<Vec<TaskAction>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ACTION_SELECT_SQL} WHERE task_id = ?1 ORDER BY seq DESC;"
        ))?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut actions = Vec::new();
        while let Some(row) = rows.next()? {
            actions.push(parse_action_row(row)?);
        }
        Ok(actions)
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let tx = begin_immediate(self.conn)?;
        tx.execute("DELETE FROM task_actions WHERE task_id = ?1;", [id.to_string()])?;
        let changed = tx.execute("DELETE FROM tasks WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("task", id));
        }
        tx.commit()?;
        Ok(())
    }

    fn list_for_assignee(&self, assignee_id: EmployeeId) -> RepoResult<Vec<Task>> {
        query_tasks(self.conn, "t.assignee_id", &assignee_id.to_string())
    }

    fn list_for_project(&self, project_id: ProjectId) -> RepoResult<Vec<Task>> {
        query_tasks(self.conn, "t.project_id", &project_id.to_string())
    }

    fn status_counts(&self) -> RepoResult<TaskStatusCounts> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM tasks GROUP BY status;")?;
        let mut rows = stmt.query([])?;
        let mut counts = TaskStatusCounts::default();
        while let Some(row) = rows.next()? {
            let status_text: String = row.get(0)?;
            let count: u32 = row.get(1)?;
            match parse_task_status(&status_text, "tasks.status")? {
                TaskStatus::Pending => counts.pending = count,
                TaskStatus::InProgress => counts.in_progress = count,
                TaskStatus::Done => counts.done = count,
            }
        }
        Ok(counts)
    }
}

fn insert_action(
    conn: &Connection,
    task_id: TaskId,
    action: &NewTaskAction,
) -> RepoResult<TaskAction> {
    let id = Uuid::new_v4();
    conn.execute(
        &format!(
            "INSERT INTO task_actions (
                id, task_id, user_id, description, old_status, new_status, note, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, {NOW_MS_SQL});"
        ),
        params![
            id.to_string(),
            task_id.to_string(),
            action.user_id.to_string(),
            action.description.as_str(),
            action.old_status.map(TaskStatus::as_str),
            action.new_status.map(TaskStatus::as_str),
            action.note.as_deref(),
        ],
    )?;
    let row = conn
        .query_row(
            &format!("{ACTION_SELECT_SQL} WHERE id = ?1;"),
            [id.to_string()],
            |row| Ok(parse_action_row(row)),
        )
        .optional()?;
    row.transpose()?
        .ok_or_else(|| RepoError::not_found("task action", id))
}

fn load_task(conn: &Connection, id: TaskId) -> RepoResult<Option<Task>> {
    let row = conn
        .query_row(
            &format!("{TASK_SELECT_SQL} WHERE t.id = ?1;"),
            [id.to_string()],
            |row| Ok(parse_task_row(row)),
        )
        .optional()?;
    row.transpose()
}

fn query_tasks(conn: &Connection, key_column: &str, key: &str) -> RepoResult<Vec<Task>> {
    let mut stmt = conn.prepare(&format!(
        "{TASK_SELECT_SQL} WHERE {key_column} = ?1 {TASK_LIST_ORDER_SQL};"
    ))?;
    let mut rows = stmt.query([key])?;
    let mut tasks = Vec::new();
    while let Some(row) = rows.next()? {
        tasks.push(parse_task_row(row)?);
    }
    Ok(tasks)
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id: String = row.get("id")?;
    let project_id: String = row.get("project_id")?;
    let assignee_id: String = row.get("assignee_id")?;
    let assignee_user_id: String = row.get("assignee_user_id")?;
    let status: String = row.get("status")?;
    let due_date = match row.get::<_, Option<String>>("due_date")? {
        Some(value) => Some(parse_date(&value, "tasks.due_date")?),
        None => None,
    };

    Ok(Task {
        id: parse_uuid(&id, "tasks.id")?,
        project_id: parse_uuid(&project_id, "tasks.project_id")?,
        assignee_id: parse_uuid(&assignee_id, "tasks.assignee_id")?,
        assignee_user_id: parse_uuid(&assignee_user_id, "employees.user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        due_date,
        status: parse_task_status(&status, "tasks.status")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_action_row(row: &Row<'_>) -> RepoResult<TaskAction> {
    let id: String = row.get("id")?;
    let task_id: String = row.get("task_id")?;
    let user_id: String = row.get("user_id")?;
    let old_status = match row.get::<_, Option<String>>("old_status")? {
        Some(value) => Some(parse_task_status(&value, "task_actions.old_status")?),
        None => None,
    };
    let new_status = match row.get::<_, Option<String>>("new_status")? {
        Some(value) => Some(parse_task_status(&value, "task_actions.new_status")?),
        None => None,
    };

    Ok(TaskAction {
        id: parse_uuid(&id, "task_actions.id")?,
        task_id: parse_uuid(&task_id, "task_actions.task_id")?,
        seq: row.get("seq")?,
        description: row.get("description")?,
        old_status,
        new_status,
        note: row.get("note")?,
        user_id: parse_uuid(&user_id, "task_actions.user_id")?,
        created_at: row.get("created_at")?,
    })
}
