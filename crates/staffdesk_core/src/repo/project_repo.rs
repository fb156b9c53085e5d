//! Project repository contracts and SQLite implementation.
//!
//! # Invariants
//! - A project that owns at least one task is never hard-deleted.
//! - Listing is deterministic: `created_at DESC, id ASC`.

use crate::db::NOW_MS_SQL;
use crate::model::project::{Project, ProjectId, ProjectSummary};
use crate::repo::{
    begin_immediate, bool_to_int, ensure_connection_ready, parse_bool, parse_uuid, RepoError,
    RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const PROJECT_SELECT_SQL: &str = "SELECT
    p.id,
    p.name,
    p.description,
    p.is_archived,
    p.created_at,
    (SELECT COUNT(*) FROM tasks t WHERE t.project_id = p.id) AS task_count
FROM projects p";

pub trait ProjectRepository {
    fn create_project(&self, name: &str, description: Option<&str>) -> RepoResult<Project>;
    fn update_project(
        &self,
        id: ProjectId,
        name: &str,
        description: Option<&str>,
    ) -> RepoResult<Project>;
    fn set_archived(&self, id: ProjectId, is_archived: bool) -> RepoResult<Project>;
    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>>;
    fn list_projects(&self, include_archived: bool) -> RepoResult<Vec<ProjectSummary>>;
    /// Deletes the project when it owns no tasks.
    fn delete_project(&self, id: ProjectId) -> RepoResult<()>;
}

/// SQLite-backed project repository.
pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn require(&self, id: ProjectId) -> RepoResult<Project> {
        self.get_project(id)?
            .ok_or_else(|| RepoError::not_found("project", id))
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn create_project(&self, name: &str, description: Option<&str>) -> RepoResult<Project> {
        let id = Uuid::new_v4();
        self.conn.execute(
            &format!(
                "INSERT INTO projects (id, name, description, is_archived, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, {NOW_MS_SQL}, {NOW_MS_SQL});"
            ),
            params![id.to_string(), name, description],
        )?;
        self.require(id)
    }

    fn update_project(
        &self,
        id: ProjectId,
        name: &str,
        description: Option<&str>,
    ) -> RepoResult<Project> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE projects
                 SET name = ?1, description = ?2, updated_at = {NOW_MS_SQL}
                 WHERE id = ?3;"
            ),
            params![name, description, id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("project", id));
        }
        self.require(id)
    }

    fn set_archived(&self, id: ProjectId, is_archived: bool) -> RepoResult<Project> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE projects SET is_archived = ?1, updated_at = {NOW_MS_SQL} WHERE id = ?2;"
            ),
            params![bool_to_int(is_archived), id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("project", id));
        }
        self.require(id)
    }

    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        let row = self
            .conn
            .query_row(
                &format!("{PROJECT_SELECT_SQL} WHERE p.id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_project_row(row).map(|summary| summary.project)),
            )
            .optional()?;
        row.transpose()
    }

    fn list_projects(&self, include_archived: bool) -> RepoResult<Vec<ProjectSummary>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PROJECT_SELECT_SQL}
             WHERE (?1 = 1 OR p.is_archived = 0)
             ORDER BY p.created_at DESC, p.id ASC;"
        ))?;
        let mut rows = stmt.query([bool_to_int(include_archived)])?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(row)?);
        }
        Ok(projects)
    }

    fn delete_project(&self, id: ProjectId) -> RepoResult<()> {
        let tx = begin_immediate(self.conn)?;
        let task_count: u32 = tx.query_row(
            "SELECT COUNT(*) FROM tasks WHERE project_id = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )?;
        if task_count > 0 {
            return Err(RepoError::HasDependents {
                entity: "project",
                id,
                count: task_count,
            });
        }

        let changed = tx.execute("DELETE FROM projects WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("project", id));
        }
        tx.commit()?;
        Ok(())
    }
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<ProjectSummary> {
    let id: String = row.get("id")?;
    Ok(ProjectSummary {
        project: Project {
            id: parse_uuid(&id, "projects.id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            is_archived: parse_bool(row.get("is_archived")?, "projects.is_archived")?,
            created_at: row.get("created_at")?,
        },
        task_count: row.get("task_count")?,
    })
}
