//! User account repository and admin roster.
//!
//! # Invariants
//! - E-mail is unique case-insensitively.
//! - `list_admins` reflects the roster at call time; nothing is cached.

use crate::db::NOW_MS_SQL;
use crate::model::identity::{Role, User, UserId};
use crate::repo::{ensure_connection_ready, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const USER_SELECT_SQL: &str = "SELECT id, name, email, role, created_at FROM users";

/// Current set of admin users, used for notification fan-out.
pub trait AdminRoster {
    fn list_admins(&self) -> RepoResult<Vec<UserId>>;
}

pub trait UserRepository {
    /// Creates one user with a generated id.
    fn create_user(&self, name: &str, email: &str, role: Role) -> RepoResult<User>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, name: &str, email: &str, role: Role) -> RepoResult<User> {
        let id = Uuid::new_v4();
        insert_user(self.conn, id, name, email, role)?;
        self.get_user(id)?
            .ok_or_else(|| RepoError::not_found("user", id))
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        load_user(self.conn, id)
    }
}

impl AdminRoster for SqliteUserRepository<'_> {
    fn list_admins(&self) -> RepoResult<Vec<UserId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM users WHERE role = 'ADMIN' ORDER BY name ASC, id ASC;")?;
        let mut rows = stmt.query([])?;
        let mut admins = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            admins.push(parse_uuid(&id, "users.id")?);
        }
        Ok(admins)
    }
}

/// Inserts one user row; maps e-mail collisions to `DuplicateEmail`.
pub(crate) fn insert_user(
    conn: &Connection,
    id: UserId,
    name: &str,
    email: &str,
    role: Role,
) -> RepoResult<()> {
    let result = conn.execute(
        &format!(
            "INSERT INTO users (id, name, email, role, created_at)
             VALUES (?1, ?2, ?3, ?4, {NOW_MS_SQL});"
        ),
        params![id.to_string(), name, email, role.as_str()],
    );
    match result {
        Ok(_) => Ok(()),
        Err(err) => {
            let err = RepoError::from(err);
            if err.is_unique_violation() {
                Err(RepoError::DuplicateEmail(email.to_string()))
            } else {
                Err(err)
            }
        }
    }
}

pub(crate) fn load_user(conn: &Connection, id: UserId) -> RepoResult<Option<User>> {
    let row = conn
        .query_row(
            &format!("{USER_SELECT_SQL} WHERE id = ?1;"),
            [id.to_string()],
            |row| Ok(read_user_columns(row)),
        )
        .optional()?;
    row.transpose()
}

fn read_user_columns(row: &Row<'_>) -> RepoResult<User> {
    let id: String = row.get("id")?;
    let role_text: String = row.get("role")?;
    let role = Role::parse(&role_text)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid role `{role_text}` in users.role")))?;
    Ok(User {
        id: parse_uuid(&id, "users.id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        role,
        created_at: row.get("created_at")?,
    })
}
