//! Employee repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Create employee + user account pairs atomically.
//! - Assign collision-checked 6-digit employee codes.
//!
//! # Invariants
//! - Code sampling, uniqueness check and insert share one transaction.
//! - Deletion is refused while task, action or salary history exists.

use crate::db::NOW_MS_SQL;
use crate::model::employee::{Employee, EmployeeId, EmployeeProfile, EMPLOYEE_CODE_MAX, EMPLOYEE_CODE_MIN};
use crate::model::identity::{Role, UserId};
use crate::repo::user_repo::insert_user;
use crate::repo::{
    begin_immediate, bool_to_int, date_to_db, ensure_connection_ready, parse_bool, parse_date,
    parse_uuid, RepoError, RepoResult,
};
use log::debug;
use rand::{Rng, RngCore};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const EMPLOYEE_SELECT_SQL: &str = "SELECT
    e.id,
    e.code,
    e.user_id,
    u.name,
    u.email,
    e.employment_date,
    e.basic_salary,
    e.is_active,
    e.created_at
FROM employees e
INNER JOIN users u ON u.id = e.user_id";

/// Rows that keep an employee from being hard-deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmployeeHistory {
    pub tasks: u32,
    pub actions: u32,
    pub salaries: u32,
}

impl EmployeeHistory {
    pub fn total(&self) -> u32 {
        self.tasks + self.actions + self.salaries
    }
}

pub trait EmployeeRepository {
    /// Creates user + employee with a fresh code sampled from `rng`.
    fn create_employee(
        &self,
        profile: &EmployeeProfile,
        rng: &mut dyn RngCore,
        max_code_attempts: u32,
    ) -> RepoResult<Employee>;
    fn update_employee(&self, id: EmployeeId, profile: &EmployeeProfile) -> RepoResult<Employee>;
    fn set_active(&self, id: EmployeeId, is_active: bool) -> RepoResult<Employee>;
    fn get_employee(&self, id: EmployeeId) -> RepoResult<Option<Employee>>;
    fn get_employee_for_user(&self, user_id: UserId) -> RepoResult<Option<Employee>>;
    /// Lists employees ordered by name.
    fn list_employees(&self, active_only: bool) -> RepoResult<Vec<Employee>>;
    fn history(&self, id: EmployeeId) -> RepoResult<EmployeeHistory>;
    /// Deletes employee and user account when no history exists.
    fn delete_employee(&self, id: EmployeeId) -> RepoResult<()>;
}

/// SQLite-backed employee repository.
pub struct SqliteEmployeeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEmployeeRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl EmployeeRepository for SqliteEmployeeRepository<'_> {
    fn create_employee(
        &self,
        profile: &EmployeeProfile,
        rng: &mut dyn RngCore,
        max_code_attempts: u32,
    ) -> RepoResult<Employee> {
        let tx = begin_immediate(self.conn)?;
        let user_id = Uuid::new_v4();
        insert_user(
            &tx,
            user_id,
            profile.name.as_str(),
            profile.email.as_str(),
            Role::Employee,
        )?;

        let code = sample_free_code(&tx, rng, max_code_attempts)?;
        let id = Uuid::new_v4();
        tx.execute(
            &format!(
                "INSERT INTO employees (
                    id, code, user_id, employment_date, basic_salary, is_active, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, {NOW_MS_SQL}, {NOW_MS_SQL});"
            ),
            params![
                id.to_string(),
                code,
                user_id.to_string(),
                date_to_db(profile.employment_date),
                profile.basic_salary,
                bool_to_int(profile.is_active),
            ],
        )?;
        let employee = load_employee(&tx, "e.id", &id.to_string())?
            .ok_or_else(|| RepoError::not_found("employee", id))?;
        tx.commit()?;
        Ok(employee)
    }

    fn update_employee(&self, id: EmployeeId, profile: &EmployeeProfile) -> RepoResult<Employee> {
        let tx = begin_immediate(self.conn)?;
        let existing = load_employee(&tx, "e.id", &id.to_string())?
            .ok_or_else(|| RepoError::not_found("employee", id))?;

        let user_update = tx.execute(
            "UPDATE users SET name = ?1, email = ?2 WHERE id = ?3;",
            params![
                profile.name.as_str(),
                profile.email.as_str(),
                existing.user_id.to_string()
            ],
        );
        if let Err(err) = user_update {
            let err = RepoError::from(err);
            return Err(if err.is_unique_violation() {
                RepoError::DuplicateEmail(profile.email.clone())
            } else {
                err
            });
        }

        tx.execute(
            &format!(
                "UPDATE employees
                 SET
                    employment_date = ?1,
                    basic_salary = ?2,
                    is_active = ?3,
                    updated_at = {NOW_MS_SQL}
                 WHERE id = ?4;"
            ),
            params![
                date_to_db(profile.employment_date),
                profile.basic_salary,
                bool_to_int(profile.is_active),
                id.to_string(),
            ],
        )?;
        let employee = load_employee(&tx, "e.id", &id.to_string())?
            .ok_or_else(|| RepoError::not_found("employee", id))?;
        tx.commit()?;
        Ok(employee)
    }

    fn set_active(&self, id: EmployeeId, is_active: bool) -> RepoResult<Employee> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE employees SET is_active = ?1, updated_at = {NOW_MS_SQL} WHERE id = ?2;"
            ),
            params![bool_to_int(is_active), id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("employee", id));
        }
        self.get_employee(id)?
            .ok_or_else(|| RepoError::not_found("employee", id))
    }

    fn get_employee(&self, id: EmployeeId) -> RepoResult<Option<Employee>> {
        load_employee(self.conn, "e.id", &id.to_string())
    }

    fn get_employee_for_user(&self, user_id: UserId) -> RepoResult<Option<Employee>> {
        load_employee(self.conn, "e.user_id", &user_id.to_string())
    }

    fn list_employees(&self, active_only: bool) -> RepoResult<Vec<Employee>> {
        let mut stmt = self.conn.prepare(&format!(
            "{EMPLOYEE_SELECT_SQL}
             WHERE (?1 = 0 OR e.is_active = 1)
             ORDER BY u.name COLLATE NOCASE ASC, e.id ASC;"
        ))?;
        let mut rows = stmt.query([bool_to_int(active_only)])?;
        let mut employees = Vec::new();
        while let Some(row) = rows.next()? {
            employees.push(parse_employee_row(row)?);
        }
        Ok(employees)
    }

    fn history(&self, id: EmployeeId) -> RepoResult<EmployeeHistory> {
        let employee = self
            .get_employee(id)?
            .ok_or_else(|| RepoError::not_found("employee", id))?;
        count_history(self.conn, id, employee.user_id)
    }

    fn delete_employee(&self, id: EmployeeId) -> RepoResult<()> {
        let tx = begin_immediate(self.conn)?;
        let employee = load_employee(&tx, "e.id", &id.to_string())?
            .ok_or_else(|| RepoError::not_found("employee", id))?;
        let history = count_history(&tx, id, employee.user_id)?;
        if history.total() > 0 {
            return Err(RepoError::HasDependents {
                entity: "employee",
                id,
                count: history.total(),
            });
        }

        let user_id = employee.user_id.to_string();
        tx.execute(
            "DELETE FROM notifications WHERE recipient_id = ?1;",
            [user_id.as_str()],
        )?;
        tx.execute("DELETE FROM employees WHERE id = ?1;", [id.to_string()])?;
        tx.execute("DELETE FROM users WHERE id = ?1;", [user_id.as_str()])?;
        tx.commit()?;
        Ok(())
    }
}

fn sample_free_code(
    conn: &Connection,
    rng: &mut dyn RngCore,
    max_attempts: u32,
) -> RepoResult<String> {
    for attempt in 1..=max_attempts {
        let code = rng
            .gen_range(EMPLOYEE_CODE_MIN..=EMPLOYEE_CODE_MAX)
            .to_string();
        let taken: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM employees WHERE code = ?1);",
            [code.as_str()],
            |row| row.get(0),
        )?;
        if taken == 0 {
            return Ok(code);
        }
        debug!("event=employee_code_sample module=repo status=collision attempt={attempt}");
    }
    Err(RepoError::EmployeeCodeExhausted {
        attempts: max_attempts,
    })
}

fn count_history(
    conn: &Connection,
    employee_id: EmployeeId,
    user_id: UserId,
) -> RepoResult<EmployeeHistory> {
    let (tasks, actions, salaries) = conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM tasks WHERE assignee_id = ?1),
            (SELECT COUNT(*) FROM task_actions WHERE user_id = ?2),
            (SELECT COUNT(*) FROM salaries WHERE employee_id = ?1);",
        params![employee_id.to_string(), user_id.to_string()],
        |row| Ok((row.get::<_, u32>(0)?, row.get::<_, u32>(1)?, row.get::<_, u32>(2)?)),
    )?;
    Ok(EmployeeHistory {
        tasks,
        actions,
        salaries,
    })
}

fn load_employee(conn: &Connection, key_column: &str, key: &str) -> RepoResult<Option<Employee>> {
    let row = conn
        .query_row(
            &format!("{EMPLOYEE_SELECT_SQL} WHERE {key_column} = ?1;"),
            [key],
            |row| Ok(parse_employee_row(row)),
        )
        .optional()?;
    row.transpose()
}

fn parse_employee_row(row: &Row<'_>) -> RepoResult<Employee> {
    let id: String = row.get("id")?;
    let user_id: String = row.get("user_id")?;
    let employment_date: String = row.get("employment_date")?;
    Ok(Employee {
        id: parse_uuid(&id, "employees.id")?,
        code: row.get("code")?,
        user_id: parse_uuid(&user_id, "employees.user_id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        employment_date: parse_date(&employment_date, "employees.employment_date")?,
        basic_salary: row.get("basic_salary")?,
        is_active: parse_bool(row.get("is_active")?, "employees.is_active")?,
        created_at: row.get("created_at")?,
    })
}
