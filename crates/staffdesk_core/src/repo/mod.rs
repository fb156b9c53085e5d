//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts, one per aggregate.
//! - Isolate SQLite query details from workflow orchestration.
//!
//! # Invariants
//! - Every multi-statement write runs inside one `IMMEDIATE` transaction.
//! - Check-then-write guards (duplicate period, dependents, paid flag,
//!   expected task status) are evaluated inside the writing transaction.
//! - Repository APIs return semantic errors in addition to DB transport
//!   errors.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::salary::PayPeriod;
use crate::model::task::{TaskId, TaskStatus};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod employee_repo;
pub mod notification_repo;
pub mod project_repo;
pub mod salary_repo;
pub mod task_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by all aggregates.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target row does not exist.
    NotFound { entity: &'static str, id: Uuid },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// Row cannot be removed while dependent rows exist.
    HasDependents {
        entity: &'static str,
        id: Uuid,
        count: u32,
    },
    /// Task status moved since the caller read it.
    StatusConflict {
        task_id: TaskId,
        expected: TaskStatus,
        actual: TaskStatus,
    },
    /// A salary already exists for the employee and month.
    DuplicateSalaryPeriod { employee_id: Uuid, month: PayPeriod },
    /// Target salary is paid and therefore frozen.
    PaidSalary(Uuid),
    /// Another user already owns this e-mail.
    DuplicateEmail(String),
    /// Could not find a free employee code within the sampling budget.
    EmployeeCodeExhausted { attempts: u32 },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::HasDependents { entity, id, count } => {
                write!(f, "{entity} {id} still has {count} dependent record(s)")
            }
            Self::StatusConflict {
                task_id,
                expected,
                actual,
            } => write!(
                f,
                "task {task_id} status is {actual}, expected {expected}"
            ),
            Self::DuplicateSalaryPeriod { employee_id, month } => {
                write!(f, "salary for employee {employee_id} in {month} already exists")
            }
            Self::PaidSalary(id) => write!(f, "salary {id} is paid"),
            Self::DuplicateEmail(email) => write!(f, "email already exists: {email}"),
            Self::EmployeeCodeExhausted { attempts } => {
                write!(f, "no free employee code after {attempts} attempts")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    pub(crate) fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Db(err) if err.is_unique_violation())
    }
}

/// Rejects connections that have not been migrated to this binary's schema.
pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let actual_version = current_user_version(conn)?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

/// Starts a write-locking transaction on a shared connection borrow.
pub(crate) fn begin_immediate(conn: &Connection) -> RepoResult<Transaction<'_>> {
    Ok(Transaction::new_unchecked(
        conn,
        TransactionBehavior::Immediate,
    )?)
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn parse_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn parse_date(value: &str, column: &str) -> RepoResult<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| RepoError::InvalidData(format!("invalid date value `{value}` in {column}")))
}

pub(crate) fn parse_task_status(value: &str, column: &str) -> RepoResult<TaskStatus> {
    TaskStatus::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid task status `{value}` in {column}"))
    })
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn date_to_db(value: chrono::NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}
