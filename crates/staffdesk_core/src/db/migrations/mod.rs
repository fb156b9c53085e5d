//! Bundled schema migrations.
//!
//! # Invariants
//! - Steps are listed in ascending version order and never edited once
//!   released; schema changes append a new step.
//! - All pending steps and the `user_version` bump commit together.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};

/// `(version, name, sql)`.
const STEPS: [(u32, &str, &str); 4] = [
    (
        1,
        "users_employees",
        include_str!("0001_users_employees.sql"),
    ),
    (2, "projects_tasks", include_str!("0002_projects_tasks.sql")),
    (3, "salaries", include_str!("0003_salaries.sql")),
    (4, "notifications", include_str!("0004_notifications.sql")),
];

pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |(version, _, _)| *version)
}

/// Brings `conn` up to [`latest_version`].
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the database is ahead of this build.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let latest = latest_version();
    let found = current_user_version(conn)?;
    if found > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: found,
            latest_supported: latest,
        });
    }
    if found == latest {
        return Ok(());
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    // Re-read under the write lock; a concurrent opener may have finished.
    let from = current_user_version(&tx)?;
    for (version, name, sql) in STEPS.iter().filter(|(version, _, _)| *version > from) {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        info!("event=db_migrate module=db status=ok version={version} name={name}");
    }
    tx.commit()?;
    Ok(())
}

pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}
