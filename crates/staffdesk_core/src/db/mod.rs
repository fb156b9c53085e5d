//! Portal storage: SQLite connections and the versioned schema.
//!
//! # Invariants
//! - Repositories only see connections whose `user_version` equals the
//!   newest bundled migration.
//! - Timestamps are written by SQLite as epoch milliseconds.

use rusqlite::ffi;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};
pub use rusqlite::Connection;

pub type DbResult<T> = Result<T, DbError>;

pub const NOW_MS_SQL: &str = "CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)";

/// Which table constraint rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    Unique,
    ForeignKey,
    /// A `RAISE(ABORT, ..)` from one of the schema triggers.
    Trigger,
    Check,
    Other,
}

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was written by a newer build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    pub fn constraint(&self) -> Option<Constraint> {
        let Self::Sqlite(rusqlite::Error::SqliteFailure(failure, _)) = self else {
            return None;
        };
        if failure.code != rusqlite::ErrorCode::ConstraintViolation {
            return None;
        }
        Some(match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                Constraint::Unique
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Constraint::ForeignKey,
            ffi::SQLITE_CONSTRAINT_TRIGGER => Constraint::Trigger,
            ffi::SQLITE_CONSTRAINT_CHECK => Constraint::Check,
            _ => Constraint::Other,
        })
    }

    pub fn is_unique_violation(&self) -> bool {
        self.constraint() == Some(Constraint::Unique)
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "portal schema v{db_version} is newer than this build (v{latest_supported})"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        if let Self::Sqlite(err) = self {
            return Some(err);
        }
        None
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{Constraint, DbError};
    use rusqlite::Connection;

    #[test]
    fn constraint_failures_are_classified() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (k TEXT PRIMARY KEY, n INTEGER CHECK (n > 0));
             INSERT INTO t VALUES ('a', 1);",
        )
        .unwrap();

        let duplicate = DbError::from(
            conn.execute("INSERT INTO t VALUES ('a', 2);", [])
                .unwrap_err(),
        );
        assert!(duplicate.is_unique_violation());

        let negative = DbError::from(
            conn.execute("INSERT INTO t VALUES ('b', -1);", [])
                .unwrap_err(),
        );
        assert_eq!(negative.constraint(), Some(Constraint::Check));

        let syntax = DbError::from(conn.execute("INSERT INTO", []).unwrap_err());
        assert_eq!(syntax.constraint(), None);
    }
}
