use rusqlite::Connection;
use staffdesk_core::db::migrations::latest_version;
use staffdesk_core::db::{open_db, open_db_in_memory, DbError};
use staffdesk_core::repo::task_repo::SqliteTaskRepository;
use staffdesk_core::RepoError;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "users",
        "employees",
        "projects",
        "tasks",
        "task_actions",
        "salaries",
        "notifications",
    ] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn reopening_a_file_database_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("staffdesk.db");

    let first = open_db(&path).unwrap();
    assert_eq!(schema_version(&first), latest_version());
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second), latest_version());
    assert_table_exists(&second, "salaries");
}

#[test]
fn newer_schema_version_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repositories_reject_unmigrated_connections() {
    let conn = Connection::open_in_memory().unwrap();
    match SqliteTaskRepository::try_new(&conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        }) => {
            assert_eq!(expected_version, latest_version());
            assert_eq!(actual_version, 0);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("unmigrated connection must be rejected"),
    }
}

#[test]
fn storage_refuses_to_touch_paid_salaries_and_task_history() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO users (id, name, email, role) VALUES ('u1', 'Xia', 'xia@example.com', 'EMPLOYEE');
         INSERT INTO employees (id, code, user_id, employment_date, basic_salary)
             VALUES ('e1', '123456', 'u1', '2023-01-09', 3000);
         INSERT INTO salaries (id, employee_id, month, base_salary, payable, is_paid)
             VALUES ('s1', 'e1', '2024-03-01', 3000, 3000, 1);
         INSERT INTO projects (id, name) VALUES ('p1', 'Apollo');
         INSERT INTO tasks (id, project_id, assignee_id, title) VALUES ('t1', 'p1', 'e1', 'Launch');
         INSERT INTO task_actions (id, task_id, user_id, description) VALUES ('a1', 't1', 'u1', 'Task created');",
    )
    .unwrap();

    assert!(conn
        .execute("UPDATE salaries SET payable = 1 WHERE id = 's1';", [])
        .is_err());
    assert!(conn.execute("DELETE FROM salaries WHERE id = 's1';", []).is_err());
    assert!(conn
        .execute("UPDATE task_actions SET description = 'edited' WHERE id = 'a1';", [])
        .is_err());
    assert!(conn
        .execute(
            "INSERT INTO salaries (id, employee_id, month, base_salary, payable)
             VALUES ('s2', 'e1', '2024-03-01', 3000, 3000);",
            [],
        )
        .is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
