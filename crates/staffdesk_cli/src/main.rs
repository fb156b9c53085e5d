//! Operator entry point.
//!
//! # Responsibility
//! - Open the portal database and report core/schema versions.
//! - Run on-demand jobs (monthly payroll generation) as the first admin.
//!
//! Configuration comes from `STAFFDESK_DB`, `STAFFDESK_LOG_DIR` and
//! `STAFFDESK_LOG_LEVEL`.

use log::error;
use staffdesk_core::db::migrations::current_user_version;
use staffdesk_core::db::Connection;
use staffdesk_core::repo::user_repo::{AdminRoster, SqliteUserRepository, UserRepository};
use staffdesk_core::{
    core_version, default_log_level, init_logging, open_db, Actor, PortalApi, StaticIdentity,
    Workflow, WorkflowSettings,
};
use std::process::ExitCode;

const DEFAULT_DB_PATH: &str = "staffdesk.sqlite3";
const USAGE: &str = "usage: staffdesk [version | init-admin NAME EMAIL | generate-salaries YYYY-MM | totals]";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), String> {
    if let Some(log_dir) = env_value("STAFFDESK_LOG_DIR") {
        let level = env_value("STAFFDESK_LOG_LEVEL").unwrap_or_else(|| default_log_level().to_string());
        init_logging(&level, &log_dir).map_err(|err| err.to_string())?;
    }

    let db_path = env_value("STAFFDESK_DB").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
    let conn = open_db(&db_path).map_err(|err| {
        error!("event=cli_open module=cli status=error path={db_path} error={err}");
        format!("cannot open `{db_path}`: {err}")
    })?;

    let command: Vec<&str> = args.iter().map(String::as_str).collect();
    match command.as_slice() {
        [] | ["version"] => {
            let schema = current_user_version(&conn).map_err(|err| err.to_string())?;
            println!("staffdesk_core version={}", core_version());
            println!("schema version={schema}");
            Ok(())
        }
        ["init-admin", name, email] => {
            let workflow = Workflow::try_new(&conn, StaticIdentity::anonymous(), WorkflowSettings::default())
                .map_err(|err| err.to_string())?;
            let admin = workflow
                .register_admin(name, email)
                .map_err(|err| err.to_string())?;
            println!("admin created id={}", admin.id);
            Ok(())
        }
        ["generate-salaries", month] => {
            let api = PortalApi::new(admin_workflow(&conn)?);
            let response = api.generate_monthly_salaries(month);
            println!("{}", response.message);
            if response.success {
                Ok(())
            } else {
                Err("salary generation failed".to_string())
            }
        }
        ["totals"] => {
            let workflow = admin_workflow(&conn)?;
            let totals = workflow.salary_totals().map_err(|err| err.to_string())?;
            println!("paid={:.2} unpaid={:.2}", totals.paid, totals.unpaid);
            Ok(())
        }
        _ => Err(USAGE.to_string()),
    }
}

/// Workflow acting as the first admin in the roster.
fn admin_workflow(conn: &Connection) -> Result<Workflow<'_, StaticIdentity>, String> {
    let users = SqliteUserRepository::try_new(conn).map_err(|err| err.to_string())?;
    let admin_id = users
        .list_admins()
        .map_err(|err| err.to_string())?
        .into_iter()
        .next()
        .ok_or_else(|| "no admin account; run `staffdesk init-admin NAME EMAIL` first".to_string())?;
    let actor: Actor = users
        .get_user(admin_id)
        .map_err(|err| err.to_string())?
        .ok_or_else(|| format!("admin {admin_id} disappeared"))?
        .as_actor();
    Workflow::try_new(
        conn,
        StaticIdentity::signed_in(actor),
        WorkflowSettings::default(),
    )
    .map_err(|err| err.to_string())
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
