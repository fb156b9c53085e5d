#![allow(dead_code)]

use chrono::NaiveDate;
use rusqlite::Connection;
use staffdesk_core::model::employee::EmployeeProfile;
use staffdesk_core::{
    Actor, Employee, NewTask, Project, StaticIdentity, Task, Workflow, WorkflowSettings,
};

pub fn as_actor<'c>(conn: &'c Connection, actor: &Actor) -> Workflow<'c, StaticIdentity> {
    Workflow::try_new(
        conn,
        StaticIdentity::signed_in(actor.clone()),
        WorkflowSettings::default(),
    )
    .unwrap()
}

pub fn anonymous(conn: &Connection) -> Workflow<'_, StaticIdentity> {
    Workflow::try_new(conn, StaticIdentity::anonymous(), WorkflowSettings::default()).unwrap()
}

pub fn register_admin(conn: &Connection, name: &str, email: &str) -> Actor {
    anonymous(conn)
        .register_admin(name, email)
        .unwrap()
        .as_actor()
}

pub fn profile(name: &str, email: &str, basic_salary: f64) -> EmployeeProfile {
    EmployeeProfile {
        name: name.to_string(),
        email: email.to_string(),
        employment_date: NaiveDate::from_ymd_opt(2023, 1, 9).unwrap(),
        basic_salary,
        is_active: true,
    }
}

pub fn hire(conn: &Connection, admin: &Actor, name: &str, email: &str, basic_salary: f64) -> Employee {
    as_actor(conn, admin)
        .create_employee(&profile(name, email, basic_salary))
        .unwrap()
}

/// Actor for the employee's own user account.
pub fn employee_actor(employee: &Employee) -> Actor {
    Actor::new(
        employee.user_id,
        staffdesk_core::Role::Employee,
        employee.name.clone(),
    )
}

pub fn project(conn: &Connection, admin: &Actor, name: &str) -> Project {
    as_actor(conn, admin).create_project(name, None).unwrap()
}

pub fn assign(conn: &Connection, admin: &Actor, project: &Project, employee: &Employee, title: &str) -> Task {
    as_actor(conn, admin)
        .create_task(&NewTask {
            project_id: project.id,
            assignee_id: employee.id,
            title: title.to_string(),
            description: Some("details".to_string()),
            due_date: None,
        })
        .unwrap()
}

pub fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}
