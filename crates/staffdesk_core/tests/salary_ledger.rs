mod support;

use staffdesk_core::db::open_db;
use staffdesk_core::db::open_db_in_memory;
use staffdesk_core::repo::salary_repo::SalaryQuery;
use staffdesk_core::{
    PayPeriod, PortalApi, SalaryChange, SalaryDraft, WorkflowError,
};
use support::{as_actor, count, employee_actor, hire, register_admin};

fn march() -> PayPeriod {
    "2024-03".parse().unwrap()
}

fn draft(base_salary: f64, changes: Vec<SalaryChange>, is_paid: bool) -> SalaryDraft {
    SalaryDraft {
        base_salary,
        changes,
        is_paid,
    }
}

#[test]
fn generated_salary_follows_adjustments_until_paid() {
    let conn = open_db_in_memory().unwrap();
    let admin = register_admin(&conn, "Ada", "ada@example.com");
    let employee = hire(&conn, &admin, "Xia", "xia@example.com", 3000.0);
    let workflow = as_actor(&conn, &admin);

    let report = workflow.generate_monthly_salaries(march()).unwrap();
    assert_eq!((report.created, report.skipped), (1, 0));

    let generated = workflow
        .list_salaries(&SalaryQuery {
            employee_id: Some(employee.id),
            month: Some(march()),
        })
        .unwrap();
    assert_eq!(generated.len(), 1);
    let salary = &generated[0];
    assert_eq!(salary.base_salary, 3000.0);
    assert!(salary.changes.is_empty());
    assert_eq!(salary.payable, 3000.0);
    assert!(!salary.is_paid);

    let bonus = vec![SalaryChange::bonus(500.0, "perf")];
    let updated = workflow
        .update_salary(salary.id, &draft(3000.0, bonus.clone(), false))
        .unwrap();
    assert_eq!(updated.payable, 3500.0);

    let paid = workflow
        .update_salary(salary.id, &draft(3000.0, bonus.clone(), true))
        .unwrap();
    assert!(paid.is_paid);
    assert_eq!(paid.payable, 3500.0);

    let mut with_deduction = bonus;
    with_deduction.push(SalaryChange::deduction(-200.0, "late"));
    let result = workflow.update_salary(salary.id, &draft(3000.0, with_deduction, true));
    match result {
        Err(err @ WorkflowError::ImmutableRecord { .. }) => {
            assert_eq!(err.to_string(), "Cannot modify a paid salary record")
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let unchanged = workflow.list_salaries(&SalaryQuery::default()).unwrap();
    assert_eq!(unchanged[0].payable, 3500.0);
    assert_eq!(unchanged[0].changes.len(), 1);
}

#[test]
fn paid_salary_cannot_be_unpaid_resubmitted_or_deleted() {
    let conn = open_db_in_memory().unwrap();
    let admin = register_admin(&conn, "Ada", "ada@example.com");
    let employee = hire(&conn, &admin, "Xia", "xia@example.com", 3000.0);
    let workflow = as_actor(&conn, &admin);
    let salary = workflow
        .create_salary(employee.id, march(), &draft(3000.0, Vec::new(), true))
        .unwrap();

    for attempt in [
        draft(3000.0, Vec::new(), false),
        draft(3000.0, Vec::new(), true),
    ] {
        assert!(matches!(
            workflow.update_salary(salary.id, &attempt),
            Err(WorkflowError::ImmutableRecord {
                operation: "modify",
                ..
            })
        ));
    }

    match workflow.delete_salary(salary.id) {
        Err(err @ WorkflowError::ImmutableRecord { .. }) => {
            assert_eq!(err.to_string(), "Cannot delete a paid salary record")
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM salaries;"), 1);
}

#[test]
fn unpaid_salary_can_be_deleted() {
    let conn = open_db_in_memory().unwrap();
    let admin = register_admin(&conn, "Ada", "ada@example.com");
    let employee = hire(&conn, &admin, "Xia", "xia@example.com", 3000.0);
    let workflow = as_actor(&conn, &admin);
    let salary = workflow
        .create_salary(employee.id, march(), &draft(3000.0, Vec::new(), false))
        .unwrap();

    workflow.delete_salary(salary.id).unwrap();
    assert!(matches!(
        workflow.delete_salary(salary.id),
        Err(WorkflowError::NotFound {
            entity: "salary",
            ..
        })
    ));
}

#[test]
fn create_salary_rejects_duplicate_period_and_bad_adjustments() {
    let conn = open_db_in_memory().unwrap();
    let admin = register_admin(&conn, "Ada", "ada@example.com");
    let employee = hire(&conn, &admin, "Xia", "xia@example.com", 3000.0);
    let workflow = as_actor(&conn, &admin);

    let created = workflow
        .create_salary(
            employee.id,
            march(),
            &draft(
                3000.0,
                vec![
                    SalaryChange::bonus(250.0, "overtime"),
                    SalaryChange::deduction(-100.0, "equipment"),
                ],
                false,
            ),
        )
        .unwrap();
    assert_eq!(created.payable, 3150.0);

    match workflow.create_salary(employee.id, march(), &draft(3100.0, Vec::new(), false)) {
        Err(err @ WorkflowError::DuplicateSalaryPeriod { .. }) => assert_eq!(
            err.to_string(),
            "A salary record already exists for this employee in March 2024"
        ),
        other => panic!("unexpected result: {other:?}"),
    }

    let april: PayPeriod = "2024-04".parse().unwrap();
    for bad in [
        SalaryChange::bonus(-50.0, "negative bonus"),
        SalaryChange::deduction(50.0, "positive deduction"),
        SalaryChange::bonus(0.0, "zero"),
    ] {
        assert!(matches!(
            workflow.create_salary(employee.id, april, &draft(3000.0, vec![bad], false)),
            Err(WorkflowError::InvalidAdjustment(_))
        ));
    }
    assert!(matches!(
        workflow.create_salary(employee.id, april, &draft(0.0, Vec::new(), false)),
        Err(WorkflowError::Validation(_))
    ));
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM salaries;"), 1);
}

#[test]
fn payable_is_recomputed_on_every_write() {
    let conn = open_db_in_memory().unwrap();
    let admin = register_admin(&conn, "Ada", "ada@example.com");
    let employee = hire(&conn, &admin, "Xia", "xia@example.com", 3000.0);
    let workflow = as_actor(&conn, &admin);
    let salary = workflow
        .create_salary(employee.id, march(), &draft(3000.0, Vec::new(), false))
        .unwrap();

    let updated = workflow
        .update_salary(
            salary.id,
            &draft(
                3200.0,
                vec![
                    SalaryChange::bonus(100.5, "referral"),
                    SalaryChange::deduction(-50.25, "parking"),
                ],
                false,
            ),
        )
        .unwrap();
    let sum: f64 = updated.changes.iter().map(|change| change.value).sum();
    assert_eq!(updated.payable, updated.base_salary + sum);
    assert_eq!(updated.payable, 3250.25);
}

#[test]
fn monthly_generation_is_idempotent_and_skips_inactive() {
    let conn = open_db_in_memory().unwrap();
    let admin = register_admin(&conn, "Ada", "ada@example.com");
    let xia = hire(&conn, &admin, "Xia", "xia@example.com", 3000.0);
    let yuri = hire(&conn, &admin, "Yuri", "yuri@example.com", 2800.0);
    let zoe = hire(&conn, &admin, "Zoe", "zoe@example.com", 4100.0);
    let workflow = as_actor(&conn, &admin);
    workflow.set_employee_active(zoe.id, false).unwrap();
    workflow
        .create_salary(
            yuri.id,
            march(),
            &draft(2900.0, vec![SalaryChange::bonus(10.0, "x")], false),
        )
        .unwrap();

    let first = workflow.generate_monthly_salaries(march()).unwrap();
    assert_eq!((first.created, first.skipped), (1, 1));
    let second = workflow.generate_monthly_salaries(march()).unwrap();
    assert_eq!((second.created, second.skipped), (0, 2));

    let all = workflow.list_salaries(&SalaryQuery::default()).unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().any(|salary| salary.employee_id == xia.id));
    assert!(all.iter().all(|salary| salary.employee_id != zoe.id));
    let yuri_salary = all
        .iter()
        .find(|salary| salary.employee_id == yuri.id)
        .unwrap();
    assert_eq!(yuri_salary.payable, 2910.0);
}

#[test]
fn concurrent_generation_converges_to_one_record_per_employee() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("payroll.db");
    let setup = open_db(&path).unwrap();
    let admin = register_admin(&setup, "Ada", "ada@example.com");
    for index in 0..5 {
        hire(
            &setup,
            &admin,
            &format!("Worker {index}"),
            &format!("worker{index}@example.com"),
            2000.0 + f64::from(index),
        );
    }
    drop(setup);

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = path.clone();
            let admin = admin.clone();
            std::thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                as_actor(&conn, &admin)
                    .generate_monthly_salaries("2024-05".parse().unwrap())
                    .unwrap()
            })
        })
        .collect();
    let reports: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let created: u32 = reports.iter().map(|report| report.created).sum();
    let skipped: u32 = reports.iter().map(|report| report.skipped).sum();
    assert_eq!(created, 5);
    assert_eq!(skipped, 5);

    let conn = open_db(&path).unwrap();
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM salaries;"), 5);
}

#[test]
fn employees_see_only_their_own_salaries() {
    let conn = open_db_in_memory().unwrap();
    let admin = register_admin(&conn, "Ada", "ada@example.com");
    let xia = hire(&conn, &admin, "Xia", "xia@example.com", 3000.0);
    hire(&conn, &admin, "Yuri", "yuri@example.com", 2800.0);
    let workflow = as_actor(&conn, &admin);
    workflow.generate_monthly_salaries(march()).unwrap();
    let paid = workflow
        .list_salaries(&SalaryQuery {
            employee_id: Some(xia.id),
            month: None,
        })
        .unwrap()
        .remove(0);
    workflow
        .update_salary(paid.id, &draft(3000.0, Vec::new(), true))
        .unwrap();

    let as_xia = as_actor(&conn, &employee_actor(&xia));
    let mine = as_xia.list_my_salaries(None).unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].employee_id, xia.id);
    assert!(matches!(
        as_xia.list_salaries(&SalaryQuery::default()),
        Err(WorkflowError::PermissionDenied(_))
    ));

    let totals = workflow.salary_totals().unwrap();
    assert_eq!(totals.paid, 3000.0);
    assert_eq!(totals.unpaid, 2800.0);
}

#[test]
fn api_reports_generation_counts_and_month_errors() {
    let conn = open_db_in_memory().unwrap();
    let admin = register_admin(&conn, "Ada", "ada@example.com");
    let api = PortalApi::new(as_actor(&conn, &admin));

    let empty = api.generate_monthly_salaries("2024-03");
    assert!(!empty.success);
    assert_eq!(empty.message, "No active employees found");

    hire(&conn, &admin, "Xia", "xia@example.com", 3000.0);
    let first = api.generate_monthly_salaries("2024-03");
    assert!(first.success);
    assert_eq!(
        first.message,
        "Generated 1 salary records (Skipped 0 existing records)"
    );
    let second = api.generate_monthly_salaries("2024-03");
    assert_eq!(
        second.message,
        "Generated 0 salary records (Skipped 1 existing records)"
    );

    let bad = api.generate_monthly_salaries("March");
    assert!(!bad.success);
    assert!(bad.message.contains("YYYY-MM"));
}
