//! Salary repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist salary rows with their embedded adjustment list.
//! - Provide atomic compare-and-create per `(employee, month)`.
//!
//! # Invariants
//! - `(employee_id, month)` is unique at the storage level.
//! - Updates and deletes only match unpaid rows; storage triggers reject
//!   anything that slips past that filter.
//! - Read paths recompute `payable` from base + changes.

use crate::db::NOW_MS_SQL;
use crate::ledger::compute_payable;
use crate::model::employee::EmployeeId;
use crate::model::salary::{PayPeriod, Salary, SalaryChange, SalaryId, SalaryTotals};
use crate::repo::{
    begin_immediate, bool_to_int, date_to_db, ensure_connection_ready, parse_bool, parse_date,
    parse_uuid, RepoError, RepoResult,
};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const SALARY_SELECT_SQL: &str = "SELECT
    id,
    employee_id,
    month,
    base_salary,
    changes_json,
    payable,
    is_paid,
    created_at,
    updated_at
FROM salaries";

const PAYABLE_DRIFT_TOLERANCE: f64 = 1e-6;

/// Salary row content before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SalaryWrite<'a> {
    pub base_salary: f64,
    pub changes: &'a [SalaryChange],
    pub payable: f64,
    pub is_paid: bool,
}

/// Filter for salary listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SalaryQuery {
    pub employee_id: Option<EmployeeId>,
    pub month: Option<PayPeriod>,
}

pub trait SalaryRepository {
    /// Inserts a salary; fails with `DuplicateSalaryPeriod` if the
    /// employee already has one for `month`.
    fn insert_salary(
        &self,
        employee_id: EmployeeId,
        month: PayPeriod,
        write: &SalaryWrite<'_>,
    ) -> RepoResult<Salary>;
    /// Inserts an unpaid, unadjusted salary unless one exists for the
    /// period. Returns whether a row was created.
    fn insert_if_absent(
        &self,
        employee_id: EmployeeId,
        month: PayPeriod,
        base_salary: f64,
    ) -> RepoResult<bool>;
    fn get_salary(&self, id: SalaryId) -> RepoResult<Option<Salary>>;
    /// Overwrites an unpaid salary. Fails with `PaidSalary` if it is paid.
    fn update_unpaid(&self, id: SalaryId, write: &SalaryWrite<'_>) -> RepoResult<Salary>;
    /// Deletes an unpaid salary. Fails with `PaidSalary` if it is paid.
    fn delete_unpaid(&self, id: SalaryId) -> RepoResult<()>;
    /// Lists salaries newest month first.
    fn list_salaries(&self, query: &SalaryQuery) -> RepoResult<Vec<Salary>>;
    fn totals(&self) -> RepoResult<SalaryTotals>;
}

/// SQLite-backed salary repository.
pub struct SqliteSalaryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSalaryRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn require(&self, id: SalaryId) -> RepoResult<Salary> {
        self.get_salary(id)?
            .ok_or_else(|| RepoError::not_found("salary", id))
    }

    /// Resolves why a guarded write matched no rows.
    fn explain_unmatched(&self, id: SalaryId) -> RepoError {
        match self.get_salary(id) {
            Ok(Some(salary)) if salary.is_paid => RepoError::PaidSalary(id),
            Ok(_) => RepoError::not_found("salary", id),
            Err(err) => err,
        }
    }
}

impl SalaryRepository for SqliteSalaryRepository<'_> {
    fn insert_salary(
        &self,
        employee_id: EmployeeId,
        month: PayPeriod,
        write: &SalaryWrite<'_>,
    ) -> RepoResult<Salary> {
        let id = Uuid::new_v4();
        let changes_json = encode_changes(write.changes)?;
        let result = self.conn.execute(
            &format!(
                "INSERT INTO salaries (
                    id, employee_id, month, base_salary, changes_json, payable, is_paid,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, {NOW_MS_SQL}, {NOW_MS_SQL});"
            ),
            params![
                id.to_string(),
                employee_id.to_string(),
                date_to_db(month.first_day()),
                write.base_salary,
                changes_json,
                write.payable,
                bool_to_int(write.is_paid),
            ],
        );
        if let Err(err) = result {
            let err = RepoError::from(err);
            return Err(if err.is_unique_violation() {
                RepoError::DuplicateSalaryPeriod { employee_id, month }
            } else {
                err
            });
        }
        self.require(id)
    }

    fn insert_if_absent(
        &self,
        employee_id: EmployeeId,
        month: PayPeriod,
        base_salary: f64,
    ) -> RepoResult<bool> {
        let inserted = self.conn.execute(
            &format!(
                "INSERT INTO salaries (
                    id, employee_id, month, base_salary, changes_json, payable, is_paid,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, '[]', ?4, 0, {NOW_MS_SQL}, {NOW_MS_SQL})
                ON CONFLICT (employee_id, month) DO NOTHING;"
            ),
            params![
                Uuid::new_v4().to_string(),
                employee_id.to_string(),
                date_to_db(month.first_day()),
                base_salary,
            ],
        )?;
        Ok(inserted == 1)
    }

    fn get_salary(&self, id: SalaryId) -> RepoResult<Option<Salary>> {
        let row = self
            .conn
            .query_row(
                &format!("{SALARY_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_salary_row(row)),
            )
            .optional()?;
        row.transpose()
    }

    fn update_unpaid(&self, id: SalaryId, write: &SalaryWrite<'_>) -> RepoResult<Salary> {
        let changes_json = encode_changes(write.changes)?;
        let tx = begin_immediate(self.conn)?;
        let changed = tx.execute(
            &format!(
                "UPDATE salaries
                 SET
                    base_salary = ?1,
                    changes_json = ?2,
                    payable = ?3,
                    is_paid = ?4,
                    updated_at = {NOW_MS_SQL}
                 WHERE id = ?5 AND is_paid = 0;"
            ),
            params![
                write.base_salary,
                changes_json,
                write.payable,
                bool_to_int(write.is_paid),
                id.to_string(),
            ],
        )?;
        if changed == 0 {
            drop(tx);
            return Err(self.explain_unmatched(id));
        }
        tx.commit()?;
        self.require(id)
    }

    fn delete_unpaid(&self, id: SalaryId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM salaries WHERE id = ?1 AND is_paid = 0;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(self.explain_unmatched(id));
        }
        Ok(())
    }

    fn list_salaries(&self, query: &SalaryQuery) -> RepoResult<Vec<Salary>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SALARY_SELECT_SQL}
             WHERE (?1 IS NULL OR employee_id = ?1)
               AND (?2 IS NULL OR month = ?2)
             ORDER BY month DESC, created_at DESC, id ASC;"
        ))?;
        let mut rows = stmt.query(params![
            query.employee_id.map(|id| id.to_string()),
            query.month.map(|month| date_to_db(month.first_day())),
        ])?;
        let mut salaries = Vec::new();
        while let Some(row) = rows.next()? {
            salaries.push(parse_salary_row(row)?);
        }
        Ok(salaries)
    }

    fn totals(&self) -> RepoResult<SalaryTotals> {
        let mut totals = SalaryTotals::default();
        for salary in self.list_salaries(&SalaryQuery::default())? {
            if salary.is_paid {
                totals.paid += salary.payable;
            } else {
                totals.unpaid += salary.payable;
            }
        }
        Ok(totals)
    }
}

fn encode_changes(changes: &[SalaryChange]) -> RepoResult<String> {
    serde_json::to_string(changes)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode salary changes: {err}")))
}

fn parse_salary_row(row: &Row<'_>) -> RepoResult<Salary> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "salaries.id")?;
    let employee_id: String = row.get("employee_id")?;
    let month_text: String = row.get("month")?;
    let changes_json: String = row.get("changes_json")?;
    let changes: Vec<SalaryChange> = serde_json::from_str(&changes_json).map_err(|err| {
        RepoError::InvalidData(format!("invalid salaries.changes_json for {id}: {err}"))
    })?;
    let base_salary: f64 = row.get("base_salary")?;
    let stored_payable: f64 = row.get("payable")?;
    let payable = compute_payable(base_salary, &changes);
    if (stored_payable - payable).abs() > PAYABLE_DRIFT_TOLERANCE {
        warn!(
            "event=salary_payable_drift module=repo status=error salary_id={id} stored={stored_payable} computed={payable}"
        );
    }

    Ok(Salary {
        id,
        employee_id: parse_uuid(&employee_id, "salaries.employee_id")?,
        month: PayPeriod::containing(parse_date(&month_text, "salaries.month")?),
        base_salary,
        changes,
        payable,
        is_paid: parse_bool(row.get("is_paid")?, "salaries.is_paid")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
