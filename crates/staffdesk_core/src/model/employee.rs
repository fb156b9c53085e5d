//! Employee domain model.
//!
//! # Invariants
//! - `code` is a unique 6-digit string, assigned once at creation.
//! - Each employee owns exactly one user account (`user_id`).
//! - Employees with task or salary history are deactivated, never deleted.

use crate::model::identity::UserId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type EmployeeId = Uuid;

/// Inclusive bounds for generated employee codes.
pub const EMPLOYEE_CODE_MIN: u32 = 100_000;
pub const EMPLOYEE_CODE_MAX: u32 = 999_999;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    /// Human-readable 6-digit employee code.
    pub code: String,
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub employment_date: NaiveDate,
    pub basic_salary: f64,
    pub is_active: bool,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Validated employee profile fields, shared by create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeProfile {
    pub name: String,
    pub email: String,
    pub employment_date: NaiveDate,
    pub basic_salary: f64,
    pub is_active: bool,
}

/// Returns whether `value` has the shape of a generated employee code.
pub fn is_valid_employee_code(value: &str) -> bool {
    value.len() == 6
        && value
            .parse::<u32>()
            .map(|code| (EMPLOYEE_CODE_MIN..=EMPLOYEE_CODE_MAX).contains(&code))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::is_valid_employee_code;

    #[test]
    fn employee_code_shape() {
        assert!(is_valid_employee_code("100000"));
        assert!(is_valid_employee_code("999999"));
        assert!(!is_valid_employee_code("099999"));
        assert!(!is_valid_employee_code("12345"));
        assert!(!is_valid_employee_code("12a456"));
    }
}
