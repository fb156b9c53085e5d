//! Salary ledger rules.
//!
//! # Responsibility
//! - Derive payable amounts from base salary and adjustments.
//! - Validate adjustment sign/type agreement and note shape.
//! - Guard paid records against any further mutation.
//!
//! # Invariants
//! - `compute_payable` is pure and is the only source of `payable`.
//! - `BONUS => value > 0`, `DEDUCTION => value < 0`.
//! - A paid salary accepts no update and no delete.

use crate::model::salary::{Salary, SalaryChange, SalaryChangeType};
use crate::model::validation::{bounded_text, ValidationError, SALARY_NOTE_MAX};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Adjustment whose sign disagrees with its type, or whose value is unusable.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidAdjustment {
    /// Position in the submitted change list.
    pub index: usize,
    pub kind: SalaryChangeType,
    pub value: f64,
}

impl Display for InvalidAdjustment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "change #{}: BONUS values must be positive, DEDUCTION values must be negative (got {} {})",
            self.index + 1,
            self.kind.as_str(),
            self.value
        )
    }
}

impl Error for InvalidAdjustment {}

/// Rejection from [`validate_changes`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeRejection {
    Adjustment(InvalidAdjustment),
    Note(ValidationError),
}

/// Paid salary that was about to be modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImmutableRecord;

impl Display for ImmutableRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot modify a paid salary record")
    }
}

impl Error for ImmutableRecord {}

/// `base_salary + sum(change.value)`.
pub fn compute_payable(base_salary: f64, changes: &[SalaryChange]) -> f64 {
    base_salary + changes.iter().map(|change| change.value).sum::<f64>()
}

/// Checks every change and returns them with trimmed notes.
pub fn validate_changes(changes: &[SalaryChange]) -> Result<Vec<SalaryChange>, ChangeRejection> {
    let mut normalized = Vec::with_capacity(changes.len());
    for (index, change) in changes.iter().enumerate() {
        if !sign_matches(change) {
            return Err(ChangeRejection::Adjustment(InvalidAdjustment {
                index,
                kind: change.kind,
                value: change.value,
            }));
        }
        let note = bounded_text("change note", &change.note, 1, SALARY_NOTE_MAX)
            .map_err(ChangeRejection::Note)?;
        normalized.push(SalaryChange {
            value: change.value,
            kind: change.kind,
            note,
        });
    }
    Ok(normalized)
}

/// Fails when `salary` is paid.
pub fn ensure_mutable(salary: &Salary) -> Result<(), ImmutableRecord> {
    if salary.is_paid {
        return Err(ImmutableRecord);
    }
    Ok(())
}

fn sign_matches(change: &SalaryChange) -> bool {
    if !change.value.is_finite() {
        return false;
    }
    match change.kind {
        SalaryChangeType::Bonus => change.value > 0.0,
        SalaryChangeType::Deduction => change.value < 0.0,
    }
}
