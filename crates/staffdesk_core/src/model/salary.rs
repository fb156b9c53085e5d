//! Salary domain model.
//!
//! # Invariants
//! - One salary per `(employee_id, month)`.
//! - `payable == base_salary + sum(changes.value)`; derived, never trusted
//!   from input.
//! - A paid salary never changes and is never deleted.

use crate::model::employee::EmployeeId;
use crate::model::validation::ValidationError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

pub type SalaryId = Uuid;

/// Calendar month a salary is paid for, stored as its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PayPeriod(NaiveDate);

impl PayPeriod {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    /// Normalizes any date to the first day of its month.
    pub fn containing(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    pub fn first_day(self) -> NaiveDate {
        self.0
    }

    pub fn year(self) -> i32 {
        self.0.year()
    }

    pub fn month(self) -> u32 {
        self.0.month()
    }

    /// Human label such as `March 2024`.
    pub fn label(self) -> String {
        self.0.format("%B %Y").to_string()
    }
}

impl FromStr for PayPeriod {
    type Err = ValidationError;

    /// Parses `YYYY-MM`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidMonth(value.to_string());
        let trimmed = value.trim();
        let (year_text, month_text) = trimmed.split_once('-').ok_or_else(invalid)?;
        if year_text.len() != 4 || month_text.is_empty() || month_text.len() > 2 {
            return Err(invalid());
        }
        let year: i32 = year_text.parse().map_err(|_| invalid())?;
        let month: u32 = month_text.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl TryFrom<String> for PayPeriod {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PayPeriod> for String {
    fn from(value: PayPeriod) -> Self {
        value.to_string()
    }
}

impl Display for PayPeriod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.0.year(), self.0.month())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SalaryChangeType {
    Bonus,
    Deduction,
}

impl SalaryChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bonus => "BONUS",
            Self::Deduction => "DEDUCTION",
        }
    }
}

/// Signed adjustment embedded in a salary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryChange {
    pub value: f64,
    #[serde(rename = "type")]
    pub kind: SalaryChangeType,
    pub note: String,
}

impl SalaryChange {
    pub fn bonus(value: f64, note: impl Into<String>) -> Self {
        Self {
            value,
            kind: SalaryChangeType::Bonus,
            note: note.into(),
        }
    }

    pub fn deduction(value: f64, note: impl Into<String>) -> Self {
        Self {
            value,
            kind: SalaryChangeType::Deduction,
            note: note.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Salary {
    pub id: SalaryId,
    pub employee_id: EmployeeId,
    pub month: PayPeriod,
    pub base_salary: f64,
    pub changes: Vec<SalaryChange>,
    pub payable: f64,
    pub is_paid: bool,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

/// Caller-supplied salary fields for create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct SalaryDraft {
    pub base_salary: f64,
    pub changes: Vec<SalaryChange>,
    pub is_paid: bool,
}

/// Outcome counts of one monthly generation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub created: u32,
    pub skipped: u32,
}

/// Sum of payable amounts split by paid flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SalaryTotals {
    pub paid: f64,
    pub unpaid: f64,
}

#[cfg(test)]
mod tests {
    use super::{PayPeriod, SalaryChange};

    #[test]
    fn pay_period_parses_year_month() {
        let period: PayPeriod = "2024-03".parse().unwrap();
        assert_eq!(period.year(), 2024);
        assert_eq!(period.month(), 3);
        assert_eq!(period.to_string(), "2024-03");
        assert_eq!(period.label(), "March 2024");

        let short: PayPeriod = "2024-3".parse().unwrap();
        assert_eq!(short, period);
    }

    #[test]
    fn pay_period_rejects_bad_shapes() {
        for value in ["2024", "2024-13", "2024-00", "24-03", "2024-03-01", "abcd-ef", ""] {
            assert!(value.parse::<PayPeriod>().is_err(), "{value} should fail");
        }
    }

    #[test]
    fn salary_change_serializes_type_field() {
        let json = serde_json::to_value(SalaryChange::bonus(500.0, "perf")).unwrap();
        assert_eq!(json["type"], "BONUS");
        assert_eq!(json["note"], "perf");
    }

    #[test]
    fn pay_period_serializes_as_string() {
        let period = PayPeriod::new(2024, 11).unwrap();
        let json = serde_json::to_string(&period).unwrap();
        assert_eq!(json, "\"2024-11\"");
        let back: PayPeriod = serde_json::from_str(&json).unwrap();
        assert_eq!(back, period);
    }
}
