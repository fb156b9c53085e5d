//! Input-shape validation shared by write paths.
//!
//! # Invariants
//! - Validation runs before any persistence call.
//! - Length limits count Unicode scalar values, not bytes.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

pub const TASK_TITLE_MIN: usize = 2;
pub const TASK_TITLE_MAX: usize = 100;
pub const TASK_DESCRIPTION_MAX: usize = 1000;
pub const PROJECT_NAME_MIN: usize = 2;
pub const PROJECT_NAME_MAX: usize = 100;
pub const PROJECT_DESCRIPTION_MAX: usize = 500;
pub const EMPLOYEE_NAME_MIN: usize = 2;
pub const EMPLOYEE_NAME_MAX: usize = 100;
pub const TASK_NOTE_MAX: usize = 1000;
pub const SALARY_NOTE_MAX: usize = 100;

/// Rejected input shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    TooShort { field: &'static str, min: usize },
    TooLong { field: &'static str, max: usize },
    Blank(&'static str),
    NotPositive(&'static str),
    InvalidEmail(String),
    InvalidMonth(String),
    EmailTaken(String),
    ArchivedProject,
    InactiveAssignee,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooShort { field, min } => {
                write!(f, "{field} must be at least {min} characters")
            }
            Self::TooLong { field, max } => write!(f, "{field} cannot exceed {max} characters"),
            Self::Blank(field) => write!(f, "{field} cannot be empty"),
            Self::NotPositive(field) => write!(f, "{field} must be positive"),
            Self::InvalidEmail(value) => write!(f, "invalid email address: `{value}`"),
            Self::InvalidMonth(value) => {
                write!(f, "invalid month format `{value}`; use YYYY-MM")
            }
            Self::EmailTaken(value) => write!(f, "email already exists: {value}"),
            Self::ArchivedProject => write!(f, "cannot add tasks to an archived project"),
            Self::InactiveAssignee => write!(f, "tasks can only be assigned to active employees"),
        }
    }
}

impl Error for ValidationError {}

/// Trims and enforces `min..=max` character bounds.
pub fn bounded_text(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    let count = trimmed.chars().count();
    if count < min {
        return Err(ValidationError::TooShort { field, min });
    }
    if count > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_string())
}

/// Normalizes an optional free-text field; blank input becomes `None`.
pub fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(Some(trimmed.to_string()))
}

pub fn non_blank(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Blank(field));
    }
    Ok(trimmed.to_string())
}

pub fn positive_amount(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::NotPositive(field));
    }
    Ok(value)
}

/// Lowercases and shape-checks an e-mail address.
pub fn email(value: &str) -> Result<String, ValidationError> {
    let normalized = value.trim().to_lowercase();
    if !EMAIL_RE.is_match(&normalized) {
        return Err(ValidationError::InvalidEmail(value.trim().to_string()));
    }
    Ok(normalized)
}
