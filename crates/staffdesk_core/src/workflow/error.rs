use crate::ledger::{ChangeRejection, InvalidAdjustment};
use crate::model::employee::EmployeeId;
use crate::model::project::ProjectId;
use crate::model::salary::{PayPeriod, SalaryId};
use crate::model::task::TaskStatus;
use crate::model::validation::ValidationError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Failure of one workflow operation.
///
/// Every variant except [`WorkflowError::Repo`] is a user-visible outcome
/// that retrying with the same input cannot fix.
#[derive(Debug)]
pub enum WorkflowError {
    /// No caller identity.
    Unauthorized,
    /// Caller lacks the role or ownership the operation needs.
    PermissionDenied(&'static str),
    /// Status move rejected by the caller's transition policy.
    InvalidTransition { from: TaskStatus, to: TaskStatus },
    InvalidAdjustment(InvalidAdjustment),
    DuplicateSalaryPeriod {
        employee_id: EmployeeId,
        month: PayPeriod,
    },
    /// Paid salary was the target of a modify or delete.
    ImmutableRecord {
        salary_id: SalaryId,
        operation: &'static str,
    },
    NotFound { entity: &'static str, id: Uuid },
    Validation(ValidationError),
    ProjectHasTasks { project_id: ProjectId, count: u32 },
    EmployeeHasHistory { employee_id: EmployeeId, count: u32 },
    /// Storage or consistency failure.
    Repo(RepoError),
}

impl WorkflowError {
    /// Whether the message can be shown to the caller as-is.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Repo(_))
    }

    pub(crate) fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }
}

impl Display for WorkflowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "Unauthorized"),
            Self::PermissionDenied(message) => write!(f, "{message}"),
            Self::InvalidTransition { .. } => {
                write!(f, "You can only move tasks forward one step at a time")
            }
            Self::InvalidAdjustment(_) => write!(
                f,
                "BONUS values must be positive, DEDUCTION values must be negative"
            ),
            Self::DuplicateSalaryPeriod { month, .. } => write!(
                f,
                "A salary record already exists for this employee in {}",
                month.label()
            ),
            Self::ImmutableRecord { operation, .. } => {
                write!(f, "Cannot {operation} a paid salary record")
            }
            Self::NotFound { entity, .. } => write!(f, "{} not found", capitalize(entity)),
            Self::Validation(err) => write!(f, "{}", capitalize(&err.to_string())),
            Self::ProjectHasTasks { .. } => write!(
                f,
                "Cannot delete project with existing tasks. Archive it instead."
            ),
            Self::EmployeeHasHistory { .. } => write!(
                f,
                "Cannot delete employee with task or salary history. Deactivate instead."
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WorkflowError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::InvalidAdjustment(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for WorkflowError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::DuplicateSalaryPeriod { employee_id, month } => {
                Self::DuplicateSalaryPeriod { employee_id, month }
            }
            RepoError::PaidSalary(salary_id) => Self::ImmutableRecord {
                salary_id,
                operation: "modify",
            },
            RepoError::DuplicateEmail(email) => {
                Self::Validation(ValidationError::EmailTaken(email))
            }
            RepoError::HasDependents {
                entity: "project",
                id,
                count,
            } => Self::ProjectHasTasks {
                project_id: id,
                count,
            },
            RepoError::HasDependents {
                entity: "employee",
                id,
                count,
            } => Self::EmployeeHasHistory {
                employee_id: id,
                count,
            },
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for WorkflowError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<ChangeRejection> for WorkflowError {
    fn from(value: ChangeRejection) -> Self {
        match value {
            ChangeRejection::Adjustment(err) => Self::InvalidAdjustment(err),
            ChangeRejection::Note(err) => Self::Validation(err),
        }
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::WorkflowError;
    use crate::model::salary::PayPeriod;
    use crate::model::validation::ValidationError;
    use crate::repo::RepoError;
    use uuid::Uuid;

    #[test]
    fn duplicate_period_message_names_the_month() {
        let err = WorkflowError::DuplicateSalaryPeriod {
            employee_id: Uuid::new_v4(),
            month: PayPeriod::new(2024, 3).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "A salary record already exists for this employee in March 2024"
        );
    }

    #[test]
    fn repo_errors_map_to_domain_variants() {
        let id = Uuid::new_v4();
        assert!(matches!(
            WorkflowError::from(RepoError::PaidSalary(id)),
            WorkflowError::ImmutableRecord { salary_id, .. } if salary_id == id
        ));
        assert!(matches!(
            WorkflowError::from(RepoError::HasDependents {
                entity: "project",
                id,
                count: 2
            }),
            WorkflowError::ProjectHasTasks { count: 2, .. }
        ));
        assert!(matches!(
            WorkflowError::from(RepoError::DuplicateEmail("a@b.co".to_string())),
            WorkflowError::Validation(ValidationError::EmailTaken(_))
        ));
        let infra = WorkflowError::from(RepoError::InvalidData("bad row".to_string()));
        assert!(!infra.is_user_facing());
    }

    #[test]
    fn not_found_message_is_capitalized() {
        let err = WorkflowError::not_found("task", Uuid::new_v4());
        assert_eq!(err.to_string(), "Task not found");
    }
}
