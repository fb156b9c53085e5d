//! Role-aware task transition table.
//!
//! # Invariants
//! - Admins may move between any two statuses, including backward.
//! - Assignees may only take the single forward step.

use crate::model::identity::Role;
use crate::model::task::TaskStatus;

/// Decides whether one status move is permitted.
pub trait TransitionPolicy {
    fn allows(&self, from: TaskStatus, to: TaskStatus) -> bool;
}

/// Unrestricted moves for administrative corrections.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminPolicy;

impl TransitionPolicy for AdminPolicy {
    fn allows(&self, _from: TaskStatus, _to: TaskStatus) -> bool {
        true
    }
}

/// Forward-only, one step at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssigneePolicy;

impl TransitionPolicy for AssigneePolicy {
    fn allows(&self, from: TaskStatus, to: TaskStatus) -> bool {
        from.next() == Some(to)
    }
}

/// Selects the policy for `role`.
pub fn policy_for(role: Role) -> &'static dyn TransitionPolicy {
    match role {
        Role::Admin => &AdminPolicy,
        Role::Employee => &AssigneePolicy,
    }
}

/// Audit description for a status move.
pub fn describe_transition(from: TaskStatus, to: TaskStatus) -> String {
    if to.rank() < from.rank() {
        format!("Status reverted from {from} to {to}")
    } else {
        format!("Status changed from {from} to {to}")
    }
}
