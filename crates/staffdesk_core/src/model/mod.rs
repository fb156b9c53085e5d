//! Domain model for the staffdesk workflow core.
//!
//! # Responsibility
//! - Define canonical data structures used by the workflow engine.
//! - Own input-shape validation shared by every write path.
//!
//! # Invariants
//! - Every persisted entity is identified by a stable UUID.
//! - Enum wire names are `SCREAMING_SNAKE_CASE` and never change.

pub mod employee;
pub mod identity;
pub mod notification;
pub mod project;
pub mod salary;
pub mod task;
pub mod validation;
