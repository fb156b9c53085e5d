//! Caller identity and role model.
//!
//! Authentication lives outside the core. The core only sees an [`Actor`]
//! resolved by an [`IdentityContext`] for each operation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a portal user account.
pub type UserId = Uuid;

/// Portal role. Drives every permission and transition rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Employee,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Employee => "EMPLOYEE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ADMIN" => Some(Self::Admin),
            "EMPLOYEE" => Some(Self::Employee),
            _ => None,
        }
    }
}

/// The calling user for one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    /// Display name used in notification texts.
    pub name: String,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role, name: impl Into<String>) -> Self {
        Self {
            user_id,
            role,
            name: name.into(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Name shown to notification recipients, falling back to the role label.
    pub fn display_name(&self) -> &str {
        let trimmed = self.name.trim();
        if !trimmed.is_empty() {
            return trimmed;
        }
        match self.role {
            Role::Admin => "Admin",
            Role::Employee => "Employee",
        }
    }
}

/// Persisted user account row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Epoch milliseconds.
    pub created_at: i64,
}

impl User {
    pub fn as_actor(&self) -> Actor {
        Actor::new(self.id, self.role, self.name.clone())
    }
}

/// Resolves the calling user for every core operation.
pub trait IdentityContext {
    fn current_actor(&self) -> Option<Actor>;
}

/// Fixed identity, used by the CLI and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub Option<Actor>);

impl StaticIdentity {
    pub fn signed_in(actor: Actor) -> Self {
        Self(Some(actor))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityContext for StaticIdentity {
    fn current_actor(&self) -> Option<Actor> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::{Actor, Role};
    use uuid::Uuid;

    #[test]
    fn role_roundtrips_through_wire_names() {
        for role in [Role::Admin, Role::Employee] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("admin"), None);
    }

    #[test]
    fn display_name_falls_back_to_role_label() {
        let actor = Actor::new(Uuid::new_v4(), Role::Employee, "  ");
        assert_eq!(actor.display_name(), "Employee");

        let named = Actor::new(Uuid::new_v4(), Role::Admin, "Dana");
        assert_eq!(named.display_name(), "Dana");
    }
}
