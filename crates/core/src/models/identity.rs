//! Identity, role and moderator roster models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role tier held by a user. A user holds exactly one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// Regular member
    #[default]
    User,
    /// Can remove any post or wall issue
    Moderator,
    /// Full control, including moderator grants and all complaints
    Admin,
    /// Triages complaints of a single department
    DepartmentHead,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Moderator => "Moderator",
            Role::Admin => "Admin",
            Role::DepartmentHead => "Department Head",
        }
    }

    /// Moderators and admins may act on content they did not author
    pub fn is_moderator_or_admin(&self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// The signed-in user as handed over by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub department: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, role: Role) -> Self {
        let id = id.into();
        Self {
            email: format!("{id}@campus.local"),
            id,
            display_name: display_name.into(),
            role,
            department: None,
        }
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }
}

/// Stored user profile, keyed by uid in the `users` collection.
///
/// The role recorded here is authoritative once the profile exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            uid: identity.id.clone(),
            display_name: identity.display_name.clone(),
            email: identity.email.clone(),
            role: identity.role,
            department: identity.department.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Append-only audit record of a moderator grant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeratorRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub uid: String,
    pub added_by: String,
    pub added_at: DateTime<Utc>,
    pub is_active: bool,
    #[serde(default)]
    pub removed_by: Option<String>,
    #[serde(default)]
    pub removed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::DepartmentHead).unwrap(), "\"departmentHead\"");
        assert_eq!(serde_json::from_str::<Role>("\"moderator\"").unwrap(), Role::Moderator);
    }

    #[test]
    fn test_moderator_or_admin() {
        assert!(Role::Admin.is_moderator_or_admin());
        assert!(Role::Moderator.is_moderator_or_admin());
        assert!(!Role::DepartmentHead.is_moderator_or_admin());
        assert!(!Role::User.is_moderator_or_admin());
    }
}
