//! Permission system for content and complaint moderation

mod session;

pub use session::Session;

use crate::error::{Error, Result};
use crate::models::Role;

/// Privileged actions gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    // Content
    DeleteOwnContent,
    DeleteAnyContent,
    ViewModeratorPosts,

    // Complaints
    TriageAnyComplaint,
    TriageDepartmentComplaints,

    // Roster
    ManageModerators,
}

impl Action {
    pub fn all() -> &'static [Action] {
        &[
            Action::DeleteOwnContent,
            Action::DeleteAnyContent,
            Action::ViewModeratorPosts,
            Action::TriageAnyComplaint,
            Action::TriageDepartmentComplaints,
            Action::ManageModerators,
        ]
    }
}

/// Permission matrix for role tiers
pub struct PermissionMatrix;

impl PermissionMatrix {
    /// Check if a role has permission to perform an action
    pub fn can_perform(role: Role, action: Action) -> bool {
        match action {
            // Everyone may remove what they wrote
            Action::DeleteOwnContent => true,

            // Content moderation - moderators and admins
            Action::DeleteAnyContent => role.is_moderator_or_admin(),
            Action::ViewModeratorPosts => role.is_moderator_or_admin(),

            // Complaints - admins everywhere, heads within their department
            Action::TriageAnyComplaint => role == Role::Admin,
            Action::TriageDepartmentComplaints => {
                matches!(role, Role::Admin | Role::DepartmentHead)
            }

            // Roster - admin only
            Action::ManageModerators => role == Role::Admin,
        }
    }

    /// Delete is allowed for the author, or for moderators and admins
    pub fn can_delete(actor_id: &str, actor_role: Role, author_id: &str) -> bool {
        actor_id == author_id || Self::can_perform(actor_role, Action::DeleteAnyContent)
    }

    /// Triage is allowed for admins, or for the head of the complaint's department.
    ///
    /// Complaints without a department (anonymous ones) are admin-only.
    pub fn can_triage(
        actor_role: Role,
        actor_department: Option<&str>,
        complaint_department: Option<&str>,
    ) -> bool {
        if Self::can_perform(actor_role, Action::TriageAnyComplaint) {
            return true;
        }
        actor_role == Role::DepartmentHead
            && actor_department.is_some()
            && actor_department == complaint_department
    }
}

/// Fail closed with `Forbidden` unless `allowed`
pub fn ensure(allowed: bool, what: &str) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(Error::Forbidden(what.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_can_delete_own() {
        assert!(PermissionMatrix::can_delete("u1", Role::User, "u1"));
        assert!(!PermissionMatrix::can_delete("u2", Role::User, "u1"));
        assert!(!PermissionMatrix::can_delete("u2", Role::DepartmentHead, "u1"));
    }

    #[test]
    fn test_moderators_can_delete_any() {
        assert!(PermissionMatrix::can_delete("m", Role::Moderator, "u1"));
        assert!(PermissionMatrix::can_delete("a", Role::Admin, "u1"));
    }

    #[test]
    fn test_triage_rules() {
        assert!(PermissionMatrix::can_triage(Role::Admin, None, Some("cs")));
        assert!(PermissionMatrix::can_triage(Role::Admin, None, None));
        assert!(PermissionMatrix::can_triage(Role::DepartmentHead, Some("cs"), Some("cs")));
        assert!(!PermissionMatrix::can_triage(Role::DepartmentHead, Some("cs"), Some("ee")));
        assert!(!PermissionMatrix::can_triage(Role::DepartmentHead, None, None));
        assert!(!PermissionMatrix::can_triage(Role::DepartmentHead, Some("cs"), None));
        assert!(!PermissionMatrix::can_triage(Role::Moderator, Some("cs"), Some("cs")));
    }

    #[test]
    fn test_roster_is_admin_only() {
        assert!(PermissionMatrix::can_perform(Role::Admin, Action::ManageModerators));
        assert!(!PermissionMatrix::can_perform(Role::Moderator, Action::ManageModerators));
    }

    #[test]
    fn test_ensure_fails_closed() {
        assert!(ensure(true, "x").is_ok());
        assert!(matches!(ensure(false, "x"), Err(Error::Forbidden(_))));
    }
}
