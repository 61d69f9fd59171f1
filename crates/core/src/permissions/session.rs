//! Resolved session capabilities

use std::collections::BTreeSet;

use super::{Action, PermissionMatrix};
use crate::models::{Identity, Role, UserProfile};

/// A signed-in identity with its role resolved into a capability set.
///
/// Built once per identity and reused for ordinary operations. Privileged
/// operations resolve a fresh session so a revoked role stops working
/// immediately.
#[derive(Debug, Clone)]
pub struct Session {
    identity: Identity,
    role: Role,
    department: Option<String>,
    capabilities: BTreeSet<Action>,
}

impl Session {
    /// Resolve from the identity, letting a stored profile override its role
    pub fn resolve(identity: Identity, profile: Option<&UserProfile>) -> Self {
        let (role, department) = match profile {
            Some(p) => (p.role, p.department.clone()),
            None => (identity.role, identity.department.clone()),
        };
        let capabilities = Action::all()
            .iter()
            .copied()
            .filter(|action| PermissionMatrix::can_perform(role, *action))
            .collect();

        Self {
            identity,
            role,
            department,
            capabilities,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.identity.id
    }

    pub fn display_name(&self) -> &str {
        &self.identity.display_name
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn department(&self) -> Option<&str> {
        self.department.as_deref()
    }

    pub fn can(&self, action: Action) -> bool {
        self.capabilities.contains(&action)
    }

    pub fn can_delete(&self, author_id: &str) -> bool {
        PermissionMatrix::can_delete(self.user_id(), self.role, author_id)
    }

    pub fn can_triage(&self, complaint_department: Option<&str>) -> bool {
        PermissionMatrix::can_triage(self.role, self.department(), complaint_department)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_identity_role_used_without_profile() {
        let session = Session::resolve(Identity::new("m1", "Mod", Role::Moderator), None);
        assert_eq!(session.role(), Role::Moderator);
        assert!(session.can(Action::DeleteAnyContent));
        assert!(!session.can(Action::ManageModerators));
    }

    #[test]
    fn test_profile_overrides_identity_role() {
        let identity = Identity::new("m1", "Mod", Role::Moderator);
        let profile = UserProfile {
            uid: "m1".into(),
            display_name: "Mod".into(),
            email: "m1@campus.local".into(),
            role: Role::User,
            department: None,
            created_at: Utc::now(),
        };
        let session = Session::resolve(identity, Some(&profile));
        assert_eq!(session.role(), Role::User);
        assert!(!session.can(Action::DeleteAnyContent));
        assert!(!session.can_delete("someone-else"));
        assert!(session.can_delete("m1"));
    }

    #[test]
    fn test_department_head_scope() {
        let identity =
            Identity::new("h1", "Head", Role::DepartmentHead).with_department("cs");
        let session = Session::resolve(identity, None);
        assert!(session.can_triage(Some("cs")));
        assert!(!session.can_triage(Some("ee")));
        assert!(!session.can_triage(None));
    }
}
