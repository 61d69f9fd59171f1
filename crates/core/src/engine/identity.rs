//! Identity provider seam

use std::sync::RwLock;

use tracing::info;

use crate::models::Identity;

/// Supplies the signed-in identity, or `None` when signed out
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Option<Identity>;
}

/// In-process holder for the identity handed over by the sign-in flow
#[derive(Debug, Default)]
pub struct CurrentUser {
    identity: RwLock<Option<Identity>>,
}

impl CurrentUser {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: RwLock::new(Some(identity)),
        }
    }

    pub fn sign_in(&self, identity: Identity) {
        info!(user_id = %identity.id, role = %identity.role, "Signed in");
        *self.slot() = Some(identity);
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.slot().take() {
            info!(user_id = %previous.id, "Signed out");
        }
    }

    fn slot(&self) -> std::sync::RwLockWriteGuard<'_, Option<Identity>> {
        match self.identity.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl IdentityProvider for CurrentUser {
    fn current(&self) -> Option<Identity> {
        match self.identity.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_sign_in_and_out() {
        let user = CurrentUser::signed_out();
        assert!(user.current().is_none());

        user.sign_in(Identity::new("u1", "Ana", Role::User));
        assert_eq!(user.current().map(|i| i.id), Some("u1".to_string()));

        user.sign_out();
        assert!(user.current().is_none());
    }
}
