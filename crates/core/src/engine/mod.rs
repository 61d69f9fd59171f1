//! Engagement and moderation engine
//!
//! `Commons` is the operation surface used by clients. Each operation reads
//! the current item, checks the rules locally and issues one guarded write.
//! The store re-checks the guards atomically, so concurrent clients cannot
//! break the vote and participation invariants.

mod complaints;
mod debounce;
mod feed;
mod identity;
mod mindwall;
mod moderation;
mod participation;
mod roles;
mod sweeper;
mod votes;

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::config::EngineSettings;
use crate::error::{Error, Result};
use crate::models::{Identity, UserProfile};
use crate::permissions::{Action, Session};
use crate::storage::{Collection, DocumentStore};

pub use debounce::VoteDebouncer;
pub use identity::{CurrentUser, IdentityProvider};
pub use sweeper::{ExpirySweeper, SweepReport};
pub use votes::{Direction, VoteOutcome};

/// Guarded writes are retried this many times before giving up with `Conflict`
pub(crate) const MAX_ATTEMPTS: usize = 3;

/// Client-side engine bound to one identity provider and one store
pub struct Commons<S> {
    store: Arc<S>,
    identity: Arc<dyn IdentityProvider>,
    settings: EngineSettings,
    debouncer: Arc<VoteDebouncer>,
    session: RwLock<Option<Session>>,
}

impl<S: DocumentStore> Commons<S> {
    pub fn new(store: Arc<S>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self::with_settings(store, identity, EngineSettings::default())
    }

    pub fn with_settings(
        store: Arc<S>,
        identity: Arc<dyn IdentityProvider>,
        settings: EngineSettings,
    ) -> Self {
        let debouncer = Arc::new(VoteDebouncer::new(settings.vote_debounce));
        Self {
            store,
            identity,
            settings,
            debouncer,
            session: RwLock::new(None),
        }
    }

    /// Share one debounce window between several engines in the same process
    pub fn with_debouncer(mut self, debouncer: Arc<VoteDebouncer>) -> Self {
        debug!(window_ms = debouncer.window().as_millis() as u64, "Sharing vote debounce window");
        self.debouncer = debouncer;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The signed-in identity, or `NotAuthenticated`
    fn identity(&self) -> Result<Identity> {
        self.identity.current().ok_or(Error::NotAuthenticated)
    }

    /// Session for ordinary operations, resolved once per identity
    async fn session(&self) -> Result<Session> {
        let identity = self.identity()?;
        let cached = self
            .read_session()
            .as_ref()
            .filter(|s| s.user_id() == identity.id)
            .cloned();
        if let Some(session) = cached {
            return Ok(session);
        }
        self.refresh_session(identity).await
    }

    /// Fresh session for a privileged operation.
    ///
    /// The role is re-read from the directory, so a revoked role is refused
    /// even when the cached session still carries it.
    async fn privileged_session(&self, action: Action) -> Result<Session> {
        let session = self.refresh_session(self.identity()?).await?;
        if !session.can(action) {
            debug!(user_id = %session.user_id(), role = %session.role(), ?action, "Privileged action refused");
            return Err(Error::Forbidden(format!(
                "{} may not perform {:?}",
                session.role(),
                action
            )));
        }
        Ok(session)
    }

    async fn refresh_session(&self, identity: Identity) -> Result<Session> {
        let profile = self.load_profile(&identity.id).await?;
        let session = Session::resolve(identity, profile.as_ref());
        *self.write_session() = Some(session.clone());
        Ok(session)
    }

    async fn load_profile(&self, uid: &str) -> Result<Option<UserProfile>> {
        match self.store.get(Collection::Users, uid).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    fn read_session(&self) -> RwLockReadGuard<'_, Option<Session>> {
        match self.session.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Session lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_session(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        match self.session.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Session lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// Trimmed text, or `ValidationFailed` naming the empty field
pub(crate) fn required(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::ValidationFailed(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use super::*;
    use crate::models::Role;
    use crate::storage::SqliteStore;

    /// One simulated client: its own identity and engine over a shared store
    pub struct Client {
        pub user: Arc<CurrentUser>,
        pub commons: Commons<SqliteStore>,
    }

    pub fn store() -> Arc<SqliteStore> {
        Arc::new(SqliteStore::open_in_memory().unwrap())
    }

    pub fn client(store: &Arc<SqliteStore>, identity: Identity) -> Client {
        client_with_debounce(store, identity, Duration::ZERO)
    }

    pub fn client_with_debounce(
        store: &Arc<SqliteStore>,
        identity: Identity,
        debounce: Duration,
    ) -> Client {
        let user = Arc::new(CurrentUser::signed_in(identity));
        let settings = EngineSettings {
            vote_debounce: debounce,
            ..EngineSettings::default()
        };
        let commons = Commons::with_settings(store.clone(), user.clone(), settings);
        Client { user, commons }
    }

    pub fn user(store: &Arc<SqliteStore>, id: &str) -> Client {
        client(store, Identity::new(id, id.to_uppercase(), Role::User))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::models::Role;

    #[tokio::test]
    async fn test_signed_out_is_not_authenticated() {
        let store = store();
        let client = user(&store, "u1");
        client.user.sign_out();
        assert!(matches!(client.commons.session().await, Err(Error::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_session_follows_identity_switch() {
        let store = store();
        let client = user(&store, "u1");
        assert_eq!(client.commons.session().await.unwrap().user_id(), "u1");

        client.user.sign_in(Identity::new("m1", "Mo", Role::Moderator));
        let session = client.commons.session().await.unwrap();
        assert_eq!(session.user_id(), "m1");
        assert_eq!(session.role(), Role::Moderator);
    }

    #[tokio::test]
    async fn test_privileged_session_sees_revocation() {
        let store = store();
        let client = client(&store, Identity::new("m1", "Mo", Role::Moderator));
        let cached = client.commons.session().await.unwrap();
        assert!(cached.can(Action::DeleteAnyContent));

        let profile = UserProfile::from_identity(&Identity::new("m1", "Mo", Role::User));
        store
            .put_document(
                Collection::Users,
                "m1",
                crate::storage::encode(&profile).unwrap(),
            )
            .unwrap();

        let refused = client
            .commons
            .privileged_session(Action::DeleteAnyContent)
            .await;
        assert!(matches!(refused, Err(Error::Forbidden(_))));
    }

    #[test]
    fn test_required_trims() {
        assert_eq!(required("  hi ", "Title").unwrap(), "hi");
        assert!(matches!(required("   ", "Title"), Err(Error::ValidationFailed(m)) if m == "Title is required"));
    }
}
