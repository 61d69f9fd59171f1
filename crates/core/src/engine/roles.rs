//! Role directory and moderator roster

use chrono::Utc;
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::feed::decode_all;
use super::Commons;
use crate::error::{Error, Result};
use crate::models::{ModeratorRecord, Role, UserProfile};
use crate::permissions::Action;
use crate::storage::{encode, Collection, DocumentStore, Mutation, Precondition, Query, UpdateOutcome};

impl<S: DocumentStore> Commons<S> {
    /// Role recorded for a user. Unknown users are plain users.
    pub async fn get_user_role(&self, uid: &str) -> Result<Role> {
        Ok(self
            .load_profile(uid)
            .await?
            .map(|profile| profile.role)
            .unwrap_or_default())
    }

    /// Profile of the signed-in user, created from the identity on first use
    pub async fn ensure_profile(&self) -> Result<UserProfile> {
        let identity = self.identity()?;
        if let Some(profile) = self.load_profile(&identity.id).await? {
            return Ok(profile);
        }
        self.write_profile(UserProfile::from_identity(&identity)).await
    }

    /// Create or replace a profile.
    ///
    /// Users may update their own name and email. Changing a role or
    /// department, or anyone else's profile, takes an admin.
    #[instrument(skip(self, profile), fields(uid = %profile.uid))]
    pub async fn upsert_profile(&self, profile: UserProfile) -> Result<UserProfile> {
        let session = self.session().await?;
        let self_service = profile.uid == session.user_id()
            && profile.role == session.role()
            && profile.department.as_deref() == session.department();
        if !self_service {
            self.privileged_session(Action::ManageModerators).await?;
        }
        self.write_profile(profile).await
    }

    /// Grant the moderator role and log the grant. Admins only.
    ///
    /// Only plain users and existing moderators can be granted. Admins and
    /// department heads already hold a role the grant would overwrite.
    #[instrument(skip(self))]
    pub async fn add_moderator(&self, uid: &str) -> Result<ModeratorRecord> {
        let session = self.privileged_session(Action::ManageModerators).await?;

        let current = self
            .load_profile(uid)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {}", uid)))?
            .role;
        if !matches!(current, Role::User | Role::Moderator) {
            return Err(Error::ValidationFailed(format!(
                "{} already holds the {} role",
                uid, current
            )));
        }

        let mutation = Mutation::new()
            .require(Precondition::Equals {
                field: "role".into(),
                value: serde_json::to_value(current)?,
            })
            .set("role", serde_json::to_value(Role::Moderator)?);
        match self.store.update(Collection::Users, uid, mutation).await? {
            UpdateOutcome::Applied { .. } => {}
            UpdateOutcome::Missing => return Err(Error::NotFound(format!("user {}", uid))),
            UpdateOutcome::Rejected { failed } => {
                return Err(Error::Conflict(format!("role grant rejected by {:?}", failed)))
            }
        }

        if let Some(existing) = self.active_records(uid).await?.into_iter().next() {
            return Ok(existing);
        }

        let now = Utc::now();
        let record = ModeratorRecord {
            id: String::new(),
            created_at: now,
            uid: uid.to_string(),
            added_by: session.user_id().to_string(),
            added_at: now,
            is_active: true,
            removed_by: None,
            removed_at: None,
        };
        let document = self.store.create(Collection::Moderators, encode(&record)?).await?;
        info!(uid, by = %session.user_id(), "Moderator added");
        document.decode()
    }

    /// Revoke the moderator role. Returns how many grants were deactivated.
    ///
    /// The role is reset to `user` only while it is still `moderator`, so
    /// revoking never demotes an admin.
    #[instrument(skip(self))]
    pub async fn remove_moderator(&self, uid: &str) -> Result<usize> {
        let session = self.privileged_session(Action::ManageModerators).await?;
        let now = serde_json::to_value(Utc::now())?;

        let mut deactivated = 0;
        for record in self.active_records(uid).await? {
            let mutation = Mutation::new()
                .require(Precondition::Equals {
                    field: "isActive".into(),
                    value: Value::Bool(true),
                })
                .set("isActive", false)
                .set("removedBy", session.user_id())
                .set("removedAt", now.clone());
            if let UpdateOutcome::Applied { .. } = self
                .store
                .update(Collection::Moderators, &record.id, mutation)
                .await?
            {
                deactivated += 1;
            }
        }

        let demote = Mutation::new()
            .require(Precondition::Equals {
                field: "role".into(),
                value: serde_json::to_value(Role::Moderator)?,
            })
            .set("role", serde_json::to_value(Role::User)?);
        match self.store.update(Collection::Users, uid, demote).await? {
            UpdateOutcome::Applied { .. } => {}
            UpdateOutcome::Rejected { .. } => {
                warn!(uid, "User is not a moderator, role left unchanged");
            }
            UpdateOutcome::Missing => {
                warn!(uid, "No profile to demote");
            }
        }

        info!(uid, deactivated, by = %session.user_id(), "Moderator removed");
        Ok(deactivated)
    }

    /// Active moderator grants, newest first. Admins only.
    pub async fn list_moderators(&self) -> Result<Vec<ModeratorRecord>> {
        self.privileged_session(Action::ManageModerators).await?;
        let documents = self
            .store
            .query(
                Query::collection(Collection::Moderators)
                    .where_eq("isActive", true)
                    .newest_first(),
            )
            .await?;
        Ok(decode_all(&documents))
    }

    async fn active_records(&self, uid: &str) -> Result<Vec<ModeratorRecord>> {
        let documents = self
            .store
            .query(
                Query::collection(Collection::Moderators)
                    .where_eq("uid", uid)
                    .where_eq("isActive", true),
            )
            .await?;
        Ok(decode_all(&documents))
    }

    async fn write_profile(&self, profile: UserProfile) -> Result<UserProfile> {
        let document = self
            .store
            .put(Collection::Users, &profile.uid, encode(&profile)?)
            .await?;
        info!(uid = %profile.uid, role = %profile.role, "Profile saved");
        document.decode()
    }
}
