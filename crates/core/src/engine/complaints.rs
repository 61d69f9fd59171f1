//! Complaint lifecycle and department-scoped visibility

use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::{info, instrument};

use super::feed::decode_all;
use super::{required, Commons};
use crate::error::{Error, Result};
use crate::models::{
    AnonymousComplaint, ComplaintKind, ComplaintStatus, DepartmentComplaint, NewComplaint,
    StatusChange,
};
use crate::permissions::{ensure, Action, Session};
use crate::storage::{encode, Collection, DocumentStore, Mutation, Query, UpdateOutcome};

impl<S: DocumentStore> Commons<S> {
    /// File a complaint that records nothing about the submitter
    #[instrument(skip(self, new))]
    pub async fn create_anonymous_complaint(&self, new: NewComplaint) -> Result<AnonymousComplaint> {
        self.identity()?;
        let now = Utc::now();
        let complaint = AnonymousComplaint {
            id: String::new(),
            created_at: now,
            title: required(&new.title, "Title")?,
            description: required(&new.description, "Description")?,
            category: required(&new.category, "Category")?,
            severity: new.severity,
            status: ComplaintKind::Anonymous.initial_status(),
            resolved: false,
            admin_notes: None,
            resolved_by: None,
            resolved_at: None,
            updated_at: None,
            location: new.location,
            attachment_url: new.attachment_url,
        };

        let document = self
            .store
            .create(Collection::AnonymousComplaints, encode(&complaint)?)
            .await?;
        info!(complaint_id = %document.id, severity = ?complaint.severity, "Anonymous complaint filed");
        document.decode()
    }

    /// File a complaint routed to a department
    #[instrument(skip(self, new), fields(department = ?new.department))]
    pub async fn create_department_complaint(&self, new: NewComplaint) -> Result<DepartmentComplaint> {
        self.identity()?;
        let department = required(new.department.as_deref().unwrap_or_default(), "Department")?;
        let complaint = DepartmentComplaint {
            id: String::new(),
            created_at: Utc::now(),
            department,
            title: required(&new.title, "Title")?,
            description: required(&new.description, "Description")?,
            category: required(&new.category, "Category")?,
            severity: new.severity,
            status: ComplaintKind::Department.initial_status(),
            resolved: false,
            admin_notes: None,
            resolved_by: None,
            resolved_at: None,
            updated_at: None,
            submitter_name: new.submitter_name,
            submitter_email: new.submitter_email,
            attachment_url: new.attachment_url,
        };

        let document = self
            .store
            .create(Collection::DepartmentComplaints, encode(&complaint)?)
            .await?;
        info!(complaint_id = %document.id, department = %complaint.department, "Department complaint filed");
        document.decode()
    }

    /// All anonymous complaints, newest first. Admins only.
    pub async fn list_anonymous_complaints(&self) -> Result<Vec<AnonymousComplaint>> {
        self.privileged_session(Action::TriageAnyComplaint).await?;
        let documents = self
            .store
            .query(Query::collection(Collection::AnonymousComplaints).newest_first())
            .await?;
        Ok(decode_all(&documents))
    }

    /// Complaints of one department, newest first.
    ///
    /// Admins may read any department, heads only their own.
    pub async fn list_department_complaints_by_department(
        &self,
        department: &str,
    ) -> Result<Vec<DepartmentComplaint>> {
        let session = self
            .privileged_session(Action::TriageDepartmentComplaints)
            .await?;
        ensure(
            session.can_triage(Some(department)),
            "department heads may only see their own department",
        )?;
        self.department_complaints(Some(department)).await
    }

    /// Complaints visible to the viewer: everything for admins, the own
    /// department for heads.
    pub async fn list_department_complaints_for_viewer(&self) -> Result<Vec<DepartmentComplaint>> {
        let session = self
            .privileged_session(Action::TriageDepartmentComplaints)
            .await?;
        if session.can(Action::TriageAnyComplaint) {
            return self.department_complaints(None).await;
        }
        match session.department() {
            Some(department) => self.department_complaints(Some(department)).await,
            None => Err(Error::Forbidden("no department assigned".into())),
        }
    }

    /// Move an anonymous complaint to a new status. Admins only.
    pub async fn update_complaint_status(
        &self,
        complaint_id: &str,
        change: StatusChange,
    ) -> Result<AnonymousComplaint> {
        let session = self.privileged_session(Action::TriageAnyComplaint).await?;
        self.transition(Collection::AnonymousComplaints, complaint_id, change, &session)
            .await
    }

    /// Move a department complaint to a new status.
    ///
    /// Admins, or the head of the complaint's department.
    pub async fn update_department_complaint_status(
        &self,
        complaint_id: &str,
        change: StatusChange,
    ) -> Result<DepartmentComplaint> {
        let session = self
            .privileged_session(Action::TriageDepartmentComplaints)
            .await?;
        let current: DepartmentComplaint = self
            .store
            .get(Collection::DepartmentComplaints, complaint_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("complaint {}", complaint_id)))?
            .decode()?;
        ensure(
            session.can_triage(Some(&current.department)),
            "department heads may only triage their own department",
        )?;
        self.transition(Collection::DepartmentComplaints, complaint_id, change, &session)
            .await
    }

    async fn department_complaints(&self, department: Option<&str>) -> Result<Vec<DepartmentComplaint>> {
        let mut query = Query::collection(Collection::DepartmentComplaints).newest_first();
        if let Some(department) = department {
            query = query.where_eq("department", department);
        }
        let documents = self.store.query(query).await?;
        Ok(decode_all(&documents))
    }

    /// Apply a status change. Any transition is allowed.
    #[instrument(skip(self, change, session), fields(collection = %collection, status = %change.status))]
    async fn transition<T: DeserializeOwned>(
        &self,
        collection: Collection,
        complaint_id: &str,
        change: StatusChange,
        session: &Session,
    ) -> Result<T> {
        let now = serde_json::to_value(Utc::now())?;
        let mut mutation = Mutation::new()
            .set("status", serde_json::to_value(change.status)?)
            .set("updatedAt", now.clone());

        if let Some(notes) = change.admin_notes {
            mutation = mutation.set("adminNotes", notes);
        }

        mutation = if change.status == ComplaintStatus::Resolved {
            mutation
                .set("resolved", true)
                .set("resolvedBy", session.display_name())
                .set("resolvedAt", now)
        } else {
            mutation.set("resolved", false)
        };

        match self.store.update(collection, complaint_id, mutation).await? {
            UpdateOutcome::Applied { document } => {
                info!(complaint_id, by = %session.user_id(), "Complaint status changed");
                document.decode()
            }
            UpdateOutcome::Missing => Err(Error::NotFound(format!("complaint {}", complaint_id))),
            UpdateOutcome::Rejected { failed } => Err(Error::Conflict(format!(
                "unguarded status change rejected by {:?}",
                failed
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::models::{Identity, Role, Severity};

    fn head(store: &std::sync::Arc<crate::storage::SqliteStore>, id: &str, department: &str) -> Client {
        client(
            store,
            Identity::new(id, format!("Head of {department}"), Role::DepartmentHead)
                .with_department(department),
        )
    }

    fn admin(store: &std::sync::Arc<crate::storage::SqliteStore>) -> Client {
        client(store, Identity::new("admin", "Dean", Role::Admin))
    }

    #[tokio::test]
    async fn test_anonymous_complaint_lifecycle() {
        let store = store();
        let student = user(&store, "student");
        let admin = admin(&store);

        let filed = student
            .commons
            .create_anonymous_complaint(NewComplaint::new(
                "Harassment",
                "In the lab",
                "safety",
                Severity::High,
            ))
            .await
            .unwrap();
        assert_eq!(filed.status, ComplaintStatus::Open);
        assert!(!filed.resolved);

        let reviewing = admin
            .commons
            .update_complaint_status(
                &filed.id,
                StatusChange::to(ComplaintStatus::UnderReview).with_notes("Looking into it"),
            )
            .await
            .unwrap();
        assert_eq!(reviewing.status, ComplaintStatus::UnderReview);
        assert_eq!(reviewing.admin_notes.as_deref(), Some("Looking into it"));
        assert!(reviewing.updated_at.is_some());

        let resolved = admin
            .commons
            .update_complaint_status(&filed.id, StatusChange::to(ComplaintStatus::Resolved))
            .await
            .unwrap();
        assert!(resolved.resolved);
        assert_eq!(resolved.resolved_by.as_deref(), Some("Dean"));
        assert!(resolved.resolved_at.is_some());
        assert_eq!(resolved.admin_notes.as_deref(), Some("Looking into it"));

        let reopened = admin
            .commons
            .update_complaint_status(&filed.id, StatusChange::to(ComplaintStatus::Open))
            .await
            .unwrap();
        assert!(!reopened.resolved);
    }

    #[tokio::test]
    async fn test_anonymous_complaints_are_admin_only() {
        let store = store();
        let student = user(&store, "student");
        let head = head(&store, "h1", "cs");
        let filed = student
            .commons
            .create_anonymous_complaint(NewComplaint::new("T", "D", "C", Severity::Low))
            .await
            .unwrap();

        assert!(matches!(
            head.commons.list_anonymous_complaints().await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            head.commons
                .update_complaint_status(&filed.id, StatusChange::to(ComplaintStatus::Closed))
                .await,
            Err(Error::Forbidden(_))
        ));
        assert_eq!(admin(&store).commons.list_anonymous_complaints().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_complaints_require_sign_in_and_fields() {
        let store = store();
        let student = user(&store, "student");
        assert!(matches!(
            student
                .commons
                .create_department_complaint(NewComplaint::new("T", "D", "C", Severity::Low))
                .await,
            Err(Error::ValidationFailed(_))
        ));

        student.user.sign_out();
        assert!(matches!(
            student
                .commons
                .create_anonymous_complaint(NewComplaint::new("T", "D", "C", Severity::Low))
                .await,
            Err(Error::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_department_head_scope() {
        let store = store();
        let student = user(&store, "student");
        let cs_head = head(&store, "h1", "cs");
        let ee_head = head(&store, "h2", "ee");

        let cs = student
            .commons
            .create_department_complaint(
                NewComplaint::new("Grading", "Unfair", "academic", Severity::Medium)
                    .for_department("cs")
                    .with_contact("Sam", "sam@campus.local"),
            )
            .await
            .unwrap();
        assert_eq!(cs.status, ComplaintStatus::Pending);
        assert_eq!(cs.submitter_name.as_deref(), Some("Sam"));
        student
            .commons
            .create_department_complaint(
                NewComplaint::new("Lab", "Broken", "facilities", Severity::Low).for_department("ee"),
            )
            .await
            .unwrap();

        let mine = cs_head.commons.list_department_complaints_for_viewer().await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].department, "cs");
        assert!(matches!(
            cs_head.commons.list_department_complaints_by_department("ee").await,
            Err(Error::Forbidden(_))
        ));

        assert!(matches!(
            ee_head
                .commons
                .update_department_complaint_status(&cs.id, StatusChange::to(ComplaintStatus::Resolved))
                .await,
            Err(Error::Forbidden(_))
        ));

        let resolved = cs_head
            .commons
            .update_department_complaint_status(&cs.id, StatusChange::to(ComplaintStatus::Resolved))
            .await
            .unwrap();
        assert!(resolved.resolved);
        assert_eq!(resolved.resolved_by.as_deref(), Some("Head of cs"));

        let everything = admin(&store)
            .commons
            .list_department_complaints_for_viewer()
            .await
            .unwrap();
        assert_eq!(everything.len(), 2);

        assert!(matches!(
            student.commons.list_department_complaints_for_viewer().await,
            Err(Error::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_complaint() {
        let store = store();
        assert!(matches!(
            admin(&store)
                .commons
                .update_complaint_status("missing", StatusChange::to(ComplaintStatus::Closed))
                .await,
            Err(Error::NotFound(_))
        ));
    }
}
