//! Complaint models (anonymous and department-scoped)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Complaint status.
///
/// Transitions are deliberately unconstrained: a triager may move a complaint
/// from any state to any other, including out of `Resolved` or `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplaintStatus {
    Open,
    Pending,
    #[serde(rename = "Under Review")]
    UnderReview,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
    Closed,
}

impl ComplaintStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            ComplaintStatus::Open => "Open",
            ComplaintStatus::Pending => "Pending",
            ComplaintStatus::UnderReview => "Under Review",
            ComplaintStatus::InProgress => "In Progress",
            ComplaintStatus::Resolved => "Resolved",
            ComplaintStatus::Closed => "Closed",
        }
    }
}

impl std::fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Which complaint collection a complaint lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplaintKind {
    Anonymous,
    Department,
}

impl ComplaintKind {
    pub fn initial_status(&self) -> ComplaintStatus {
        match self {
            ComplaintKind::Anonymous => ComplaintStatus::Open,
            ComplaintKind::Department => ComplaintStatus::Pending,
        }
    }
}

/// Complaint filed without any record of the submitter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymousComplaint {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub severity: Severity,
    pub status: ComplaintStatus,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub resolved_by: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub attachment_url: Option<String>,
}

/// Complaint addressed to one department
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentComplaint {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub department: String,
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub severity: Severity,
    pub status: ComplaintStatus,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub resolved_by: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub submitter_name: Option<String>,
    #[serde(default)]
    pub submitter_email: Option<String>,
    #[serde(default)]
    pub attachment_url: Option<String>,
}

/// Fields a submitter provides for either complaint kind
#[derive(Debug, Clone, Default)]
pub struct NewComplaint {
    pub title: String,
    pub description: String,
    pub category: String,
    pub severity: Severity,
    pub location: Option<String>,
    pub attachment_url: Option<String>,
    /// Department complaints only
    pub department: Option<String>,
    pub submitter_name: Option<String>,
    pub submitter_email: Option<String>,
}

impl NewComplaint {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            category: category.into(),
            severity,
            ..Default::default()
        }
    }

    pub fn for_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_contact(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.submitter_name = Some(name.into());
        self.submitter_email = Some(email.into());
        self
    }
}

/// A triager's status change, optionally replacing the admin notes
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: ComplaintStatus,
    pub admin_notes: Option<String>,
}

impl StatusChange {
    pub fn to(status: ComplaintStatus) -> Self {
        Self {
            status,
            admin_notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.admin_notes = Some(notes.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ComplaintStatus::UnderReview).unwrap(),
            "\"Under Review\""
        );
        assert_eq!(
            serde_json::from_str::<ComplaintStatus>("\"In Progress\"").unwrap(),
            ComplaintStatus::InProgress
        );
    }

    #[test]
    fn test_initial_status_per_kind() {
        assert_eq!(ComplaintKind::Anonymous.initial_status(), ComplaintStatus::Open);
        assert_eq!(ComplaintKind::Department.initial_status(), ComplaintStatus::Pending);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Low < Severity::Medium);
    }
}
