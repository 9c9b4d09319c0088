//! Issue Model

use serde::{Deserialize, Serialize};

/// Issue lifecycle status
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "kebab-case"))]
pub enum IssueStatus {
    #[default]
    Pending,
    InProgress,
    Working,
    Resolved,
    Closed,
    Rejected,
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Working => "working",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Rejected => "rejected",
        }
    }
}

/// Issue priority
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
pub enum IssuePriority {
    Low,
    #[default]
    Normal,
    High,
}

impl IssuePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

/// One entry of an issue's audit timeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct TimelineEntry {
    pub action: String,
    /// Email of whoever caused the entry, when known
    pub actor: Option<String>,
    pub timestamp: i64,
}

/// Issue document as returned by the API
///
/// `upvote_count` always equals `upvotes.len()`; the first timeline entry is
/// always `created`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub photo: Option<String>,
    /// Reporter email
    pub email: String,
    pub status: IssueStatus,
    pub priority: IssuePriority,
    pub assigned_staff: Option<String>,
    pub boosted: bool,
    pub upvotes: Vec<String>,
    pub upvote_count: i64,
    pub created_at: i64,
    pub timeline: Vec<TimelineEntry>,
}

/// Create issue payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCreate {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub location: String,
    pub photo: Option<String>,
    /// Reporter email
    #[serde(default)]
    pub email: String,
    pub priority: Option<IssuePriority>,
}

/// Timeline entry supplied by a client; the server stamps the time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntryInput {
    pub action: String,
    pub actor: Option<String>,
}

/// Partial issue update
///
/// Omitted fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub photo: Option<String>,
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
    pub timeline_entry: Option<TimelineEntryInput>,
}

impl IssuePatch {
    /// True when the patch would change nothing
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.location.is_none()
            && self.photo.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.timeline_entry.is_none()
    }
}

/// Assign payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub staff_email: String,
}

/// Upvote payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpvoteRequest {
    pub email: Option<String>,
}

/// Issue list filters (conjunction of equality matches plus an optional
/// case-insensitive search over title, category and location)
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
    pub category: Option<String>,
    pub assigned_staff: Option<String>,
    /// Reporter email
    pub email: Option<String>,
    pub search: Option<String>,
}

/// Query string of `GET /issues`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
    pub category: Option<String>,
    pub email: Option<String>,
    pub assigned_staff: Option<String>,
}

impl IssueListQuery {
    /// Split into the filter and the requested `(page, limit)`
    pub fn into_parts(self) -> (IssueFilter, Option<u32>, Option<u32>) {
        let filter = IssueFilter {
            status: self.status,
            priority: self.priority,
            category: self.category,
            assigned_staff: self.assigned_staff,
            email: self.email,
            search: self.search,
        };
        (filter, self.page, self.limit)
    }
}
