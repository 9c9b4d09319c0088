//! Issue lifecycle

use serde::Serialize;
use shared::PaginatedResponse;
use shared::error::{AppError, ErrorCode};
use shared::models::{
    Issue, IssueCreate, IssueListQuery, IssuePatch, Role, User,
};
use shared::util::{normalize_email, now_millis};
use sqlx::SqlitePool;

use crate::db::issues::{self as store, NewEntry, NewIssue, UpvoteOutcome};
use crate::db::users;
use crate::error::ServiceResult;
use crate::policy::{self, PolicyDenial};

/// Page size when only `page` is given
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// `GET /issues` result: the full set, or one page when pagination was requested
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum IssueListing {
    All(Vec<Issue>),
    Page(PaginatedResponse<Issue>),
}

#[derive(Clone)]
pub struct IssueService {
    pool: SqlitePool,
    free_issue_limit: i64,
}

/// Canonical form of a path id; anything but a UUID is rejected before the store
fn parse_id(id: &str) -> Result<String, AppError> {
    uuid::Uuid::parse_str(id)
        .map(|u| u.to_string())
        .map_err(|_| AppError::new(ErrorCode::InvalidIssueId).with_detail("id", id))
}

fn issue_not_found(id: &str) -> AppError {
    AppError::new(ErrorCode::IssueNotFound).with_detail("id", id)
}

fn required(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::with_message(
            ErrorCode::RequiredField,
            format!("{field} is required"),
        )
        .with_detail("field", field));
    }
    Ok(())
}

impl IssueService {
    pub fn new(pool: SqlitePool, free_issue_limit: i64) -> Self {
        Self {
            pool,
            free_issue_limit,
        }
    }

    /// File a new issue for `input.email`
    pub async fn create(&self, input: IssueCreate) -> ServiceResult<Issue> {
        required(&input.title, "title")?;
        required(&input.category, "category")?;
        required(&input.location, "location")?;
        let reporter_email = normalize_email(&input.email);
        if reporter_email.is_empty() {
            return Err(AppError::new(ErrorCode::InvalidEmail)
                .with_detail("field", "email")
                .into());
        }

        let reporter = users::find_by_email(&self.pool, &reporter_email).await?;
        let existing = store::count_by_reporter(&self.pool, &reporter_email).await?;
        if let Err(denial) =
            policy::can_create_issue(reporter.as_ref(), existing, self.free_issue_limit)
        {
            tracing::warn!(reporter = %reporter_email, reason = %denial, "Issue creation denied");
            return Err(denial.into());
        }

        let id = uuid::Uuid::new_v4().to_string();
        let new_issue = NewIssue {
            id: &id,
            title: input.title.trim(),
            description: &input.description,
            category: input.category.trim(),
            location: input.location.trim(),
            photo: input.photo.as_deref(),
            email: &reporter_email,
            priority: input.priority.unwrap_or_default(),
            now: now_millis(),
        };

        // The guard re-checks block/quota inside the insert; losing a race lands here
        if !store::insert_within_quota(&self.pool, &new_issue, self.free_issue_limit).await? {
            tracing::warn!(reporter = %reporter_email, "Issue insert rejected by quota guard");
            return Err(PolicyDenial::QuotaReached {
                limit: self.free_issue_limit,
            }
            .into());
        }

        tracing::info!(issue_id = %id, reporter = %reporter_email, "Issue created");
        self.get(&id).await
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Issue> {
        let id = parse_id(id)?;
        store::find_by_id(&self.pool, &id)
            .await?
            .ok_or_else(|| issue_not_found(&id).into())
    }

    /// Apply the supplied fields; a timeline entry is appended, never replacing prior ones
    pub async fn update(&self, id: &str, patch: IssuePatch) -> ServiceResult<Issue> {
        let id = parse_id(id)?;
        if patch.is_empty() {
            return Err(AppError::new(ErrorCode::EmptyUpdate).into());
        }
        if let Some(entry) = &patch.timeline_entry {
            required(&entry.action, "timelineEntry.action")?;
        }

        if !store::update_fields(&self.pool, &id, &patch, now_millis()).await? {
            return Err(issue_not_found(&id).into());
        }

        tracing::info!(issue_id = %id, status = ?patch.status, "Issue updated");
        self.get(&id).await
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        let id = parse_id(id)?;
        if !store::delete(&self.pool, &id).await? {
            return Err(issue_not_found(&id).into());
        }
        Ok(())
    }

    /// Assign to a staff member; the assignee must hold the staff role
    pub async fn assign(&self, id: &str, staff_email: &str, actor: Option<&str>) -> ServiceResult<Issue> {
        let id = parse_id(id)?;
        let staff_email = normalize_email(staff_email);
        if staff_email.is_empty() {
            return Err(AppError::new(ErrorCode::InvalidEmail)
                .with_detail("field", "staffEmail")
                .into());
        }

        let assignee = users::find_by_email(&self.pool, &staff_email).await?;
        if !matches!(assignee, Some(User { role: Role::Staff, .. })) {
            return Err(AppError::new(ErrorCode::AssigneeNotStaff)
                .with_detail("staffEmail", staff_email)
                .into());
        }

        let action = format!("Assigned to {staff_email}");
        let entry = NewEntry {
            action: &action,
            actor,
            now: now_millis(),
        };
        if !store::assign(&self.pool, &id, &staff_email, &entry).await? {
            return Err(issue_not_found(&id).into());
        }

        tracing::info!(issue_id = %id, staff = %staff_email, "Issue assigned");
        self.get(&id).await
    }

    /// Set status=rejected. Re-rejecting appends another entry.
    pub async fn reject(&self, id: &str, actor: Option<&str>) -> ServiceResult<Issue> {
        let id = parse_id(id)?;
        let entry = NewEntry {
            action: "rejected",
            actor,
            now: now_millis(),
        };
        if !store::reject(&self.pool, &id, &entry).await? {
            return Err(issue_not_found(&id).into());
        }
        tracing::info!(issue_id = %id, "Issue rejected");
        self.get(&id).await
    }

    /// Sort first in listings, priority high
    pub async fn boost(&self, id: &str, actor: Option<&str>) -> ServiceResult<Issue> {
        let id = parse_id(id)?;
        let entry = NewEntry {
            action: "boosted",
            actor,
            now: now_millis(),
        };
        if !store::boost(&self.pool, &id, &entry).await? {
            return Err(issue_not_found(&id).into());
        }
        tracing::info!(issue_id = %id, "Issue boosted");
        self.get(&id).await
    }

    pub async fn upvote(&self, id: &str, voter: Option<&str>) -> ServiceResult<Issue> {
        let voter = voter.map(normalize_email).filter(|v| !v.is_empty());
        let Some(voter) = voter else {
            return Err(PolicyDenial::NotAuthenticated.into());
        };
        let issue = self.get(id).await?;

        if let Err(denial) = policy::can_upvote(&issue, Some(&voter)) {
            tracing::warn!(issue_id = %issue.id, voter = %voter, reason = %denial, "Upvote denied");
            return Err(denial.into());
        }

        // Concurrent duplicate votes are caught by the set's primary key
        match store::add_upvote(&self.pool, &issue.id, &voter, now_millis()).await? {
            UpvoteOutcome::Added => {}
            UpvoteOutcome::AlreadyVoted => return Err(PolicyDenial::AlreadyUpvoted.into()),
            UpvoteOutcome::IssueMissing => return Err(issue_not_found(&issue.id).into()),
        }

        tracing::info!(issue_id = %issue.id, voter = %voter, "Issue upvoted");
        self.get(&issue.id).await
    }

    pub async fn list(&self, query: IssueListQuery) -> ServiceResult<IssueListing> {
        let (mut filter, page, limit) = query.into_parts();
        filter.search = filter
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        // Stored emails are normalized
        filter.email = filter.email.as_deref().map(normalize_email);
        filter.assigned_staff = filter.assigned_staff.as_deref().map(normalize_email);

        if page.is_none() && limit.is_none() {
            let (issues, _) = store::list(&self.pool, &filter, None).await?;
            return Ok(IssueListing::All(issues));
        }

        let page = page.unwrap_or(1).max(1);
        let limit = limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let (issues, total) = store::list(&self.pool, &filter, Some((page, limit))).await?;
        Ok(IssueListing::Page(PaginatedResponse::new(issues, total, page, limit)))
    }
}
