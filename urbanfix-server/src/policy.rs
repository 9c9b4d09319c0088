//! Access policy
//!
//! Pure predicates over record snapshots. The API layer and the services
//! call these before every lifecycle operation; each denial maps to exactly
//! one error code.

use shared::error::{AppError, ErrorCode};
use shared::models::{Issue, Role, User};
use thiserror::Error;

/// Why a policy check failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyDenial {
    #[error("User not found")]
    UnknownUser,
    #[error("Account is blocked")]
    Blocked,
    #[error("Free accounts can report at most {limit} issues. Upgrade to premium to report more")]
    QuotaReached { limit: i64 },
    #[error("A voter email is required")]
    NotAuthenticated,
    #[error("You cannot upvote your own issue")]
    SelfUpvote,
    #[error("You have already upvoted this issue")]
    AlreadyUpvoted,
    #[error("Staff or admin role is required")]
    NotModerator,
    #[error("Administrator role is required")]
    NotAdmin,
    #[error("Only the owner or a moderator can do this")]
    NotOwner,
}

impl PolicyDenial {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownUser => ErrorCode::UserNotFound,
            Self::Blocked => ErrorCode::AccountBlocked,
            Self::QuotaReached { .. } => ErrorCode::IssueLimitReached,
            Self::NotAuthenticated => ErrorCode::NotAuthenticated,
            Self::SelfUpvote => ErrorCode::SelfUpvote,
            Self::AlreadyUpvoted => ErrorCode::AlreadyUpvoted,
            Self::NotModerator => ErrorCode::RoleRequired,
            Self::NotAdmin => ErrorCode::AdminRequired,
            Self::NotOwner => ErrorCode::PermissionDenied,
        }
    }
}

impl From<PolicyDenial> for AppError {
    fn from(denial: PolicyDenial) -> Self {
        AppError::with_message(denial.code(), denial.to_string())
    }
}

/// Reporter exists, is not blocked, and is premium or under the free quota
pub fn can_create_issue(
    reporter: Option<&User>,
    existing_issues: i64,
    free_limit: i64,
) -> Result<(), PolicyDenial> {
    let user = reporter.ok_or(PolicyDenial::UnknownUser)?;
    if user.is_blocked {
        return Err(PolicyDenial::Blocked);
    }
    if !user.is_premium && existing_issues >= free_limit {
        return Err(PolicyDenial::QuotaReached { limit: free_limit });
    }
    Ok(())
}

/// Voter present, not the reporter, not already counted
pub fn can_upvote(issue: &Issue, voter: Option<&str>) -> Result<(), PolicyDenial> {
    let voter = voter
        .filter(|v| !v.is_empty())
        .ok_or(PolicyDenial::NotAuthenticated)?;
    if voter == issue.email {
        return Err(PolicyDenial::SelfUpvote);
    }
    if issue.upvotes.iter().any(|v| v == voter) {
        return Err(PolicyDenial::AlreadyUpvoted);
    }
    Ok(())
}

/// Staff or admin
pub fn can_moderate(user: &User) -> Result<(), PolicyDenial> {
    match user.role {
        Role::Staff | Role::Admin => Ok(()),
        Role::Citizen => Err(PolicyDenial::NotModerator),
    }
}

pub fn require_admin(user: &User) -> Result<(), PolicyDenial> {
    match user.role {
        Role::Admin => Ok(()),
        _ => Err(PolicyDenial::NotAdmin),
    }
}

/// Reporter of the issue, or a moderator
pub fn can_edit_issue(user: &User, issue: &Issue) -> Result<(), PolicyDenial> {
    if user.email == issue.email {
        return Ok(());
    }
    can_moderate(user).map_err(|_| PolicyDenial::NotOwner)
}

/// Acting on records that belong to `email`: the user themself or an admin
pub fn can_act_for(user: &User, email: &str) -> Result<(), PolicyDenial> {
    if user.email == email {
        return Ok(());
    }
    require_admin(user).map_err(|_| PolicyDenial::NotOwner)
}
