//! Unified error codes for UrbanFix
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Issue errors
//! - 4xxx: User errors
//! - 5xxx: Payment and upstream provider errors
//! - 6xxx: File upload errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values so web and mobile clients
/// can switch on them without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Validation failed
    ValidationFailed = 2,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Required field missing
    RequiredField = 7,
    /// Update payload carried no fields
    EmptyUpdate = 8,

    // ==================== 1xxx: Auth ====================
    /// Caller is not authenticated
    NotAuthenticated = 1001,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Staff or admin role required
    RoleRequired = 2002,
    /// Admin role required
    AdminRequired = 2003,
    /// Account is blocked
    AccountBlocked = 2006,
    /// Reporters cannot upvote their own issue
    SelfUpvote = 2007,

    // ==================== 3xxx: Issue ====================
    /// Issue not found
    IssueNotFound = 3001,
    /// Free-tier issue limit reached
    IssueLimitReached = 3002,
    /// Voter already upvoted this issue
    AlreadyUpvoted = 3003,
    /// Issue id is malformed
    InvalidIssueId = 3004,
    /// Assignee is not a staff member
    AssigneeNotStaff = 3005,

    // ==================== 4xxx: User ====================
    /// User not found
    UserNotFound = 4001,
    /// Password is required
    PasswordRequired = 4002,
    /// Password is too short
    PasswordTooShort = 4003,
    /// Email is missing or malformed
    InvalidEmail = 4004,

    // ==================== 5xxx: Payment / Upstream ====================
    /// Payment could not be recorded
    PaymentFailed = 5001,
    /// Unknown checkout purpose
    InvalidCheckoutPurpose = 5003,
    /// Identity provider call failed
    IdentityProviderError = 5101,
    /// Payment provider call failed
    PaymentProviderError = 5102,

    // ==================== 65xx: File Upload ====================
    /// File too large
    FileTooLarge = 6501,
    /// Unsupported file format
    UnsupportedFileFormat = 6502,
    /// Payload is not a decodable image
    InvalidImage = 6503,
    /// Empty file provided
    EmptyFile = 6505,
    /// File storage failed
    FileStorageFailed = 6509,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::EmptyUpdate => "No data provided to update",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::TokenInvalid => "Authentication token is invalid",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::RoleRequired => "Staff or admin role is required",
            ErrorCode::AdminRequired => "Administrator role is required",
            ErrorCode::AccountBlocked => "Account is blocked",
            ErrorCode::SelfUpvote => "You cannot upvote your own issue",

            // Issue
            ErrorCode::IssueNotFound => "Issue not found",
            ErrorCode::IssueLimitReached => {
                "Free accounts can report at most 3 issues. Upgrade to premium to report more"
            }
            ErrorCode::AlreadyUpvoted => "You have already upvoted this issue",
            ErrorCode::InvalidIssueId => "Invalid issue id",
            ErrorCode::AssigneeNotStaff => "Assignee is not a staff member",

            // User
            ErrorCode::UserNotFound => "User not found",
            ErrorCode::PasswordRequired => "Password is required",
            ErrorCode::PasswordTooShort => "Password must be at least 6 characters",
            ErrorCode::InvalidEmail => "A valid email is required",

            // Payment / Upstream
            ErrorCode::PaymentFailed => "Payment could not be recorded",
            ErrorCode::InvalidCheckoutPurpose => "Unknown checkout purpose",
            ErrorCode::IdentityProviderError => "Identity provider request failed",
            ErrorCode::PaymentProviderError => "Payment provider request failed",

            // File Upload
            ErrorCode::FileTooLarge => "File is too large",
            ErrorCode::UnsupportedFileFormat => "Unsupported file format",
            ErrorCode::InvalidImage => "File is not a valid image",
            ErrorCode::EmptyFile => "Empty file provided",
            ErrorCode::FileStorageFailed => "Failed to store file",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            2 => Ok(ErrorCode::ValidationFailed),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::EmptyUpdate),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2002 => Ok(ErrorCode::RoleRequired),
            2003 => Ok(ErrorCode::AdminRequired),
            2006 => Ok(ErrorCode::AccountBlocked),
            2007 => Ok(ErrorCode::SelfUpvote),

            // Issue
            3001 => Ok(ErrorCode::IssueNotFound),
            3002 => Ok(ErrorCode::IssueLimitReached),
            3003 => Ok(ErrorCode::AlreadyUpvoted),
            3004 => Ok(ErrorCode::InvalidIssueId),
            3005 => Ok(ErrorCode::AssigneeNotStaff),

            // User
            4001 => Ok(ErrorCode::UserNotFound),
            4002 => Ok(ErrorCode::PasswordRequired),
            4003 => Ok(ErrorCode::PasswordTooShort),
            4004 => Ok(ErrorCode::InvalidEmail),

            // Payment / Upstream
            5001 => Ok(ErrorCode::PaymentFailed),
            5003 => Ok(ErrorCode::InvalidCheckoutPurpose),
            5101 => Ok(ErrorCode::IdentityProviderError),
            5102 => Ok(ErrorCode::PaymentProviderError),

            // File Upload
            6501 => Ok(ErrorCode::FileTooLarge),
            6502 => Ok(ErrorCode::UnsupportedFileFormat),
            6503 => Ok(ErrorCode::InvalidImage),
            6505 => Ok(ErrorCode::EmptyFile),
            6509 => Ok(ErrorCode::FileStorageFailed),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
