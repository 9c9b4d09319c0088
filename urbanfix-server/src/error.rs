//! Unified service-layer error type
//!
//! `ServiceError` bridges store errors (`sqlx::Error`, `BoxError`) and the
//! API-layer error (`AppError`) so services can propagate both with `?`.

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};

use crate::BoxError;

/// Service-layer error
///
/// - `Db`: database/infrastructure errors (logged, surfaced as InternalError)
/// - `App`: business-rule errors (passed through to the client)
#[derive(Debug)]
pub enum ServiceError {
    /// Database or infrastructure error
    Db(BoxError),
    /// Business-rule error (already an AppError with the correct ErrorCode)
    App(AppError),
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        ServiceError::Db(e.into())
    }
}

impl From<BoxError> for ServiceError {
    fn from(e: BoxError) -> Self {
        ServiceError::Db(e)
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

impl From<crate::policy::PolicyDenial> for ServiceError {
    fn from(e: crate::policy::PolicyDenial) -> Self {
        ServiceError::App(e.into())
    }
}

impl From<crate::integrations::IdentityError> for ServiceError {
    fn from(e: crate::integrations::IdentityError) -> Self {
        ServiceError::App(e.into())
    }
}

impl From<crate::integrations::PaymentError> for ServiceError {
    fn from(e: crate::integrations::PaymentError) -> Self {
        ServiceError::App(e.into())
    }
}

impl From<crate::integrations::BlobError> for ServiceError {
    fn from(e: crate::integrations::BlobError) -> Self {
        ServiceError::App(e.into())
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Db(db_err) => {
                tracing::error!(error = %db_err, "Service database error");
                AppError::new(ErrorCode::InternalError)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

impl ServiceError {
    /// Error code carried by a business-rule error
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ServiceError::App(e) => Some(e.code),
            ServiceError::Db(_) => None,
        }
    }
}

/// Convenience type alias for service-layer results
pub type ServiceResult<T> = Result<T, ServiceError>;
