//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. The `IntoResponse` impl
//! fixes the error contract: field validation failures are 422 with a
//! field-to-message map, payment failures are 402 with one user-facing
//! sentence, a second submission while one is in flight is 409, and
//! anything internal collapses to a generic body after being captured to
//! Sentry.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::checkout::FieldErrors;
use crate::db::RepositoryError;
use crate::order::OrderError;
use crate::payment::PaymentError;
use crate::services::CatalogError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Catalog lookup failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Payment gateway reported a failure.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Checkout field validation failed.
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(FieldErrors),

    /// A submission for this session is already in flight.
    #[error("Submission already in progress")]
    SubmissionInFlight,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::Payment(payment) => Self::Payment(payment),
            OrderError::Repository(repo) => Self::Database(repo),
            OrderError::EmptyCart => Self::BadRequest(e.to_string()),
            OrderError::PaymentIncomplete { .. } => {
                Self::Payment(PaymentError::Validation(e.to_string()))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Database(_) | Self::Internal(_) | Self::Catalog(_) | Self::Payment(PaymentError::Api(_))
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        match self {
            Self::Validation(errors) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "errors": errors })))
                    .into_response()
            }
            Self::Payment(e) => (
                StatusCode::PAYMENT_REQUIRED,
                Json(json!({ "error": e.user_message() })),
            )
                .into_response(),
            Self::SubmissionInFlight => (
                StatusCode::CONFLICT,
                Json(json!({ "error": "A submission is already in progress" })),
            )
                .into_response(),
            Self::Database(_) | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response(),
            Self::Catalog(_) => (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "External service error" })),
            )
                .into_response(),
            Self::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
            }
            Self::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": msg }))).into_response()
            }
            Self::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
