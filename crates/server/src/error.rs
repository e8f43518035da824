//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`.
//! Error bodies are JSON: `{"error": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::addresses::AddressServiceError;
use crate::services::auth::AuthError;
use crate::services::cart::{CartError, CartErrorKind};

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Cart or order operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Address operation failed.
    #[error("Address error: {0}")]
    Address(#[from] AddressServiceError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Cart(err) => match err.kind() {
                CartErrorKind::NotFound => StatusCode::NOT_FOUND,
                CartErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
                CartErrorKind::Conflict => StatusCode::CONFLICT,
                CartErrorKind::Timeout | CartErrorKind::Store => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Address(err) => match err {
                AddressServiceError::Invalid(_) | AddressServiceError::AddressLimit => {
                    StatusCode::BAD_REQUEST
                }
                AddressServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                AddressServiceError::Timeout(_) | AddressServiceError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::Token(_) => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists(_) => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::MissingField(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Client-facing message. Internal details are never exposed.
    fn public_message(&self) -> String {
        match self {
            Self::Database(_) => "Internal server error".to_string(),
            Self::Cart(err) => match err.kind() {
                CartErrorKind::Store => "Internal server error".to_string(),
                CartErrorKind::Timeout => "The request timed out".to_string(),
                _ => err.to_string(),
            },
            Self::Address(err) => match err {
                AddressServiceError::Repository(_) => "Internal server error".to_string(),
                AddressServiceError::Timeout(_) => "The request timed out".to_string(),
                other => other.to_string(),
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                // `what` reads like "email already exists"
                AuthError::UserAlreadyExists(what) => format!("An account with this {what}"),
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::MissingField(_) | AuthError::Token(_) => err.to_string(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Authentication error".to_string()
                }
            },
            Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, %status, "Request rejected");
        }

        let body = Json(json!({ "error": self.public_message() }));
        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}
