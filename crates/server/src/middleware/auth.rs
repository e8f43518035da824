//! Authentication extractor.
//!
//! Protected handlers take [`RequireAuth`], which reads an access token from
//! the `token` header or from `Authorization: Bearer <jwt>` and verifies it.
//! The acting user always comes from the token, never from the query string.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::db::Store;
use crate::error::set_sentry_user;
use crate::models::CurrentUser;
use crate::state::AppState;

/// Header carrying a bare access token.
pub const TOKEN_HEADER: &str = "token";

/// Extractor that requires a valid access token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.first_name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Error returned when a protected route is called without a valid token.
#[derive(Debug)]
pub enum AuthRejection {
    /// Neither header was present.
    MissingCredential,
    /// The token did not verify.
    InvalidCredential(String),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let message = match self {
            Self::MissingCredential => "No Authorization Header Provided".to_string(),
            Self::InvalidCredential(reason) => reason,
        };
        (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
    }
}

/// Pull the access token out of the request headers.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let direct = headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if direct.is_some() {
        return direct;
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S: Store> FromRequestParts<AppState<S>> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AuthRejection::MissingCredential)?;

        let user = state
            .auth()
            .authenticate(token)
            .map_err(|e| AuthRejection::InvalidCredential(e.to_string()))?;

        set_sentry_user(&user.id, Some(user.email.as_str()));
        Ok(Self(user))
    }
}
