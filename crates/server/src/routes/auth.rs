//! Signup, login and token refresh.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::Deserialize;
use tracing::instrument;

use crate::db::Store;
use crate::error::Result;
use crate::services::auth::{Session, Signup};
use crate::state::AppState;

/// Login form.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Refresh form.
#[derive(Debug, Deserialize)]
pub struct RefreshForm {
    pub refresh_token: String,
}

/// Account routes, all public.
pub fn router<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/users/signup", post(signup::<S>))
        .route("/users/login", post(login::<S>))
        .route("/users/refresh", post(refresh::<S>))
}

/// Create an account and return its tokens.
#[instrument(skip(state, form), fields(email = %form.email))]
async fn signup<S: Store>(
    State(state): State<AppState<S>>,
    Json(form): Json<Signup>,
) -> Result<(StatusCode, Json<Session>)> {
    let session = state.auth().signup(&form).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Exchange email and password for tokens.
#[instrument(skip(state, form), fields(email = %form.email))]
async fn login<S: Store>(
    State(state): State<AppState<S>>,
    Json(form): Json<LoginForm>,
) -> Result<Json<Session>> {
    let session = state.auth().login(&form.email, &form.password).await?;
    Ok(Json(session))
}

/// Exchange a refresh token for a new token pair.
#[instrument(skip_all)]
async fn refresh<S: Store>(
    State(state): State<AppState<S>>,
    Json(form): Json<RefreshForm>,
) -> Result<Json<Session>> {
    let session = state.auth().refresh(&form.refresh_token).await?;
    Ok(Json(session))
}
