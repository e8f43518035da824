//! Authentication service.
//!
//! Password signup and login, issuing HS256 access and refresh tokens.
//! Tokens are stateless: a refresh token is exchanged for a fresh pair as long
//! as it verifies and its account still exists.

mod error;
pub mod token;

pub use error::AuthError;
pub use token::{AccessClaims, TokenError, TokenIssuer, TokenKind, TokenPair};

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use basket_core::{Email, UserId};

use crate::db::{AccountStore, RepositoryError, UserStore};
use crate::models::{CurrentUser, NewAccount};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Signup form.
#[derive(Debug, Clone, Deserialize)]
pub struct Signup {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

/// Result of a successful signup or login.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user_id: UserId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

impl Session {
    fn new(user: CurrentUser, tokens: TokenPair) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            tokens,
        }
    }
}

/// Authentication service.
///
/// Handles account registration, login, and access token verification.
pub struct AuthService<S> {
    store: S,
    tokens: Arc<TokenIssuer>,
}

impl<S: Clone> Clone for AuthService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            tokens: Arc::clone(&self.tokens),
        }
    }
}

impl<S: AccountStore> AuthService<S> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(store: S, tokens: Arc<TokenIssuer>) -> Self {
        Self { store, tokens }
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::MissingField` if a name or the phone is blank.
    /// Returns `AuthError::UserAlreadyExists` if the email or phone is taken.
    #[instrument(skip(self, form), fields(email = %form.email))]
    pub async fn signup(&self, form: &Signup) -> Result<Session, AuthError> {
        let email = Email::parse(&form.email)?;
        validate_password(&form.password)?;

        let first_name = required("first_name", &form.first_name)?;
        let last_name = required("last_name", &form.last_name)?;
        let phone = required("phone", &form.phone)?;

        let password_hash = hash_password(&form.password)?;

        let account = NewAccount {
            id: UserId::generate(),
            email,
            first_name,
            last_name,
            phone,
            password_hash,
        };

        self.store
            .create_account(&account)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(msg) => AuthError::UserAlreadyExists(msg),
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %account.id, "account created");

        let user = CurrentUser {
            id: account.id,
            email: account.email,
            first_name: account.first_name,
            last_name: account.last_name,
        };
        let tokens = self.tokens.issue(&user, Utc::now())?;
        Ok(Session::new(user, tokens))
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        // An unparseable email cannot belong to an account
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let stored = self
            .store
            .find_credentials(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &stored.password_hash)?;

        let user = CurrentUser {
            id: stored.id,
            email: stored.email,
            first_name: stored.first_name,
            last_name: stored.last_name,
        };
        let tokens = self.tokens.issue(&user, Utc::now())?;
        Ok(Session::new(user, tokens))
    }

    /// Verify an access token and return the caller's identity.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if the token is invalid or expired.
    pub fn authenticate(&self, token: &str) -> Result<CurrentUser, AuthError> {
        let claims = self.tokens.verify_access(token, Utc::now())?;
        Ok(claims.current_user()?)
    }
}

impl<S: AccountStore + UserStore> AuthService<S> {
    /// Exchange a refresh token for a new token pair.
    ///
    /// The profile is reloaded, so the new access token carries the
    /// account's current name and email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if the token is invalid, expired or an
    /// access token. Returns `AuthError::InvalidCredentials` if the account
    /// no longer exists.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let now = Utc::now();
        let claims = self.tokens.verify_refresh(refresh_token, now)?;
        let id = UserId::parse(&claims.uid).map_err(|_| TokenError::Malformed)?;

        let stored = self
            .store
            .find_user(id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        tracing::debug!(user_id = %stored.id, "tokens refreshed");

        let user = CurrentUser {
            id: stored.id,
            email: stored.email,
            first_name: stored.first_name,
            last_name: stored.last_name,
        };
        let tokens = self.tokens.issue(&user, now)?;
        Ok(Session::new(user, tokens))
    }
}

fn required(field: &'static str, value: &str) -> Result<String, AuthError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AuthError::MissingField(field));
    }
    Ok(value.to_owned())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
