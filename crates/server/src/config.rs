//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BASKET_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `BASKET_JWT_SECRET` - Token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `BASKET_HOST` - Bind address (default: 127.0.0.1)
//! - `BASKET_PORT` - Listen port (default: 8000)
//! - `BASKET_ACCESS_TOKEN_TTL_HOURS` - Access token lifetime (default: 24)
//! - `BASKET_REFRESH_TOKEN_TTL_HOURS` - Refresh token lifetime (default: 168)
//! - `BASKET_STORE_TIMEOUT_SECS` - Deadline per cart/address operation, at least 1 (default: 100)
//! - `BASKET_CART_CONSISTENCY` - `snapshot` or `optimistic` (default: snapshot)
//! - `BASKET_OPTIMISTIC_RETRIES` - Retries after a version conflict (default: 3)
//! - `BASKET_IDEMPOTENCY_TTL_SECS` - How long idempotency keys are remembered (default: 86400)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::services::cart::{CartSettings, ConsistencyMode};

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Token signing secret
    pub jwt_secret: SecretString,
    /// Access token lifetime
    pub access_token_ttl: TimeDelta,
    /// Refresh token lifetime
    pub refresh_token_ttl: TimeDelta,
    /// Cart engine deadline and consistency settings
    pub cart: CartSettings,
    /// How long idempotency keys are remembered
    pub idempotency_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("BASKET_DATABASE_URL")?;
        let host = get_parsed_env::<IpAddr>("BASKET_HOST", "127.0.0.1")?;
        let port = get_parsed_env::<u16>("BASKET_PORT", "8000")?;

        let jwt_secret = get_validated_secret("BASKET_JWT_SECRET")?;
        validate_jwt_secret(&jwt_secret, "BASKET_JWT_SECRET")?;

        let access_token_ttl = get_hours_env("BASKET_ACCESS_TOKEN_TTL_HOURS", "24")?;
        let refresh_token_ttl = get_hours_env("BASKET_REFRESH_TOKEN_TTL_HOURS", "168")?;

        let cart = CartSettings {
            timeout: get_seconds_env("BASKET_STORE_TIMEOUT_SECS", "100")?,
            consistency: get_parsed_env::<ConsistencyMode>("BASKET_CART_CONSISTENCY", "snapshot")?,
            max_retries: get_parsed_env::<u32>("BASKET_OPTIMISTIC_RETRIES", "3")?,
        };
        let idempotency_ttl = Duration::from_secs(get_parsed_env::<u64>(
            "BASKET_IDEMPOTENCY_TTL_SECS",
            "86400",
        )?);

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            access_token_ttl,
            refresh_token_ttl,
            cart,
            idempotency_ttl,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
pub fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an environment variable (or its default) parsed as `T`.
fn get_parsed_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get a positive number of hours as a `TimeDelta`.
fn get_hours_env(key: &str, default: &str) -> Result<TimeDelta, ConfigError> {
    hours_value(key, &get_env_or_default(key, default))
}

fn hours_value(key: &str, raw: &str) -> Result<TimeDelta, ConfigError> {
    let hours = parse_value::<i64>(key, raw)?;
    TimeDelta::try_hours(hours)
        .filter(|ttl| *ttl > TimeDelta::zero())
        .ok_or_else(|| {
            ConfigError::InvalidEnvVar(key.to_string(), format!("{hours} is not a usable TTL"))
        })
}

/// Get a positive number of seconds as a `Duration`.
fn get_seconds_env(key: &str, default: &str) -> Result<Duration, ConfigError> {
    seconds_value(key, &get_env_or_default(key, default))
}

fn seconds_value(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    let secs = parse_value::<u64>(key, raw)?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be at least 1 second".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_jwt_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
