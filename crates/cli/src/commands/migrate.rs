//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! basket-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `BASKET_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Migrations live in `crates/server/migrations/` and are embedded at build
//! time.

use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    Connect(String),
}

/// Run every pending migration against the server database.
///
/// # Errors
///
/// Returns `MigrationError` if the connection or any migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let store = super::connect()
        .await
        .map_err(|e| MigrationError::Connect(e.to_string()))?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../server/migrations")
        .run(store.pool())
        .await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
