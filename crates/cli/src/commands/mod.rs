//! CLI subcommands.

pub mod migrate;
pub mod product;

use basket_server::config::get_database_url;
use basket_server::db::{PgStore, create_pool};

/// Environment variable holding the connection string.
pub const DATABASE_URL_VAR: &str = "BASKET_DATABASE_URL";

/// Connect to the database named by `BASKET_DATABASE_URL` (or `DATABASE_URL`).
async fn connect() -> Result<PgStore, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let database_url = get_database_url(DATABASE_URL_VAR)?;
    tracing::info!("Connecting to database...");
    let pool = create_pool(&database_url).await?;
    Ok(PgStore::new(pool))
}
