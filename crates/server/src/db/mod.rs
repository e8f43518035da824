//! Store layer: contracts and implementations.
//!
//! # Store traits
//!
//! - [`UserStore`] - user documents and the atomic cart/order mutations
//! - [`ProductStore`] - catalog reads and product administration
//! - [`AccountStore`] - account creation and credential lookup
//! - [`AddressStore`] - home/work address slots
//!
//! Each mutating method is one atomic operation against one user. Callers
//! never read a whole user, change it in memory, and write it back.
//!
//! Mutations accept an optional `expected_version`. When present, the store
//! applies the change only if the user's `version` still matches and returns
//! [`RepositoryError::VersionConflict`] otherwise. Every successful mutation
//! bumps the version.
//!
//! # Implementations
//!
//! - [`PgStore`] - `PostgreSQL` (`shop` schema)
//! - [`MemoryStore`] - in-process maps, used by tests
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p basket-cli -- migrate
//! ```

pub mod addresses;
pub mod memory;
pub mod products;
pub mod users;

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use basket_core::{
    Address, AddressSlot, CartLineItem, Email, OrderRecord, Product, ProductId, UserId,
};

use crate::models::{NewAccount, StoredCredentials, User};

pub use memory::MemoryStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A cart line refers to a product that has since been deleted.
    #[error("cart line refers to deleted product {0}")]
    DanglingProduct(ProductId),

    /// The user changed since the caller read it.
    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict {
        /// Version the caller read.
        expected: i64,
        /// Version currently stored.
        actual: i64,
    },
}

/// Result of removing every cart line for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullOutcome {
    /// Number of lines removed.
    pub removed: u64,
    /// The cart had no lines at all when the pull ran.
    pub cart_was_empty: bool,
}

/// User documents and their cart/order mutations.
pub trait UserStore: Send + Sync {
    /// Load a full user document.
    fn find_user(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// Append one line to the end of the cart.
    fn append_cart_item(
        &self,
        id: UserId,
        item: &CartLineItem,
        expected_version: Option<i64>,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove every cart line for `product_id`.
    ///
    /// An empty cart is reported through [`PullOutcome::cart_was_empty`] and
    /// leaves the version unchanged.
    fn pull_cart_items(
        &self,
        id: UserId,
        product_id: ProductId,
        expected_version: Option<i64>,
    ) -> impl Future<Output = Result<PullOutcome, RepositoryError>> + Send;

    /// Move every cart line into the order history (in cart order) and clear
    /// the cart, as one atomic step. Returns the appended records.
    ///
    /// Fails with [`RepositoryError::DanglingProduct`], naming the first such
    /// line, if any line's product no longer exists; nothing is written then.
    fn checkout_cart(
        &self,
        id: UserId,
        ordered_at: DateTime<Utc>,
        expected_version: Option<i64>,
    ) -> impl Future<Output = Result<Vec<OrderRecord>, RepositoryError>> + Send;

    /// Append one record to the order history.
    fn append_order(
        &self,
        id: UserId,
        record: &OrderRecord,
        expected_version: Option<i64>,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Product catalog.
pub trait ProductStore: Send + Sync {
    fn find_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    fn create_product(
        &self,
        product: &Product,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// All products ordered by name.
    fn list_products(&self) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;

    /// Products whose name contains `name`, ignoring case.
    fn search_products(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;
}

/// Account creation and login lookup.
pub trait AccountStore: Send + Sync {
    /// Create a user with an empty cart, history and address book.
    ///
    /// Returns `RepositoryError::Conflict` if the email or phone is taken.
    fn create_account(
        &self,
        account: &NewAccount,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn find_credentials(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<StoredCredentials>, RepositoryError>> + Send;
}

/// Home/work address slots.
pub trait AddressStore: Send + Sync {
    /// Store `address` in the first free slot. Returns `None` when both slots
    /// are occupied.
    fn add_address(
        &self,
        id: UserId,
        address: &Address,
    ) -> impl Future<Output = Result<Option<AddressSlot>, RepositoryError>> + Send;

    /// Overwrite an occupied slot. Returns `RepositoryError::NotFound` if the
    /// slot is empty.
    fn replace_address(
        &self,
        id: UserId,
        slot: AddressSlot,
        address: &Address,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Empty both slots.
    fn clear_addresses(&self, id: UserId)
    -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Everything the server needs from persistence.
pub trait Store: UserStore + ProductStore + AccountStore + AddressStore + Clone + 'static {
    /// Check that the backend is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// `PostgreSQL`-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique violation to `RepositoryError::Conflict`, naming the field
/// from the violated constraint.
fn map_unique_violation(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        let field = match db_err.constraint() {
            Some(c) if c.contains("email") => "email",
            Some(c) if c.contains("phone") => "phone",
            _ => "record",
        };
        return RepositoryError::Conflict(format!("{field} already exists"));
    }
    RepositoryError::Database(e)
}
