//! Cart and order engine.
//!
//! Four mutations (add, remove, checkout, instant buy) plus a cart listing.
//! Each takes its IDs as strings, validates them before touching the store,
//! and runs under one deadline covering every store call it makes.
//!
//! Prices are copied from the product at the moment of the mutation. A cart
//! line keeps the price it was added at, and checkout charges that price.

mod error;

pub use error::{CartError, CartErrorKind};

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, instrument};

use basket_core::{CartLineItem, OrderRecord, Price, ProductId, UserId};

use crate::db::Store;

/// How the engine guards the product read / user write pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsistencyMode {
    /// Write without a version check. A price change between the product read
    /// and the user write is tolerated.
    #[default]
    Snapshot,
    /// Condition every write on the user's version and retry on conflict.
    Optimistic,
}

impl FromStr for ConsistencyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snapshot" => Ok(Self::Snapshot),
            "optimistic" => Ok(Self::Optimistic),
            other => Err(format!(
                "unknown consistency mode {other:?} (expected snapshot or optimistic)"
            )),
        }
    }
}

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartSettings {
    /// Deadline for one whole operation.
    pub timeout: Duration,
    pub consistency: ConsistencyMode,
    /// Extra attempts after a version conflict in optimistic mode.
    pub max_retries: u32,
}

impl Default for CartSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(100),
            consistency: ConsistencyMode::Snapshot,
            max_retries: 3,
        }
    }
}

/// A user's cart with its total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineItem>,
    /// Sum of the line prices.
    pub total: Price,
}

/// Cart and order operations over an injected store.
#[derive(Debug, Clone)]
pub struct CartService<S> {
    store: S,
    settings: CartSettings,
}

impl<S: Store> CartService<S> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(store: S, settings: CartSettings) -> Self {
        Self { store, settings }
    }

    /// Engine settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &CartSettings {
        &self.settings
    }

    /// Append the product to the end of the user's cart at its current price.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidArgument` for a malformed ID,
    /// `CartError::NotFound` if the product or user does not exist.
    #[instrument(skip(self))]
    pub async fn add_to_cart(
        &self,
        product_id: &str,
        user_id: &str,
    ) -> Result<CartLineItem, CartError> {
        let product_id = ProductId::parse(product_id)?;
        let user_id = UserId::parse(user_id)?;
        let store = &self.store;

        let line = self
            .bounded(self.versioned(user_id, move |version| async move {
                let product = store
                    .find_product(product_id)
                    .await?
                    .ok_or(CartError::NotFound("product"))?;
                let line = CartLineItem::new(product.id, product.price);
                store.append_cart_item(user_id, &line, version).await?;
                Ok(line)
            }))
            .await?;

        debug!(%user_id, %product_id, price = %line.price, "added cart line");
        Ok(line)
    }

    /// Remove every line for the product from the user's cart.
    ///
    /// Returns the number of lines removed, which is zero when the product
    /// was not in the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::EmptyCart` if the cart has no lines,
    /// `CartError::NotFound` if the user does not exist.
    #[instrument(skip(self))]
    pub async fn remove_cart_item(
        &self,
        product_id: &str,
        user_id: &str,
    ) -> Result<u64, CartError> {
        let product_id = ProductId::parse(product_id)?;
        let user_id = UserId::parse(user_id)?;
        let store = &self.store;

        let removed = self
            .bounded(self.versioned(user_id, move |version| async move {
                let outcome = store
                    .pull_cart_items(user_id, product_id, version)
                    .await?;
                if outcome.cart_was_empty {
                    return Err(CartError::EmptyCart);
                }
                Ok(outcome.removed)
            }))
            .await?;

        debug!(%user_id, %product_id, removed, "removed cart lines");
        Ok(removed)
    }

    /// Move every cart line into the order history and empty the cart.
    ///
    /// An empty cart is a successful no-op returning no records.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotFound` if the user does not exist.
    #[instrument(skip(self))]
    pub async fn buy_from_cart(&self, user_id: &str) -> Result<Vec<OrderRecord>, CartError> {
        let user_id = UserId::parse(user_id)?;
        let store = &self.store;

        let records = self
            .bounded(self.versioned(user_id, move |version| async move {
                Ok(store.checkout_cart(user_id, Utc::now(), version).await?)
            }))
            .await?;

        debug!(%user_id, orders = records.len(), "checked out cart");
        Ok(records)
    }

    /// Buy one unit of the product at its current price, bypassing the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotFound` if the product or user does not exist.
    #[instrument(skip(self))]
    pub async fn instant_buy(
        &self,
        product_id: &str,
        user_id: &str,
    ) -> Result<OrderRecord, CartError> {
        let product_id = ProductId::parse(product_id)?;
        let user_id = UserId::parse(user_id)?;
        let store = &self.store;

        let record = self
            .bounded(self.versioned(user_id, move |version| async move {
                let product = store
                    .find_product(product_id)
                    .await?
                    .ok_or(CartError::NotFound("product"))?;
                let record = OrderRecord::new(product.id, product.price, Utc::now());
                store.append_order(user_id, &record, version).await?;
                Ok(record)
            }))
            .await?;

        debug!(%user_id, order_id = %record.order_id, "instant purchase");
        Ok(record)
    }

    /// The user's cart lines in order, with their total.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotFound` if the user does not exist.
    #[instrument(skip(self))]
    pub async fn list_cart(&self, user_id: &str) -> Result<CartView, CartError> {
        let user_id = UserId::parse(user_id)?;

        self.bounded(async {
            let user = self
                .store
                .find_user(user_id)
                .await?
                .ok_or(CartError::NotFound("user"))?;
            let total = user.cart.iter().map(|line| line.price).sum();
            Ok(CartView {
                items: user.cart,
                total,
            })
        })
        .await
    }

    /// Run `fut` under the configured deadline.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, CartError>>,
    ) -> Result<T, CartError> {
        let limit = self.settings.timeout;
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| CartError::Timeout(limit))?
    }

    /// Run a user mutation under the configured consistency mode.
    ///
    /// `op` receives the version its write must be conditioned on (`None` in
    /// snapshot mode). In optimistic mode a `CartError::Conflict` re-reads the
    /// version and runs `op` again, up to `max_retries` extra times.
    async fn versioned<T, F, Fut>(&self, user_id: UserId, mut op: F) -> Result<T, CartError>
    where
        F: FnMut(Option<i64>) -> Fut,
        Fut: Future<Output = Result<T, CartError>>,
    {
        if self.settings.consistency == ConsistencyMode::Snapshot {
            return op(None).await;
        }

        let mut attempt = 0;
        loop {
            let version = self
                .store
                .find_user(user_id)
                .await?
                .ok_or(CartError::NotFound("user"))?
                .version;

            match op(Some(version)).await {
                Err(CartError::Conflict) if attempt < self.settings.max_retries => {
                    attempt += 1;
                    debug!(%user_id, attempt, "version conflict, retrying");
                }
                result => return result,
            }
        }
    }
}
