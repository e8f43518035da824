//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::services::addresses::AddressService;
use crate::services::auth::{AuthService, TokenIssuer};
use crate::services::cart::CartService;
use crate::services::idempotency::IdempotencyCache;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. The store handle is injected, so the same
/// router runs against `PostgreSQL` in production and the in-memory store in
/// tests.
pub struct AppState<S> {
    inner: Arc<AppStateInner<S>>,
}

struct AppStateInner<S> {
    store: S,
    cart: CartService<S>,
    addresses: AddressService<S>,
    auth: AuthService<S>,
    idempotency: IdempotencyCache,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Store> AppState<S> {
    /// Build the services around `store` using `config`.
    #[must_use]
    pub fn new(store: S, config: &ServerConfig) -> Self {
        let tokens = Arc::new(TokenIssuer::new(
            config.jwt_secret.clone(),
            config.access_token_ttl,
            config.refresh_token_ttl,
        ));

        Self {
            inner: Arc::new(AppStateInner {
                cart: CartService::new(store.clone(), config.cart),
                addresses: AddressService::new(store.clone(), config.cart.timeout),
                auth: AuthService::new(store.clone(), tokens),
                idempotency: IdempotencyCache::new(config.idempotency_ttl),
                store,
            }),
        }
    }

    /// Get a reference to the store handle.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Get a reference to the cart engine.
    #[must_use]
    pub fn cart(&self) -> &CartService<S> {
        &self.inner.cart
    }

    /// Get a reference to the address service.
    #[must_use]
    pub fn addresses(&self) -> &AddressService<S> {
        &self.inner.addresses
    }

    /// Get a reference to the authentication service.
    #[must_use]
    pub fn auth(&self) -> &AuthService<S> {
        &self.inner.auth
    }

    /// Get a reference to the idempotency cache.
    #[must_use]
    pub fn idempotency(&self) -> &IdempotencyCache {
        &self.inner.idempotency
    }
}
