//! Idempotency keys for cart mutations.
//!
//! A client may send an `Idempotency-Key` header with a cart mutation. The
//! first successful result is cached for the configured TTL and returned for
//! any repeat, without running the mutation again. Results are scoped by user,
//! operation and target product, so reusing a key against another product runs
//! the mutation. Concurrent duplicates wait on the first attempt. Failures
//! are not cached, so a retry after an error runs the mutation again.

use std::future::Future;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use tracing::debug;

use basket_core::{CartLineItem, OrderRecord, UserId};

use super::cart::CartError;

/// Result of a cart mutation, as replayed to repeat requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CartReceipt {
    Added(CartLineItem),
    Removed {
        removed: u64,
    },
    CheckedOut {
        orders: Vec<OrderRecord>,
    },
    Purchased(OrderRecord),
}

type Key = (UserId, &'static str, Option<String>, String);

/// Cache of completed cart mutations keyed by idempotency key.
#[derive(Clone)]
pub struct IdempotencyCache {
    cache: Cache<Key, CartReceipt>,
}

impl IdempotencyCache {
    /// Upper bound on remembered keys.
    const MAX_ENTRIES: u64 = 100_000;

    /// Create a cache that remembers results for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(Self::MAX_ENTRIES)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Run `op` unless a result for this key is already cached.
    ///
    /// `target` is the product the mutation acts on, if any. Without a key,
    /// `op` always runs.
    ///
    /// # Errors
    ///
    /// Returns the error from `op`. Callers coalesced onto a failing attempt
    /// receive it wrapped in `CartError::Shared`.
    pub async fn run<F>(
        &self,
        user_id: UserId,
        operation: &'static str,
        target: Option<&str>,
        key: Option<&str>,
        op: F,
    ) -> Result<CartReceipt, CartError>
    where
        F: Future<Output = Result<CartReceipt, CartError>>,
    {
        let Some(key) = key else {
            return op.await;
        };

        let cache_key = (
            user_id,
            operation,
            target.map(str::to_owned),
            key.to_owned(),
        );
        if let Some(hit) = self.cache.get(&cache_key).await {
            debug!(%user_id, operation, "replaying idempotent result");
            return Ok(hit);
        }

        self.cache
            .try_get_with(cache_key, op)
            .await
            .map_err(CartError::Shared)
    }
}

impl std::fmt::Debug for IdempotencyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdempotencyCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_repeat_key_replays_first_result() {
        let cache = IdempotencyCache::new(Duration::from_secs(60));
        let user = UserId::generate();
        let runs = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let runs = Arc::clone(&runs);
            let receipt = cache
                .run(user, "remove", Some("p1"), Some("key-1"), async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(CartReceipt::Removed { removed: 2 })
                })
                .await
                .unwrap();
            assert_eq!(receipt, CartReceipt::Removed { removed: 2 });
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_keys_are_scoped_by_user_and_operation() {
        let cache = IdempotencyCache::new(Duration::from_secs(60));
        let runs = Arc::new(AtomicU32::new(0));

        for (user, operation) in [
            (UserId::generate(), "remove"),
            (UserId::generate(), "remove"),
            (UserId::generate(), "checkout"),
        ] {
            let runs = Arc::clone(&runs);
            cache
                .run(user, operation, None, Some("same"), async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(CartReceipt::Removed { removed: 0 })
                })
                .await
                .unwrap();
        }

        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_keys_are_scoped_by_target_product() {
        let cache = IdempotencyCache::new(Duration::from_secs(60));
        let user = UserId::generate();
        let runs = Arc::new(AtomicU32::new(0));

        for target in ["phone", "case", "phone"] {
            let runs = Arc::clone(&runs);
            let receipt = cache
                .run(user, "remove", Some(target), Some("same"), async move {
                    let n = runs.fetch_add(1, Ordering::SeqCst);
                    Ok(CartReceipt::Removed {
                        removed: u64::from(n),
                    })
                })
                .await
                .unwrap();
            if target == "phone" {
                assert_eq!(receipt, CartReceipt::Removed { removed: 0 });
            }
        }

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_remembered() {
        let cache = IdempotencyCache::new(Duration::from_secs(60));
        let user = UserId::generate();

        let err = cache
            .run(user, "remove", None, Some("k"), async {
                Err(CartError::EmptyCart)
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "cart is empty");

        let ok = cache
            .run(user, "remove", None, Some("k"), async {
                Ok(CartReceipt::Removed { removed: 1 })
            })
            .await
            .unwrap();
        assert_eq!(ok, CartReceipt::Removed { removed: 1 });
    }

    #[tokio::test]
    async fn test_no_key_always_runs() {
        let cache = IdempotencyCache::new(Duration::from_secs(60));
        let user = UserId::generate();
        let runs = Arc::new(AtomicU32::new(0));

        for _ in 0..2 {
            let runs = Arc::clone(&runs);
            cache
                .run(user, "checkout", None, None, async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(CartReceipt::CheckedOut { orders: Vec::new() })
                })
                .await
                .unwrap();
        }

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
