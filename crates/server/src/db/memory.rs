//! In-process store.
//!
//! Keeps every user document and product in maps behind one `RwLock`, so each
//! mutation is atomic with respect to every other. Used by the service and
//! router tests; an optional per-call latency lets tests exercise timeouts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use basket_core::{
    Address, AddressSlot, Addresses, CartLineItem, Email, OrderRecord, Price, Product, ProductId,
    UserId,
};

use super::{
    AccountStore, AddressStore, ProductStore, PullOutcome, RepositoryError, Store, UserStore,
};
use crate::models::{NewAccount, StoredCredentials, User};

/// Store backed by in-memory maps.
///
/// Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    state: RwLock<State>,
    latency: Option<Duration>,
}

type Catalog = HashMap<ProductId, Product>;

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, Account>,
    products: Catalog,
}

#[derive(Debug)]
struct Account {
    user: User,
    password_hash: String,
}

/// Outcome of a mutation closure.
enum Change<T> {
    /// The document changed; bump its version.
    Applied(T),
    /// Nothing was written.
    Unchanged(T),
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that sleeps for `latency` before every call.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::default(),
                latency: Some(latency),
            }),
        }
    }

    /// Change a product's current price.
    ///
    /// Returns `false` if the product does not exist.
    pub async fn set_product_price(&self, id: ProductId, price: Price) -> bool {
        let mut state = self.inner.state.write().await;
        state
            .products
            .get_mut(&id)
            .map(|product| product.price = price)
            .is_some()
    }

    /// Delete a product from the catalog. Cart lines and order records that
    /// reference it are left alone.
    pub async fn remove_product(&self, id: ProductId) -> Option<Product> {
        self.inner.state.write().await.products.remove(&id)
    }

    async fn delay(&self) {
        if let Some(latency) = self.inner.latency {
            tokio::time::sleep(latency).await;
        }
    }

    async fn mutate<T>(
        &self,
        id: UserId,
        expected_version: Option<i64>,
        f: impl FnOnce(&mut User, &Catalog) -> Result<Change<T>, RepositoryError> + Send,
    ) -> Result<T, RepositoryError> {
        self.delay().await;
        let mut state = self.inner.state.write().await;
        let State { users, products } = &mut *state;
        let account = users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        let user = &mut account.user;

        if let Some(expected) = expected_version
            && expected != user.version
        {
            return Err(RepositoryError::VersionConflict {
                expected,
                actual: user.version,
            });
        }

        match f(user, &*products)? {
            Change::Applied(value) => {
                user.version += 1;
                user.updated_at = Utc::now();
                Ok(value)
            }
            Change::Unchanged(value) => Ok(value),
        }
    }
}

impl UserStore for MemoryStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        self.delay().await;
        let state = self.inner.state.read().await;
        Ok(state.users.get(&id).map(|account| account.user.clone()))
    }

    async fn append_cart_item(
        &self,
        id: UserId,
        item: &CartLineItem,
        expected_version: Option<i64>,
    ) -> Result<(), RepositoryError> {
        let item = item.clone();
        self.mutate(id, expected_version, move |user, _| {
            user.cart.push(item);
            Ok(Change::Applied(()))
        })
        .await
    }

    async fn pull_cart_items(
        &self,
        id: UserId,
        product_id: ProductId,
        expected_version: Option<i64>,
    ) -> Result<PullOutcome, RepositoryError> {
        self.mutate(id, expected_version, move |user, _| {
            if user.cart.is_empty() {
                return Ok(Change::Unchanged(PullOutcome {
                    removed: 0,
                    cart_was_empty: true,
                }));
            }
            let before = user.cart.len();
            user.cart.retain(|line| line.product_id != product_id);
            let removed = u64::try_from(before - user.cart.len()).unwrap_or(u64::MAX);
            Ok(Change::Applied(PullOutcome {
                removed,
                cart_was_empty: false,
            }))
        })
        .await
    }

    async fn checkout_cart(
        &self,
        id: UserId,
        ordered_at: DateTime<Utc>,
        expected_version: Option<i64>,
    ) -> Result<Vec<OrderRecord>, RepositoryError> {
        self.mutate(id, expected_version, move |user, catalog| {
            if let Some(line) = user
                .cart
                .iter()
                .find(|line| !catalog.contains_key(&line.product_id))
            {
                return Err(RepositoryError::DanglingProduct(line.product_id));
            }

            let records: Vec<OrderRecord> = user
                .cart
                .drain(..)
                .map(|line| OrderRecord::from_line(&line, ordered_at))
                .collect();
            user.order_history.extend(records.iter().cloned());
            Ok(Change::Applied(records))
        })
        .await
    }

    async fn append_order(
        &self,
        id: UserId,
        record: &OrderRecord,
        expected_version: Option<i64>,
    ) -> Result<(), RepositoryError> {
        let record = record.clone();
        self.mutate(id, expected_version, move |user, _| {
            user.order_history.push(record);
            Ok(Change::Applied(()))
        })
        .await
    }
}

impl ProductStore for MemoryStore {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        self.delay().await;
        Ok(self.inner.state.read().await.products.get(&id).cloned())
    }

    async fn create_product(&self, product: &Product) -> Result<(), RepositoryError> {
        self.delay().await;
        let mut state = self.inner.state.write().await;
        if state.products.contains_key(&product.id) {
            return Err(RepositoryError::Conflict("record already exists".to_owned()));
        }
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        self.delay().await;
        let state = self.inner.state.read().await;
        let mut products: Vec<Product> = state.products.values().cloned().collect();
        sort_by_name(&mut products);
        Ok(products)
    }

    async fn search_products(&self, name: &str) -> Result<Vec<Product>, RepositoryError> {
        self.delay().await;
        let needle = name.to_lowercase();
        let state = self.inner.state.read().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        sort_by_name(&mut products);
        Ok(products)
    }
}

fn sort_by_name(products: &mut [Product]) {
    products.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.id.as_uuid().cmp(&b.id.as_uuid()))
    });
}

impl AccountStore for MemoryStore {
    async fn create_account(&self, account: &NewAccount) -> Result<(), RepositoryError> {
        self.delay().await;
        let mut state = self.inner.state.write().await;

        for existing in state.users.values() {
            if existing.user.email == account.email {
                return Err(RepositoryError::Conflict("email already exists".to_owned()));
            }
            if existing.user.phone == account.phone {
                return Err(RepositoryError::Conflict("phone already exists".to_owned()));
            }
        }

        let now = Utc::now();
        state.users.insert(
            account.id,
            Account {
                user: User {
                    id: account.id,
                    email: account.email.clone(),
                    first_name: account.first_name.clone(),
                    last_name: account.last_name.clone(),
                    phone: account.phone.clone(),
                    cart: Vec::new(),
                    order_history: Vec::new(),
                    addresses: Addresses::default(),
                    version: 0,
                    created_at: now,
                    updated_at: now,
                },
                password_hash: account.password_hash.clone(),
            },
        );
        Ok(())
    }

    async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<StoredCredentials>, RepositoryError> {
        self.delay().await;
        let state = self.inner.state.read().await;
        Ok(state
            .users
            .values()
            .find(|account| &account.user.email == email)
            .map(|account| StoredCredentials {
                id: account.user.id,
                email: account.user.email.clone(),
                first_name: account.user.first_name.clone(),
                last_name: account.user.last_name.clone(),
                password_hash: account.password_hash.clone(),
            }))
    }
}

impl AddressStore for MemoryStore {
    async fn add_address(
        &self,
        id: UserId,
        address: &Address,
    ) -> Result<Option<AddressSlot>, RepositoryError> {
        let address = address.clone();
        self.mutate(id, None, move |user, _| {
            let Some(slot) = user.addresses.first_free() else {
                return Ok(Change::Unchanged(None));
            };
            *user.addresses.slot_mut(slot) = Some(address);
            Ok(Change::Applied(Some(slot)))
        })
        .await
    }

    async fn replace_address(
        &self,
        id: UserId,
        slot: AddressSlot,
        address: &Address,
    ) -> Result<(), RepositoryError> {
        let address = address.clone();
        self.mutate(id, None, move |user, _| {
            let entry = user.addresses.slot_mut(slot);
            if entry.is_none() {
                return Err(RepositoryError::NotFound);
            }
            *entry = Some(address);
            Ok(Change::Applied(()))
        })
        .await
    }

    async fn clear_addresses(&self, id: UserId) -> Result<(), RepositoryError> {
        self.mutate(id, None, |user, _| {
            user.addresses = Addresses::default();
            Ok(Change::Applied(()))
        })
        .await
    }
}

impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn account(email: &str, phone: &str) -> NewAccount {
        NewAccount {
            id: UserId::generate(),
            email: Email::parse(email).unwrap(),
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
            phone: phone.to_owned(),
            password_hash: "hash".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_create_account_rejects_duplicates() {
        let store = MemoryStore::new();
        store
            .create_account(&account("a@example.com", "1"))
            .await
            .unwrap();

        let dup_email = store
            .create_account(&account("a@example.com", "2"))
            .await
            .unwrap_err();
        assert!(matches!(dup_email, RepositoryError::Conflict(m) if m.contains("email")));

        let dup_phone = store
            .create_account(&account("b@example.com", "1"))
            .await
            .unwrap_err();
        assert!(matches!(dup_phone, RepositoryError::Conflict(m) if m.contains("phone")));
    }

    #[tokio::test]
    async fn test_version_check_and_bump() {
        let store = MemoryStore::new();
        let new = account("a@example.com", "1");
        store.create_account(&new).await.unwrap();
        let line = CartLineItem::new(ProductId::generate(), Price::ZERO);

        store.append_cart_item(new.id, &line, Some(0)).await.unwrap();
        let err = store
            .append_cart_item(new.id, &line, Some(0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::VersionConflict {
                expected: 0,
                actual: 1
            }
        ));

        let user = store.find_user(new.id).await.unwrap().unwrap();
        assert_eq!(user.version, 1);
        assert_eq!(user.cart.len(), 1);
    }

    #[tokio::test]
    async fn test_pull_on_empty_cart_leaves_version() {
        let store = MemoryStore::new();
        let new = account("a@example.com", "1");
        store.create_account(&new).await.unwrap();

        let outcome = store
            .pull_cart_items(new.id, ProductId::generate(), None)
            .await
            .unwrap();
        assert!(outcome.cart_was_empty);

        let user = store.find_user(new.id).await.unwrap().unwrap();
        assert_eq!(user.version, 0);
    }

    #[tokio::test]
    async fn test_mutating_missing_user_is_not_found() {
        let store = MemoryStore::new();
        let line = CartLineItem::new(ProductId::generate(), Price::ZERO);
        let err = store
            .append_cart_item(UserId::generate(), &line, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_substring() {
        let store = MemoryStore::new();
        for name in ["Alpha Phone", "Beta Laptop", "alphabet soup"] {
            store
                .create_product(&Product {
                    id: ProductId::generate(),
                    name: name.to_owned(),
                    price: Price::ZERO,
                    rating: None,
                    image: None,
                })
                .await
                .unwrap();
        }

        let found = store.search_products("ALPHA").await.unwrap();
        let names: Vec<&str> = found.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Alpha Phone", "alphabet soup"]);
    }
}
