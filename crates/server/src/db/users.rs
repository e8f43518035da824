//! User documents, carts and order history in `PostgreSQL`.
//!
//! A user document is the `shop.users` row plus its `cart_line_items`,
//! `order_records` and `addresses` rows. Mutations lock the user row, check
//! the expected version, bump it, then touch the child rows, all inside one
//! transaction.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};

use basket_core::{
    Address, AddressSlot, Addresses, CartLineItem, Email, OrderId, OrderRecord, Price, ProductId,
    UserId,
};

use super::{
    AccountStore, PgStore, PullOutcome, RepositoryError, UserStore, map_unique_violation,
};
use crate::models::{NewAccount, StoredCredentials, User};

#[derive(FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    phone: String,
    first_name: String,
    last_name: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct CartRow {
    product_id: ProductId,
    price: Price,
}

#[derive(FromRow)]
struct OrderRow {
    id: OrderId,
    product_id: ProductId,
    price: Price,
    ordered_at: DateTime<Utc>,
}

#[derive(FromRow)]
pub(super) struct AddressRow {
    pub(super) slot: String,
    pub(super) house: String,
    pub(super) street: String,
    pub(super) city: String,
    pub(super) pincode: String,
}

#[derive(FromRow)]
struct CredentialsRow {
    id: UserId,
    email: String,
    first_name: String,
    last_name: String,
    password_hash: String,
}

fn parse_stored_email(raw: &str) -> Result<Email, RepositoryError> {
    Email::parse(raw)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))
}

pub(super) fn collect_addresses(rows: Vec<AddressRow>) -> Result<Addresses, RepositoryError> {
    let mut book = Addresses::default();
    for row in rows {
        let slot = AddressSlot::parse(&row.slot)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        *book.slot_mut(slot) = Some(Address {
            house: row.house,
            street: row.street,
            city: row.city,
            pincode: row.pincode,
        });
    }
    Ok(book)
}

/// Lock the user row, check `expected_version`, and bump the version.
///
/// Must run inside a transaction.
pub(super) async fn bump_version(
    conn: &mut PgConnection,
    id: UserId,
    expected_version: Option<i64>,
) -> Result<i64, RepositoryError> {
    let current: Option<i64> =
        sqlx::query_scalar("SELECT version FROM shop.users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    let Some(actual) = current else {
        return Err(RepositoryError::NotFound);
    };

    if let Some(expected) = expected_version
        && expected != actual
    {
        return Err(RepositoryError::VersionConflict { expected, actual });
    }

    let next: i64 = sqlx::query_scalar(
        r"
        UPDATE shop.users
        SET version = version + 1, updated_at = now()
        WHERE id = $1
        RETURNING version
        ",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(next)
}

impl UserStore for PgStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let row: Option<UserRow> = sqlx::query_as(
            r"
            SELECT id, email, phone, first_name, last_name, version, created_at, updated_at
            FROM shop.users
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let cart: Vec<CartRow> = sqlx::query_as(
            r"
            SELECT product_id, price
            FROM shop.cart_line_items
            WHERE user_id = $1
            ORDER BY position
            ",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let orders: Vec<OrderRow> = sqlx::query_as(
            r"
            SELECT id, product_id, price, ordered_at
            FROM shop.order_records
            WHERE user_id = $1
            ORDER BY position
            ",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let addresses: Vec<AddressRow> = sqlx::query_as(
            r"
            SELECT slot, house, street, city, pincode
            FROM shop.addresses
            WHERE user_id = $1
            ",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(User {
            id: row.id,
            email: parse_stored_email(&row.email)?,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            cart: cart
                .into_iter()
                .map(|r| CartLineItem::new(r.product_id, r.price))
                .collect(),
            order_history: orders
                .into_iter()
                .map(|r| OrderRecord {
                    order_id: r.id,
                    product_id: r.product_id,
                    ordered_at: r.ordered_at,
                    price: r.price,
                })
                .collect(),
            addresses: collect_addresses(addresses)?,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    async fn append_cart_item(
        &self,
        id: UserId,
        item: &CartLineItem,
        expected_version: Option<i64>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool().begin().await?;
        bump_version(&mut tx, id, expected_version).await?;

        sqlx::query(
            r"
            INSERT INTO shop.cart_line_items (user_id, product_id, price)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(id)
        .bind(item.product_id)
        .bind(item.price)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn pull_cart_items(
        &self,
        id: UserId,
        product_id: ProductId,
        expected_version: Option<i64>,
    ) -> Result<PullOutcome, RepositoryError> {
        let mut tx = self.pool().begin().await?;
        bump_version(&mut tx, id, expected_version).await?;

        let lines: i64 =
            sqlx::query_scalar("SELECT count(*) FROM shop.cart_line_items WHERE user_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        if lines == 0 {
            // Nothing changed; drop the version bump.
            tx.rollback().await?;
            return Ok(PullOutcome {
                removed: 0,
                cart_was_empty: true,
            });
        }

        let removed = sqlx::query(
            "DELETE FROM shop.cart_line_items WHERE user_id = $1 AND product_id = $2",
        )
        .bind(id)
        .bind(product_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(PullOutcome {
            removed,
            cart_was_empty: false,
        })
    }

    async fn checkout_cart(
        &self,
        id: UserId,
        ordered_at: DateTime<Utc>,
        expected_version: Option<i64>,
    ) -> Result<Vec<OrderRecord>, RepositoryError> {
        let mut tx = self.pool().begin().await?;
        bump_version(&mut tx, id, expected_version).await?;

        let dangling: Option<ProductId> = sqlx::query_scalar(
            r"
            SELECT c.product_id
            FROM shop.cart_line_items c
            WHERE c.user_id = $1
              AND NOT EXISTS (SELECT 1 FROM shop.products p WHERE p.id = c.product_id)
            ORDER BY c.position
            LIMIT 1
            ",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(product_id) = dangling {
            tx.rollback().await?;
            return Err(RepositoryError::DanglingProduct(product_id));
        }

        // DELETE ... RETURNING does not guarantee order; sort on position.
        let mut drained: Vec<(i64, ProductId, Price)> = sqlx::query_as(
            r"
            DELETE FROM shop.cart_line_items
            WHERE user_id = $1
            RETURNING position, product_id, price
            ",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        drained.sort_by_key(|(position, _, _)| *position);

        let mut records = Vec::with_capacity(drained.len());
        for (_, product_id, price) in drained {
            let record = OrderRecord::new(product_id, price, ordered_at);
            insert_order(&mut tx, id, &record).await?;
            records.push(record);
        }

        tx.commit().await?;
        Ok(records)
    }

    async fn append_order(
        &self,
        id: UserId,
        record: &OrderRecord,
        expected_version: Option<i64>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool().begin().await?;
        bump_version(&mut tx, id, expected_version).await?;
        insert_order(&mut tx, id, record).await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn insert_order(
    conn: &mut PgConnection,
    id: UserId,
    record: &OrderRecord,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO shop.order_records (id, user_id, product_id, price, ordered_at)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(record.order_id)
    .bind(id)
    .bind(record.product_id)
    .bind(record.price)
    .bind(record.ordered_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

impl AccountStore for PgStore {
    async fn create_account(&self, account: &NewAccount) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.users (id, email, phone, first_name, last_name, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(account.id)
        .bind(account.email.as_str())
        .bind(&account.phone)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.password_hash)
        .execute(self.pool())
        .await
        .map_err(map_unique_violation)?;
        Ok(())
    }

    async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<StoredCredentials>, RepositoryError> {
        let row: Option<CredentialsRow> = sqlx::query_as(
            r"
            SELECT id, email, first_name, last_name, password_hash
            FROM shop.users
            WHERE email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool())
        .await?;

        row.map(|r| {
            Ok(StoredCredentials {
                id: r.id,
                email: parse_stored_email(&r.email)?,
                first_name: r.first_name,
                last_name: r.last_name,
                password_hash: r.password_hash,
            })
        })
        .transpose()
    }
}
