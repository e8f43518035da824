//! Address slots in `PostgreSQL`.

use basket_core::{Address, AddressSlot, UserId};

use super::users::{AddressRow, bump_version, collect_addresses};
use super::{AddressStore, PgStore, RepositoryError};

impl AddressStore for PgStore {
    async fn add_address(
        &self,
        id: UserId,
        address: &Address,
    ) -> Result<Option<AddressSlot>, RepositoryError> {
        let mut tx = self.pool().begin().await?;
        bump_version(&mut tx, id, None).await?;

        let rows: Vec<AddressRow> = sqlx::query_as(
            r"
            SELECT slot, house, street, city, pincode
            FROM shop.addresses
            WHERE user_id = $1
            ",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let Some(slot) = collect_addresses(rows)?.first_free() else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r"
            INSERT INTO shop.addresses (user_id, slot, house, street, city, pincode)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(id)
        .bind(slot.as_str())
        .bind(&address.house)
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.pincode)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(slot))
    }

    async fn replace_address(
        &self,
        id: UserId,
        slot: AddressSlot,
        address: &Address,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool().begin().await?;
        bump_version(&mut tx, id, None).await?;

        let updated = sqlx::query(
            r"
            UPDATE shop.addresses
            SET house = $3, street = $4, city = $5, pincode = $6
            WHERE user_id = $1 AND slot = $2
            ",
        )
        .bind(id)
        .bind(slot.as_str())
        .bind(&address.house)
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.pincode)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn clear_addresses(&self, id: UserId) -> Result<(), RepositoryError> {
        let mut tx = self.pool().begin().await?;
        bump_version(&mut tx, id, None).await?;

        sqlx::query("DELETE FROM shop.addresses WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
