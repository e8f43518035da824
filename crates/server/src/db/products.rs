//! Product catalog in `PostgreSQL`.

use sqlx::FromRow;

use basket_core::{Price, Product, ProductId};

use super::{PgStore, ProductStore, RepositoryError, map_unique_violation};

#[derive(FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    price: Price,
    rating: Option<String>,
    image: Option<String>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            price: row.price,
            rating: row.rating,
            image: row.image,
        }
    }
}

/// Escape `LIKE` metacharacters so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl ProductStore for PgStore {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(
            r"
            SELECT id, name, price, rating, image
            FROM shop.products
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Product::from))
    }

    async fn create_product(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.products (id, name, price, rating, image)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.price)
        .bind(product.rating.as_deref())
        .bind(product.image.as_deref())
        .execute(self.pool())
        .await
        .map_err(map_unique_violation)?;
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            r"
            SELECT id, name, price, rating, image
            FROM shop.products
            ORDER BY name, id
            ",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn search_products(&self, name: &str) -> Result<Vec<Product>, RepositoryError> {
        let pattern = format!("%{}%", escape_like(name));
        let rows: Vec<ProductRow> = sqlx::query_as(
            r"
            SELECT id, name, price, rating, image
            FROM shop.products
            WHERE name ILIKE $1
            ORDER BY name, id
            ",
        )
        .bind(pattern)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
