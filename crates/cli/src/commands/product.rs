//! Catalog management commands.
//!
//! # Usage
//!
//! ```bash
//! basket-cli product add -n "Gaming Phone" -p 499.00
//! basket-cli product list
//! ```

use rust_decimal::Decimal;
use thiserror::Error;

use basket_core::{Price, PriceError, Product, ProductId};
use basket_server::db::{ProductStore, RepositoryError};

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum ProductError {
    #[error("Product name is required")]
    EmptyName,

    #[error("Invalid price: {0}")]
    InvalidPrice(#[from] PriceError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Build a product from command-line input.
fn build(
    name: &str,
    price: Decimal,
    rating: Option<String>,
    image: Option<String>,
) -> Result<Product, ProductError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ProductError::EmptyName);
    }

    Ok(Product {
        id: ProductId::generate(),
        name: name.to_owned(),
        price: Price::new(price)?,
        rating: rating.filter(|r| !r.trim().is_empty()),
        image: image.filter(|i| !i.trim().is_empty()),
    })
}

/// Create a catalog product.
///
/// # Errors
///
/// Returns an error if the input is invalid or the insert fails.
pub async fn add(
    name: &str,
    price: Decimal,
    rating: Option<String>,
    image: Option<String>,
) -> Result<ProductId, Box<dyn std::error::Error>> {
    let product = build(name, price, rating, image)?;
    let store = super::connect().await?;

    store
        .create_product(&product)
        .await
        .map_err(ProductError::from)?;

    tracing::info!(
        "Product created successfully! ID: {}, Name: {}, Price: {}",
        product.id,
        product.name,
        product.price
    );
    Ok(product.id)
}

/// Print every catalog product, one per line.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let store = super::connect().await?;
    let products = store.list_products().await.map_err(ProductError::from)?;

    #[allow(clippy::print_stdout)]
    {
        for product in &products {
            println!("{}\t{}\t{}", product.id, product.price, product.name);
        }
    }

    tracing::info!("{} product(s)", products.len());
    Ok(())
}
