//! Catalog product.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// A product in the catalog.
///
/// There is no stock field: products are always purchasable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Display name, searched case-insensitively.
    pub name: String,
    /// Current price.
    pub price: Price,
    /// Optional rating label shown by clients.
    pub rating: Option<String>,
    /// Optional image URL.
    pub image: Option<String>,
}
