//! Cart lines and order records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{OrderId, ProductId};
use super::price::Price;

/// One entry in a user's cart.
///
/// The price is copied from the product when the line is added and never
/// follows later product price changes. The same product may appear on several
/// lines; lines are never merged into a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    /// Product this line refers to. The product may have been deleted since.
    pub product_id: ProductId,
    /// Price snapshotted at add time.
    pub price: Price,
}

impl CartLineItem {
    /// Create a line for `product_id` at the given snapshot price.
    #[must_use]
    pub const fn new(product_id: ProductId, price: Price) -> Self {
        Self { product_id, price }
    }
}

/// One purchase in a user's order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Identifier minted for this purchase.
    pub order_id: OrderId,
    /// Product that was purchased.
    pub product_id: ProductId,
    /// When the purchase happened.
    pub ordered_at: DateTime<Utc>,
    /// Amount charged.
    pub price: Price,
}

impl OrderRecord {
    /// Create a record with a freshly minted order ID.
    #[must_use]
    pub fn new(product_id: ProductId, price: Price, ordered_at: DateTime<Utc>) -> Self {
        Self {
            order_id: OrderId::generate(),
            product_id,
            ordered_at,
            price,
        }
    }

    /// Turn a cart line into an order record charged at the line's price.
    #[must_use]
    pub fn from_line(line: &CartLineItem, ordered_at: DateTime<Utc>) -> Self {
        Self::new(line.product_id, line.price, ordered_at)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_line_keeps_snapshot_price() {
        let line = CartLineItem::new(ProductId::generate(), Price::from_cents(4200).unwrap());
        let now = Utc::now();

        let record = OrderRecord::from_line(&line, now);

        assert_eq!(record.product_id, line.product_id);
        assert_eq!(record.price, line.price);
        assert_eq!(record.ordered_at, now);
    }

    #[test]
    fn test_each_record_gets_its_own_order_id() {
        let line = CartLineItem::new(ProductId::generate(), Price::ZERO);
        let now = Utc::now();

        let first = OrderRecord::from_line(&line, now);
        let second = OrderRecord::from_line(&line, now);

        assert_eq!(first.product_id, second.product_id);
        assert_ne!(first.order_id, second.order_id);
    }
}
