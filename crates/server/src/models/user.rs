//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use basket_core::{Addresses, CartLineItem, Email, OrderRecord, UserId};

/// A user document: profile, cart, order history and address book.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login email (unique).
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    /// Contact phone (unique).
    pub phone: String,
    /// Cart lines in add order.
    pub cart: Vec<CartLineItem>,
    /// Purchases in order of purchase.
    pub order_history: Vec<OrderRecord>,
    /// Home and work addresses.
    pub addresses: Addresses,
    /// Document version, bumped by every cart, order or address mutation.
    pub version: i64,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Data needed to create an account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub id: UserId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub password_hash: String,
}

/// Login lookup result: identity claims plus the stored password hash.
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub id: UserId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}

/// Identity of the authenticated caller, taken from a verified access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
}
