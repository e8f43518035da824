//! Business logic layer.
//!
//! Services wrap a [`Store`](crate::db::Store) handle and own validation,
//! deadlines and retries. Route handlers stay thin.

pub mod addresses;
pub mod auth;
pub mod cart;
pub mod idempotency;
