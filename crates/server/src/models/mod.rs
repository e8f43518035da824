//! Domain models for the server.
//!
//! Shared value types (IDs, prices, cart lines, addresses) live in
//! `basket-core`; this module holds the aggregates the store returns.

pub mod user;

pub use user::{CurrentUser, NewAccount, StoredCredentials, User};
