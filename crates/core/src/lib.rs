//! Basket Core - Shared domain types.
//!
//! This crate provides the types used across all Basket components:
//! - `server` - REST backend (accounts, catalog, cart/order engine, addresses)
//! - `cli` - Command-line tools for migrations and product administration
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, prices, emails, cart lines, orders and addresses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
