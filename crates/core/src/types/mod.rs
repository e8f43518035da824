//! Core types for Basket.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod cart;
pub mod email;
pub mod id;
pub mod price;
pub mod product;

pub use address::{Address, AddressError, AddressSlot, Addresses};
pub use cart::{CartLineItem, OrderRecord};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{Price, PriceError};
pub use product::Product;
