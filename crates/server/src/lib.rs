//! Basket server library.
//!
//! This crate provides the REST backend as a library, allowing the router to
//! be tested against the in-memory store and reused by the CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
