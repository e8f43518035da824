//! HTTP middleware stack.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//!
//! Authentication is an extractor ([`RequireAuth`]) rather than a layer, so
//! public routes never pay for token verification.

pub mod auth;
pub mod request_id;

pub use auth::{AuthRejection, RequireAuth};
pub use request_id::request_id_middleware;
