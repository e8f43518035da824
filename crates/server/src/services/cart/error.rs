//! Cart engine error types.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use basket_core::{IdError, ProductId};

use crate::db::RepositoryError;

/// Errors returned by cart and order operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The named entity ("product" or "user") does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A cart line refers to a product that has been deleted. The cart is
    /// left untouched.
    #[error("product {0} in the cart no longer exists")]
    ProductGone(ProductId),

    /// Malformed input, such as an ID that does not parse.
    #[error("{0}")]
    InvalidArgument(String),

    /// Remove was called on a cart with no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// The operation did not finish within the configured deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Optimistic retries were exhausted.
    #[error("the cart was modified concurrently, please retry")]
    Conflict,

    /// Persistence failure.
    #[error("store error: {0}")]
    Store(RepositoryError),

    /// Error shared between coalesced duplicate requests.
    #[error(transparent)]
    Shared(Arc<Self>),
}

/// Coarse classification of a [`CartError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartErrorKind {
    NotFound,
    InvalidArgument,
    Timeout,
    Conflict,
    Store,
}

impl CartError {
    /// Classify this error. `EmptyCart` is an invalid argument.
    #[must_use]
    pub fn kind(&self) -> CartErrorKind {
        match self {
            Self::NotFound(_) | Self::ProductGone(_) => CartErrorKind::NotFound,
            Self::InvalidArgument(_) | Self::EmptyCart => CartErrorKind::InvalidArgument,
            Self::Timeout(_) => CartErrorKind::Timeout,
            Self::Conflict => CartErrorKind::Conflict,
            Self::Store(_) => CartErrorKind::Store,
            Self::Shared(inner) => inner.kind(),
        }
    }
}

impl From<IdError> for CartError {
    fn from(e: IdError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}

/// Store errors raised by user mutations.
///
/// A missing row means the user is gone and a version mismatch is a
/// concurrent write; everything else is opaque.
impl From<RepositoryError> for CartError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::NotFound("user"),
            RepositoryError::VersionConflict { .. } => Self::Conflict,
            RepositoryError::DanglingProduct(product_id) => Self::ProductGone(product_id),
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cart_is_invalid_argument() {
        assert_eq!(CartError::EmptyCart.kind(), CartErrorKind::InvalidArgument);
    }

    #[test]
    fn test_shared_keeps_kind() {
        let shared = CartError::Shared(Arc::new(CartError::NotFound("product")));
        assert_eq!(shared.kind(), CartErrorKind::NotFound);
        assert_eq!(shared.to_string(), "product not found");
    }

    #[test]
    fn test_dangling_product_is_not_found() {
        let product_id = ProductId::generate();
        let err = CartError::from(RepositoryError::DanglingProduct(product_id));
        assert!(matches!(err, CartError::ProductGone(id) if id == product_id));
        assert_eq!(err.kind(), CartErrorKind::NotFound);
    }

    #[test]
    fn test_repository_errors_map_to_kinds() {
        assert_eq!(
            CartError::from(RepositoryError::NotFound).kind(),
            CartErrorKind::NotFound
        );
        assert_eq!(
            CartError::from(RepositoryError::VersionConflict {
                expected: 1,
                actual: 2
            })
            .kind(),
            CartErrorKind::Conflict
        );
        assert_eq!(
            CartError::from(RepositoryError::DataCorruption("bad".to_owned())).kind(),
            CartErrorKind::Store
        );
    }
}
