//! Address book service.
//!
//! A user has a home slot and a work slot. Adding fills the first free slot;
//! editing targets a named slot that must already be occupied.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument};

use basket_core::{Address, AddressError, AddressSlot, UserId};

use crate::db::{AddressStore, RepositoryError};

/// Errors that can occur during address operations.
#[derive(Debug, Error)]
pub enum AddressServiceError {
    /// A field is blank.
    #[error(transparent)]
    Invalid(#[from] AddressError),

    /// Both slots are occupied.
    #[error("address limit reached: delete an address before adding another")]
    AddressLimit,

    /// The slot being edited is empty, or the user is gone.
    #[error("no {0} address to edit")]
    NotFound(AddressSlot),

    /// The operation did not finish within the configured deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Address operations over an injected store.
#[derive(Debug, Clone)]
pub struct AddressService<S> {
    store: S,
    timeout: Duration,
}

impl<S: AddressStore> AddressService<S> {
    #[must_use]
    pub const fn new(store: S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Store `address` in the first free slot and return that slot.
    ///
    /// # Errors
    ///
    /// Returns `AddressServiceError::AddressLimit` if both slots are taken.
    #[instrument(skip(self, address), fields(user_id = %user_id))]
    pub async fn add(
        &self,
        user_id: UserId,
        address: &Address,
    ) -> Result<AddressSlot, AddressServiceError> {
        address.validate()?;
        let slot = self
            .bounded(self.store.add_address(user_id, address))
            .await?
            .ok_or(AddressServiceError::AddressLimit)?;
        debug!(%slot, "address added");
        Ok(slot)
    }

    /// Replace the address in an occupied slot.
    ///
    /// # Errors
    ///
    /// Returns `AddressServiceError::NotFound` if the slot is empty.
    #[instrument(skip(self, address), fields(user_id = %user_id, slot = %slot))]
    pub async fn edit(
        &self,
        user_id: UserId,
        slot: AddressSlot,
        address: &Address,
    ) -> Result<(), AddressServiceError> {
        address.validate()?;
        self.bounded(self.store.replace_address(user_id, slot, address))
            .await
            .map_err(|e| match e {
                AddressServiceError::Repository(RepositoryError::NotFound) => {
                    AddressServiceError::NotFound(slot)
                }
                other => other,
            })
    }

    /// Empty both slots.
    ///
    /// # Errors
    ///
    /// Returns `AddressServiceError::Repository` if the store fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn delete_all(&self, user_id: UserId) -> Result<(), AddressServiceError> {
        self.bounded(self.store.clear_addresses(user_id)).await
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, RepositoryError>>,
    ) -> Result<T, AddressServiceError> {
        Ok(tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| AddressServiceError::Timeout(self.timeout))??)
    }
}
