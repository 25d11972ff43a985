//! Domain error types.

use std::time::Duration;

use store::StoreError;
use thiserror::Error;

use crate::cart::CartError;
use crate::catalog::CatalogError;
use crate::order::OrderError;
use crate::user::UserError;
use crate::validation::ValidationErrors;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The request failed validation before touching the store.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    /// An error occurred in order placement or payment.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// An error occurred in the catalog.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// An error occurred in the cart.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// An error occurred in registration or login.
    #[error("User error: {0}")]
    User(#[from] UserError),

    /// The atomic unit did not finish before its deadline and was rolled back.
    #[error("Operation {operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    /// Stable, machine-readable name of the error.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::Order(err) => err.kind(),
            DomainError::Catalog(err) => err.kind(),
            DomainError::Cart(err) => err.kind(),
            DomainError::User(err) => err.kind(),
            DomainError::Timeout { .. } => "timeout",
            DomainError::Store(_) => "internal_error",
        }
    }

    /// Returns true for faults the caller did not cause.
    pub fn is_internal(&self) -> bool {
        matches!(self, DomainError::Store(_))
            || matches!(self, DomainError::User(UserError::PasswordHash(_)))
    }
}
