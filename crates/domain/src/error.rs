//! Domain error types.

use common::ProductId;
use store::StoreError;
use thiserror::Error;

use crate::ValidationErrors;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// One or more input fields failed validation.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// A status change that the lifecycle does not allow.
    #[error("Cannot change status from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The requested quantity exceeds what the product has in stock.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: i32,
    },

    /// Quantities must be positive.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(u32),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<ValidationErrors> for DomainError {
    fn from(errors: ValidationErrors) -> Self {
        DomainError::Validation(errors)
    }
}
