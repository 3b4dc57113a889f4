//! Checkout error types.

use common::{Money, OrderId, ProductId};
use domain::{CheckoutStep, DomainError, ValidationErrors};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The submission carried no lines.
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// The submitted total does not match the lines, shipping and tax.
    #[error("Total mismatch: expected {expected}, submitted {submitted}")]
    TotalMismatch { expected: Money, submitted: Money },

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: i32,
    },

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The idempotency key names an order that has no lines: its write is
    /// still in flight or was rolled back without removing the row.
    #[error("Order {0} for this idempotency key is incomplete")]
    IncompleteOrder(OrderId),

    /// Form data failed validation.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// The checkout flow is not at a step that allows the action.
    #[error("Cannot {action} at the {step} step")]
    InvalidStep {
        step: CheckoutStep,
        action: &'static str,
    },

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(DomainError),
}

impl CheckoutError {
    /// Returns true if the request itself was at fault rather than the backend.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, CheckoutError::Store(_) | CheckoutError::Domain(DomainError::Store(_)))
    }
}

impl From<ValidationErrors> for CheckoutError {
    fn from(errors: ValidationErrors) -> Self {
        CheckoutError::Validation(errors)
    }
}

impl From<DomainError> for CheckoutError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Validation(errors) => CheckoutError::Validation(errors),
            DomainError::ProductNotFound(id) => CheckoutError::ProductNotFound(id),
            DomainError::InsufficientStock {
                product_id,
                requested,
                available,
            } => CheckoutError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            DomainError::Store(e) => CheckoutError::Store(e),
            other => CheckoutError::Domain(other),
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
