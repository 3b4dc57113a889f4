//! Storefront domain rules.
//!
//! This crate provides:
//! - Checkout form validation ([`ShippingForm`], [`PaymentForm`])
//! - The checkout step machine ([`CheckoutStep`])
//! - Order and payment status transition rules ([`StatusTransition`])
//! - Services over the store for carts, the catalog and orders

pub mod cart;
pub mod catalog;
pub mod error;
pub mod orders;
pub mod step;
pub mod transitions;
pub mod validation;

pub use cart::{CartLine, CartService, CartView};
pub use catalog::CatalogService;
pub use error::DomainError;
pub use orders::OrderService;
pub use step::CheckoutStep;
pub use transitions::StatusTransition;
pub use validation::{FieldError, PaymentForm, ShippingForm, ValidationErrors};
