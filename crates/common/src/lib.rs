//! Shared types for the storefront services.

pub mod ids;
pub mod money;
pub mod status;

pub use ids::{CartId, CartItemId, OrderId, OrderItemId, ProductId, UserId};
pub use money::Money;
pub use status::{OrderStatus, ParseStatusError, PaymentStatus};
