//! Order placement for the storefront.
//!
//! The [`OrderWriter`] turns a checkout submission into an order row, its
//! line items and one stock change per line:
//! 1. Insert the order
//! 2. Insert every line in one batch
//! 3. Take each line's quantity out of stock, per the [`StockPolicy`]
//!
//! If a later step fails, earlier writes are undone in reverse order.
//! The [`CheckoutFlow`] drives a user through shipping, payment and
//! confirmation and places the order through the same writer.

pub mod error;
pub mod flow;
pub mod policy;
pub mod stage;
pub mod writer;

pub use error::{CheckoutError, Result};
pub use flow::CheckoutFlow;
pub use policy::StockPolicy;
pub use stage::WriteStage;
pub use writer::{CheckoutLine, OrderWriter, PlaceOrder, PlacedOrder, Placement};
