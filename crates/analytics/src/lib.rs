//! Dashboard analytics for the storefront admin.
//!
//! Everything here is computed in memory over collections that were already
//! fetched from the store. [`DashboardSummary::compute`] is pure;
//! [`DashboardSummary::load`] fetches the collections first.

pub mod dashboard;

pub use dashboard::{DashboardSummary, ProductSales, StockAlert};

/// Number of orders listed under "recent orders".
pub const RECENT_ORDER_COUNT: usize = 5;
