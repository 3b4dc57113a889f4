use chrono::{DateTime, Utc};
use common::{OrderStatus, PaymentStatus, UserId};

use crate::{Order, Product};

/// Builder for order listings.
///
/// Results are always newest first.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Filter by the ordering user.
    pub user_id: Option<UserId>,

    pub status: Option<OrderStatus>,

    pub payment_status: Option<PaymentStatus>,

    /// Orders created at or after this timestamp.
    pub from_timestamp: Option<DateTime<Utc>>,

    /// Orders created at or before this timestamp.
    pub to_timestamp: Option<DateTime<Utc>>,

    /// Maximum number of orders to return.
    pub limit: Option<usize>,

    /// Number of orders to skip.
    pub offset: Option<usize>,
}

impl OrderQuery {
    /// Creates a new empty query matching every order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for one user's orders.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = Some(status);
        self
    }

    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if `order` passes every filter (ignores limit/offset).
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(user_id) = self.user_id
            && order.user_id != Some(user_id)
        {
            return false;
        }
        if let Some(status) = self.status
            && order.status != status
        {
            return false;
        }
        if let Some(payment_status) = self.payment_status
            && order.payment_status != payment_status
        {
            return false;
        }
        if let Some(from) = self.from_timestamp
            && order.created_at < from
        {
            return false;
        }
        if let Some(to) = self.to_timestamp
            && order.created_at > to
        {
            return false;
        }
        true
    }
}

/// Builder for catalog listings. Results are ordered by name.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    pub category: Option<String>,

    /// Case-insensitive substring of the product name.
    pub search: Option<String>,

    /// Only products whose stock is strictly below this value.
    pub low_stock_below: Option<i32>,

    pub limit: Option<usize>,

    pub offset: Option<usize>,
}

impl ProductQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn low_stock_below(mut self, threshold: i32) -> Self {
        self.low_stock_below = Some(threshold);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if `product` passes every filter (ignores limit/offset).
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(ref category) = self.category
            && &product.category != category
        {
            return false;
        }
        if let Some(ref search) = self.search
            && !product
                .name
                .to_lowercase()
                .contains(&search.to_lowercase())
        {
            return false;
        }
        if let Some(threshold) = self.low_stock_below
            && product.stock >= threshold
        {
            return false;
        }
        true
    }
}
