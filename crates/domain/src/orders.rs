//! Order reads and admin status management.

use common::{OrderId, OrderStatus, PaymentStatus, UserId};
use store::{Order, OrderItem, OrderQuery, OrderStoreExt, Store, StoreError};

use crate::{DomainError, StatusTransition};

/// Service for reading orders and moving them through their lifecycle.
///
/// Order creation lives with the checkout writer; this service only reads
/// and updates existing rows.
#[derive(Clone)]
pub struct OrderService<S> {
    store: S,
}

impl<S: Store> OrderService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Loads an order together with its lines.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: OrderId) -> Result<(Order, Vec<OrderItem>), DomainError> {
        self.store
            .get_order_with_items(id)
            .await?
            .ok_or_else(|| StoreError::not_found("Order", id).into())
    }

    /// Loads an order only if it belongs to `user_id`.
    ///
    /// Someone else's order reads as not found.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<(Order, Vec<OrderItem>), DomainError> {
        let (order, items) = self.get(id).await?;
        if order.user_id != Some(user_id) {
            return Err(StoreError::not_found("Order", id).into());
        }
        Ok((order, items))
    }

    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, DomainError> {
        Ok(self.store.list_orders(OrderQuery::for_user(user_id)).await?)
    }

    pub async fn list(&self, query: OrderQuery) -> Result<Vec<Order>, DomainError> {
        Ok(self.store.list_orders(query).await?)
    }

    async fn load(&self, id: OrderId) -> Result<Order, DomainError> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| StoreError::not_found("Order", id).into())
    }

    /// Moves an order to `status` if the lifecycle allows it.
    ///
    /// Cancelling does not return stock to the catalog.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, DomainError> {
        let order = self.load(id).await?;
        order.status.transition_to(status)?;
        if order.status == status {
            return Ok(order);
        }

        let order = self.store.update_order_status(id, status).await?;
        tracing::info!(order_id = %id, status = %status, "Order status updated");
        Ok(order)
    }

    /// Moves an order's payment to `status` if the lifecycle allows it.
    #[tracing::instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        id: OrderId,
        status: PaymentStatus,
    ) -> Result<Order, DomainError> {
        let order = self.load(id).await?;
        order.payment_status.transition_to(status)?;
        if order.payment_status == status {
            return Ok(order);
        }

        let order = self.store.update_payment_status(id, status).await?;
        tracing::info!(order_id = %id, payment_status = %status, "Payment status updated");
        Ok(order)
    }
}
