use async_trait::async_trait;
use common::{CartId, CartItemId, OrderId, OrderStatus, PaymentStatus, ProductId, UserId};

use crate::{
    Cart, CartItem, NewCartItem, NewOrder, NewOrderItem, NewProduct, Order, OrderItem, OrderQuery,
    Product, ProductQuery, ProductUpdate, Result,
};

/// Catalog access, including the shared `stock` counter.
///
/// Every call is an independent round trip. No method composes with another
/// into a transaction.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn insert_product(&self, product: NewProduct) -> Result<Product>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>>;

    /// Applies a partial update. Fails with `NotFound` if the product is missing.
    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product>;

    /// Deletes a product. Returns false if it did not exist.
    async fn delete_product(&self, id: ProductId) -> Result<bool>;

    /// Overwrites the stock value unconditionally.
    async fn set_stock(&self, id: ProductId, stock: i32) -> Result<()>;

    /// Decrements stock only if at least `quantity` units remain.
    ///
    /// Returns the new stock, or `None` when the guard rejected the update.
    /// Fails with `NotFound` if the product is missing.
    async fn decrement_stock_if_available(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<Option<i32>>;

    /// Adds `quantity` units in one atomic update and returns the new stock.
    async fn increment_stock(&self, id: ProductId, quantity: u32) -> Result<i32>;
}

/// Per-user active cart access.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn get_active_cart(&self, user_id: UserId) -> Result<Option<Cart>>;

    /// Creates a new active cart for the user.
    async fn create_cart(&self, user_id: UserId) -> Result<Cart>;

    async fn list_cart_items(&self, cart_id: CartId) -> Result<Vec<CartItem>>;

    /// Inserts a line, or sets the quantity of the existing line for the same
    /// product, size and color.
    async fn upsert_cart_item(&self, cart_id: CartId, item: NewCartItem) -> Result<CartItem>;

    async fn update_cart_item_quantity(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<CartItem>;

    /// Removes a line. Returns false if it did not exist.
    async fn remove_cart_item(&self, cart_id: CartId, item_id: CartItemId) -> Result<bool>;

    async fn clear_cart(&self, cart_id: CartId) -> Result<()>;

    /// Marks a cart inactive so the next `get_active_cart` starts fresh.
    async fn deactivate_cart(&self, cart_id: CartId) -> Result<()>;
}

/// Order and order line access.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts an order row. A duplicate idempotency key fails with `Conflict`.
    async fn insert_order(&self, order: NewOrder) -> Result<Order>;

    /// Inserts all lines for an order in one batch: either every line is
    /// written or none is.
    async fn insert_order_items(
        &self,
        order_id: OrderId,
        items: Vec<NewOrderItem>,
    ) -> Result<Vec<OrderItem>>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    async fn find_order_by_idempotency_key(&self, key: &str) -> Result<Option<Order>>;

    async fn list_orders(&self, query: OrderQuery) -> Result<Vec<Order>>;

    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>>;

    /// Every order line in the store, for dashboard aggregation.
    async fn list_all_order_items(&self) -> Result<Vec<OrderItem>>;

    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order>;

    async fn update_payment_status(&self, id: OrderId, status: PaymentStatus) -> Result<Order>;

    /// Detaches the idempotency key from an order so the key can be used
    /// again. Returns false if the order did not exist.
    async fn release_idempotency_key(&self, id: OrderId) -> Result<bool>;

    /// Deletes an order row. Returns false if it did not exist.
    async fn delete_order(&self, id: OrderId) -> Result<bool>;

    /// Deletes every line of an order and returns how many were removed.
    async fn delete_order_items(&self, order_id: OrderId) -> Result<u64>;
}

/// Extension trait providing convenience methods for order stores.
#[async_trait]
pub trait OrderStoreExt: OrderStore {
    /// Loads an order together with its lines.
    async fn get_order_with_items(&self, id: OrderId) -> Result<Option<(Order, Vec<OrderItem>)>> {
        match self.get_order(id).await? {
            Some(order) => {
                let items = self.list_order_items(id).await?;
                Ok(Some((order, items)))
            }
            None => Ok(None),
        }
    }
}

// Blanket implementation for all OrderStore implementations
impl<T: OrderStore + ?Sized> OrderStoreExt for T {}

/// The full storefront persistence surface.
pub trait Store: ProductStore + CartStore + OrderStore {}

impl<T: ProductStore + CartStore + OrderStore + ?Sized> Store for T {}
