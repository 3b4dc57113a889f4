use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{CartId, CartItemId, OrderId, OrderStatus, PaymentStatus, ProductId, UserId};
use tokio::sync::{Barrier, RwLock};

use crate::{
    Cart, CartItem, NewCartItem, NewOrder, NewOrderItem, NewProduct, Order, OrderItem, OrderQuery,
    Product, ProductQuery, ProductUpdate, Result, StoreError,
    store::{CartStore, OrderStore, ProductStore},
};

/// Store calls that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    InsertOrder,
    InsertOrderItems,
    /// `set_stock` and `decrement_stock_if_available`.
    AdjustStock,
    /// `increment_stock`.
    Restock,
    DeleteOrder,
    DeleteOrderItems,
    ReleaseIdempotencyKey,
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Always,
    OnCall { call: usize, seen: usize },
}

#[derive(Default)]
struct MemoryState {
    products: Vec<Product>,
    carts: Vec<Cart>,
    cart_items: Vec<CartItem>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
    failures: HashMap<FailPoint, Trigger>,
    read_barrier: Option<Arc<Barrier>>,
}

impl MemoryState {
    fn check(&mut self, point: FailPoint) -> Result<()> {
        let fail = match self.failures.get_mut(&point) {
            Some(Trigger::Always) => true,
            Some(Trigger::OnCall { call, seen }) => {
                *seen += 1;
                *seen == *call
            }
            None => false,
        };
        if fail {
            return Err(StoreError::Unavailable(format!("injected failure at {point:?}")));
        }
        Ok(())
    }

    fn product_mut(&mut self, id: ProductId) -> Result<&mut Product> {
        self.products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::not_found("Product", id))
    }

    fn order_mut(&mut self, id: OrderId) -> Result<&mut Order> {
        self.orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| StoreError::not_found("Order", id))
    }
}

fn paginate<T>(items: Vec<T>, offset: Option<usize>, limit: Option<usize>) -> Vec<T> {
    let items = items.into_iter().skip(offset.unwrap_or(0));
    match limit {
        Some(limit) => items.take(limit).collect(),
        None => items.collect(),
    }
}

/// In-memory store for tests and database-less runs.
///
/// Like the hosted backend it stands in for, every method takes and releases
/// its lock within the call, so a read followed by a write from the caller is
/// two separate steps that other tasks can interleave with.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call at `point` fail until cleared.
    pub async fn fail_on(&self, point: FailPoint) {
        self.state
            .write()
            .await
            .failures
            .insert(point, Trigger::Always);
    }

    /// Makes only the `call`-th call (1-based, counted from now) at `point` fail.
    pub async fn fail_on_call(&self, point: FailPoint, call: usize) {
        self.state
            .write()
            .await
            .failures
            .insert(point, Trigger::OnCall { call, seen: 0 });
    }

    pub async fn clear_failures(&self) {
        self.state.write().await.failures.clear();
    }

    /// Makes every product read wait on `barrier` after the value is read.
    ///
    /// Lets tests line up several readers on the same stock value before any
    /// of them writes back.
    pub async fn set_read_barrier(&self, barrier: Option<Arc<Barrier>>) {
        self.state.write().await.read_barrier = barrier;
    }

    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    pub async fn order_item_count(&self) -> usize {
        self.state.read().await.order_items.len()
    }

    /// Current stock of a product, if it exists.
    pub async fn stock_of(&self, id: ProductId) -> Option<i32> {
        self.state
            .read()
            .await
            .products
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.stock)
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let product = product.into_product(ProductId::new(), Utc::now());
        self.state.write().await.products.push(product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let (product, barrier) = {
            let state = self.state.read().await;
            let product = state.products.iter().find(|p| p.id == id).cloned();
            (product, state.read_barrier.clone())
        };
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }
        Ok(product)
    }

    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        let mut products: Vec<_> = state
            .products
            .iter()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate(products, query.offset, query.limit))
    }

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product> {
        let mut state = self.state.write().await;
        let product = state.product_mut(id)?;
        update.apply(product);
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.products.len();
        state.products.retain(|p| p.id != id);
        Ok(state.products.len() != before)
    }

    async fn set_stock(&self, id: ProductId, stock: i32) -> Result<()> {
        let mut state = self.state.write().await;
        state.check(FailPoint::AdjustStock)?;
        let product = state.product_mut(id)?;
        product.stock = stock;
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn decrement_stock_if_available(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<Option<i32>> {
        let mut state = self.state.write().await;
        state.check(FailPoint::AdjustStock)?;
        let product = state.product_mut(id)?;
        let quantity = i64::from(quantity);
        if i64::from(product.stock) < quantity {
            return Ok(None);
        }
        // stock >= quantity >= 0, so the difference fits in i32
        product.stock = (i64::from(product.stock) - quantity) as i32;
        product.updated_at = Utc::now();
        Ok(Some(product.stock))
    }

    async fn increment_stock(&self, id: ProductId, quantity: u32) -> Result<i32> {
        let mut state = self.state.write().await;
        state.check(FailPoint::Restock)?;
        let product = state.product_mut(id)?;
        let quantity = i32::try_from(quantity)
            .map_err(|_| StoreError::InvalidData(format!("quantity {quantity} out of range")))?;
        product.stock = product.stock.saturating_add(quantity);
        product.updated_at = Utc::now();
        Ok(product.stock)
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn get_active_cart(&self, user_id: UserId) -> Result<Option<Cart>> {
        let state = self.state.read().await;
        Ok(state
            .carts
            .iter()
            .find(|c| c.user_id == user_id && c.active)
            .cloned())
    }

    async fn create_cart(&self, user_id: UserId) -> Result<Cart> {
        let mut state = self.state.write().await;
        if state.carts.iter().any(|c| c.user_id == user_id && c.active) {
            return Err(StoreError::Conflict(format!(
                "user {user_id} already has an active cart"
            )));
        }
        let cart = Cart {
            id: CartId::new(),
            user_id,
            active: true,
            created_at: Utc::now(),
        };
        state.carts.push(cart.clone());
        Ok(cart)
    }

    async fn list_cart_items(&self, cart_id: CartId) -> Result<Vec<CartItem>> {
        let state = self.state.read().await;
        Ok(state
            .cart_items
            .iter()
            .filter(|i| i.cart_id == cart_id)
            .cloned()
            .collect())
    }

    async fn upsert_cart_item(&self, cart_id: CartId, item: NewCartItem) -> Result<CartItem> {
        let mut state = self.state.write().await;
        if !state.carts.iter().any(|c| c.id == cart_id) {
            return Err(StoreError::not_found("Cart", cart_id));
        }
        if let Some(existing) = state
            .cart_items
            .iter_mut()
            .find(|i| i.cart_id == cart_id && i.same_line(&item))
        {
            existing.quantity = item.quantity;
            return Ok(existing.clone());
        }
        let line = CartItem {
            id: CartItemId::new(),
            cart_id,
            product_id: item.product_id,
            quantity: item.quantity,
            size: item.size,
            color: item.color,
            added_at: Utc::now(),
        };
        state.cart_items.push(line.clone());
        Ok(line)
    }

    async fn update_cart_item_quantity(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<CartItem> {
        let mut state = self.state.write().await;
        let line = state
            .cart_items
            .iter_mut()
            .find(|i| i.cart_id == cart_id && i.id == item_id)
            .ok_or_else(|| StoreError::not_found("CartItem", item_id))?;
        line.quantity = quantity;
        Ok(line.clone())
    }

    async fn remove_cart_item(&self, cart_id: CartId, item_id: CartItemId) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.cart_items.len();
        state
            .cart_items
            .retain(|i| !(i.cart_id == cart_id && i.id == item_id));
        Ok(state.cart_items.len() != before)
    }

    async fn clear_cart(&self, cart_id: CartId) -> Result<()> {
        self.state
            .write()
            .await
            .cart_items
            .retain(|i| i.cart_id != cart_id);
        Ok(())
    }

    async fn deactivate_cart(&self, cart_id: CartId) -> Result<()> {
        let mut state = self.state.write().await;
        let cart = state
            .carts
            .iter_mut()
            .find(|c| c.id == cart_id)
            .ok_or_else(|| StoreError::not_found("Cart", cart_id))?;
        cart.active = false;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: NewOrder) -> Result<Order> {
        let mut state = self.state.write().await;
        state.check(FailPoint::InsertOrder)?;
        if let Some(ref key) = order.idempotency_key
            && state
                .orders
                .iter()
                .any(|o| o.idempotency_key.as_ref() == Some(key))
        {
            return Err(StoreError::Conflict(format!(
                "duplicate idempotency key {key}"
            )));
        }
        let order = order.into_order(OrderId::new(), Utc::now());
        state.orders.push(order.clone());
        Ok(order)
    }

    async fn insert_order_items(
        &self,
        order_id: OrderId,
        items: Vec<NewOrderItem>,
    ) -> Result<Vec<OrderItem>> {
        let mut state = self.state.write().await;
        state.check(FailPoint::InsertOrderItems)?;
        if !state.orders.iter().any(|o| o.id == order_id) {
            return Err(StoreError::not_found("Order", order_id));
        }
        let rows: Vec<OrderItem> = items
            .into_iter()
            .map(|item| item.into_item(order_id))
            .collect();
        state.order_items.extend(rows.iter().cloned());
        Ok(rows)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn find_order_by_idempotency_key(&self, key: &str) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .find(|o| o.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        // insertion order is creation order; newest first
        let orders: Vec<_> = state
            .orders
            .iter()
            .rev()
            .filter(|o| query.matches(o))
            .cloned()
            .collect();
        Ok(paginate(orders, query.offset, query.limit))
    }

    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let state = self.state.read().await;
        Ok(state
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_all_order_items(&self) -> Result<Vec<OrderItem>> {
        Ok(self.state.read().await.order_items.clone())
    }

    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state.order_mut(id)?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn update_payment_status(&self, id: OrderId, status: PaymentStatus) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state.order_mut(id)?;
        order.payment_status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn release_idempotency_key(&self, id: OrderId) -> Result<bool> {
        let mut state = self.state.write().await;
        state.check(FailPoint::ReleaseIdempotencyKey)?;
        match state.orders.iter_mut().find(|o| o.id == id) {
            Some(order) => {
                order.idempotency_key = None;
                order.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool> {
        let mut state = self.state.write().await;
        state.check(FailPoint::DeleteOrder)?;
        let before = state.orders.len();
        state.orders.retain(|o| o.id != id);
        Ok(state.orders.len() != before)
    }

    async fn delete_order_items(&self, order_id: OrderId) -> Result<u64> {
        let mut state = self.state.write().await;
        state.check(FailPoint::DeleteOrderItems)?;
        let before = state.order_items.len();
        state.order_items.retain(|i| i.order_id != order_id);
        Ok((before - state.order_items.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CustomerDetails, OrderStoreExt};
    use common::Money;

    fn new_order(key: Option<&str>) -> NewOrder {
        NewOrder {
            user_id: Some(UserId::new()),
            customer: CustomerDetails::default(),
            subtotal: Money::from_cents(2000),
            shipping: Money::from_cents(500),
            tax: Money::from_cents(160),
            total: Money::from_cents(2660),
            idempotency_key: key.map(String::from),
        }
    }

    fn new_item(product_id: ProductId, quantity: u32) -> NewOrderItem {
        NewOrderItem {
            product_id,
            product_name: "Widget".to_string(),
            quantity,
            unit_price: Money::from_cents(1000),
            size: None,
            color: None,
            image: None,
        }
    }

    #[tokio::test]
    async fn insert_and_get_product() {
        let store = InMemoryStore::new();
        let product = store
            .insert_product(NewProduct::new("Widget", Money::from_cents(1000), 5))
            .await
            .unwrap();

        let loaded = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(loaded, product);
        assert!(store.get_product(ProductId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_products_sorted_and_filtered() {
        let store = InMemoryStore::new();
        for (name, category) in [("Zip Hoodie", "tops"), ("Anorak", "outerwear"), ("Tee", "tops")] {
            store
                .insert_product(
                    NewProduct::new(name, Money::from_cents(1000), 1).with_category(category),
                )
                .await
                .unwrap();
        }

        let all = store.list_products(ProductQuery::new()).await.unwrap();
        let names: Vec<_> = all.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Anorak", "Tee", "Zip Hoodie"]);

        let tops = store
            .list_products(ProductQuery::new().category("tops").limit(1))
            .await
            .unwrap();
        assert_eq!(tops.len(), 1);
        assert_eq!(tops[0].name, "Tee");
    }

    #[tokio::test]
    async fn set_stock_allows_negative_values() {
        let store = InMemoryStore::new();
        let product = store
            .insert_product(NewProduct::new("Widget", Money::from_cents(1000), 1))
            .await
            .unwrap();

        store.set_stock(product.id, -1).await.unwrap();
        assert_eq!(store.stock_of(product.id).await, Some(-1));
    }

    #[tokio::test]
    async fn conditional_decrement_guards_stock() {
        let store = InMemoryStore::new();
        let product = store
            .insert_product(NewProduct::new("Widget", Money::from_cents(1000), 3))
            .await
            .unwrap();

        assert_eq!(
            store
                .decrement_stock_if_available(product.id, 2)
                .await
                .unwrap(),
            Some(1)
        );
        assert_eq!(
            store
                .decrement_stock_if_available(product.id, 2)
                .await
                .unwrap(),
            None
        );
        assert_eq!(store.stock_of(product.id).await, Some(1));

        let missing = store.decrement_stock_if_available(ProductId::new(), 1).await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn increment_stock_adds_units() {
        let store = InMemoryStore::new();
        let product = store
            .insert_product(NewProduct::new("Widget", Money::from_cents(1000), 0))
            .await
            .unwrap();
        assert_eq!(store.increment_stock(product.id, 4).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn cart_upsert_merges_same_line() {
        let store = InMemoryStore::new();
        let user = UserId::new();
        let cart = store.create_cart(user).await.unwrap();
        let product_id = ProductId::new();

        let first = store
            .upsert_cart_item(cart.id, NewCartItem::new(product_id, 1))
            .await
            .unwrap();
        let second = store
            .upsert_cart_item(cart.id, NewCartItem::new(product_id, 3))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 3);
        assert_eq!(store.list_cart_items(cart.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn one_active_cart_per_user() {
        let store = InMemoryStore::new();
        let user = UserId::new();
        let cart = store.create_cart(user).await.unwrap();

        assert!(matches!(
            store.create_cart(user).await,
            Err(StoreError::Conflict(_))
        ));

        store.deactivate_cart(cart.id).await.unwrap();
        assert!(store.get_active_cart(user).await.unwrap().is_none());
        assert!(store.create_cart(user).await.is_ok());
    }

    #[tokio::test]
    async fn insert_order_with_items() {
        let store = InMemoryStore::new();
        let order = store.insert_order(new_order(None)).await.unwrap();
        let product_id = ProductId::new();

        store
            .insert_order_items(order.id, vec![new_item(product_id, 2), new_item(product_id, 1)])
            .await
            .unwrap();

        let (loaded, items) = store.get_order_with_items(order.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, order.id);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].line_total().cents(), 2000);
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_conflicts() {
        let store = InMemoryStore::new();
        store.insert_order(new_order(Some("chk-1"))).await.unwrap();

        let result = store.insert_order(new_order(Some("chk-1"))).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let found = store.find_order_by_idempotency_key("chk-1").await.unwrap();
        assert!(found.is_some());
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn released_key_frees_it_for_a_new_order() {
        let store = InMemoryStore::new();
        let order = store.insert_order(new_order(Some("chk-2"))).await.unwrap();

        assert!(store.release_idempotency_key(order.id).await.unwrap());
        assert!(store.find_order_by_idempotency_key("chk-2").await.unwrap().is_none());
        assert!(store.get_order(order.id).await.unwrap().is_some());

        store.insert_order(new_order(Some("chk-2"))).await.unwrap();
        assert_eq!(store.order_count().await, 2);
        assert!(!store.release_idempotency_key(OrderId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn injected_failure_leaves_no_rows() {
        let store = InMemoryStore::new();
        let order = store.insert_order(new_order(None)).await.unwrap();
        store.fail_on(FailPoint::InsertOrderItems).await;

        let result = store
            .insert_order_items(order.id, vec![new_item(ProductId::new(), 1)])
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.order_item_count().await, 0);

        store.clear_failures().await;
        assert!(
            store
                .insert_order_items(order.id, vec![new_item(ProductId::new(), 1)])
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn fail_on_call_hits_only_that_call() {
        let store = InMemoryStore::new();
        let product = store
            .insert_product(NewProduct::new("Widget", Money::from_cents(1000), 5))
            .await
            .unwrap();
        store.fail_on_call(FailPoint::AdjustStock, 2).await;

        assert!(store.set_stock(product.id, 4).await.is_ok());
        assert!(store.set_stock(product.id, 3).await.is_err());
        assert!(store.set_stock(product.id, 2).await.is_ok());
        assert_eq!(store.stock_of(product.id).await, Some(2));
    }

    #[tokio::test]
    async fn list_orders_newest_first_with_pagination() {
        let store = InMemoryStore::new();
        let first = store.insert_order(new_order(None)).await.unwrap();
        let second = store.insert_order(new_order(None)).await.unwrap();
        let third = store.insert_order(new_order(None)).await.unwrap();

        let orders = store.list_orders(OrderQuery::new()).await.unwrap();
        let ids: Vec<_> = orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, [third.id, second.id, first.id]);

        let page = store
            .list_orders(OrderQuery::new().offset(1).limit(1))
            .await
            .unwrap();
        assert_eq!(page[0].id, second.id);
    }

    #[tokio::test]
    async fn update_statuses() {
        let store = InMemoryStore::new();
        let order = store.insert_order(new_order(None)).await.unwrap();

        let updated = store
            .update_order_status(order.id, OrderStatus::Processing)
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Processing);

        let updated = store
            .update_payment_status(order.id, PaymentStatus::Paid)
            .await
            .unwrap();
        assert_eq!(updated.payment_status, PaymentStatus::Paid);

        let missing = store
            .update_order_status(OrderId::new(), OrderStatus::Shipped)
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn delete_order_and_items() {
        let store = InMemoryStore::new();
        let order = store.insert_order(new_order(None)).await.unwrap();
        store
            .insert_order_items(order.id, vec![new_item(ProductId::new(), 1)])
            .await
            .unwrap();

        assert_eq!(store.delete_order_items(order.id).await.unwrap(), 1);
        assert!(store.delete_order(order.id).await.unwrap());
        assert!(!store.delete_order(order.id).await.unwrap());
        assert_eq!(store.order_count().await, 0);
    }
}
