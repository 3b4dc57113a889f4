//! The order writer.
//!
//! Placing an order is three separate store calls with no transaction around
//! them: insert the order row, insert its lines in one batch, then take each
//! line's quantity out of stock. When a later step fails, the earlier writes
//! are undone in reverse order on a best-effort basis.

use std::time::Instant;

use common::{Money, OrderId, ProductId, UserId};
use domain::{CartLine, ShippingForm, ValidationErrors};
use serde::{Deserialize, Serialize};
use store::{CustomerDetails, NewOrder, NewOrderItem, Order, OrderItem, Store, StoreError};

use crate::{CheckoutError, Result, StockPolicy, WriteStage};

/// One cart line as submitted at checkout.
///
/// Name, price, variant and image are the copies shown in the cart and are
/// stored on the order line as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLine {
    #[serde(alias = "id")]
    pub product_id: ProductId,
    #[serde(alias = "name", default)]
    pub product_name: String,
    pub quantity: u32,
    #[serde(alias = "price")]
    pub unit_price: Money,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl CheckoutLine {
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
            size: None,
            color: None,
            image: None,
        }
    }

    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }

    fn to_new_item(&self) -> NewOrderItem {
        NewOrderItem {
            product_id: self.product_id,
            product_name: self.product_name.clone(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            size: self.size.clone(),
            color: self.color.clone(),
            image: self.image.clone(),
        }
    }
}

impl From<&CartLine> for CheckoutLine {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.item.product_id,
            product_name: line.product_name.clone(),
            quantity: line.item.quantity,
            unit_price: line.unit_price,
            size: line.item.size.clone(),
            color: line.item.color.clone(),
            image: line.image.clone(),
        }
    }
}

/// A request to place one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrder {
    pub user_id: Option<UserId>,
    pub customer: CustomerDetails,
    pub lines: Vec<CheckoutLine>,
    pub shipping: Money,
    pub tax: Money,
    /// Total as computed by the client; must match the lines.
    pub total: Money,
    /// When set, a repeated submit with the same key returns the first order.
    pub idempotency_key: Option<String>,
}

impl PlaceOrder {
    pub fn new(
        customer: CustomerDetails,
        lines: Vec<CheckoutLine>,
        shipping: Money,
        tax: Money,
        total: Money,
    ) -> Self {
        Self {
            user_id: None,
            customer,
            lines,
            shipping,
            tax,
            total,
            idempotency_key: None,
        }
    }

    /// Builds a request from a shipping form, validating it first.
    pub fn from_form(
        form: &ShippingForm,
        lines: Vec<CheckoutLine>,
        shipping: Money,
        tax: Money,
        total: Money,
    ) -> Result<Self> {
        form.validate()?;
        Ok(Self::new(form.to_customer(), lines, shipping, tax, total))
    }

    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CheckoutLine::line_total).sum()
    }

    /// Lines plus shipping plus tax, or `None` if any step overflows.
    pub fn expected_total(&self) -> Option<Money> {
        self.lines
            .iter()
            .try_fold(Money::zero(), |acc, line| {
                acc.checked_add(line.unit_price.checked_multiply(line.quantity)?)
            })?
            .checked_add(self.shipping)?
            .checked_add(self.tax)
    }

    fn check(&self) -> Result<()> {
        if self.lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        if let Some(line) = self
            .lines
            .iter()
            .find(|l| l.quantity == 0 || i32::try_from(l.quantity).is_err())
        {
            return Err(CheckoutError::InvalidQuantity {
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }

        let mut errors = ValidationErrors::new();
        if self.lines.iter().any(|l| l.unit_price.is_negative()) {
            errors.add("cartItems", "prices must not be negative");
        }
        if self.shipping.is_negative() {
            errors.add("shipping", "must not be negative");
        }
        if self.tax.is_negative() {
            errors.add("tax", "must not be negative");
        }
        errors.into_result()?;

        let Some(expected) = self.expected_total() else {
            return Err(ValidationErrors::single("total", "amount is out of range").into());
        };
        if expected != self.total {
            return Err(CheckoutError::TotalMismatch {
                expected,
                submitted: self.total,
            });
        }
        Ok(())
    }
}

/// An order with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Outcome of a successful placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// A new order was written.
    Created(PlacedOrder),
    /// The idempotency key matched an earlier order; nothing was written.
    Existing(PlacedOrder),
}

impl Placement {
    pub fn is_new(&self) -> bool {
        matches!(self, Placement::Created(_))
    }

    pub fn placed(&self) -> &PlacedOrder {
        match self {
            Placement::Created(placed) | Placement::Existing(placed) => placed,
        }
    }

    pub fn order(&self) -> &Order {
        &self.placed().order
    }

    pub fn into_placed(self) -> PlacedOrder {
        match self {
            Placement::Created(placed) | Placement::Existing(placed) => placed,
        }
    }
}

/// Writes orders, their lines and the matching stock changes.
#[derive(Clone)]
pub struct OrderWriter<S> {
    store: S,
    policy: StockPolicy,
}

impl<S: Store> OrderWriter<S> {
    pub fn new(store: S, policy: StockPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> StockPolicy {
        self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Places an order: insert order, insert lines, adjust stock.
    #[tracing::instrument(
        skip(self, request),
        fields(lines = request.lines.len(), policy = %self.policy)
    )]
    pub async fn place(&self, request: PlaceOrder) -> Result<Placement> {
        let start = Instant::now();
        let result = self.write(request).await;
        metrics::histogram!("order_placement_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(Placement::Created(placed)) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    order_id = %placed.order.id,
                    total = %placed.order.total,
                    "Order placed"
                );
            }
            Ok(Placement::Existing(placed)) => {
                tracing::info!(order_id = %placed.order.id, "Idempotency key replayed");
            }
            Err(e) => {
                metrics::counter!("orders_failed_total").increment(1);
                tracing::warn!(error = %e, "Order placement failed");
            }
        }
        result
    }

    async fn write(&self, request: PlaceOrder) -> Result<Placement> {
        request.check()?;

        if let Some(ref key) = request.idempotency_key
            && let Some(existing) = self.existing(key).await?
        {
            return Ok(Placement::Existing(existing));
        }

        let new_items: Vec<NewOrderItem> = request
            .lines
            .iter()
            .map(CheckoutLine::to_new_item)
            .collect();

        let order = match self
            .store
            .insert_order(NewOrder {
                user_id: request.user_id,
                customer: request.customer.clone(),
                subtotal: request.subtotal(),
                shipping: request.shipping,
                tax: request.tax,
                total: request.total,
                idempotency_key: request.idempotency_key.clone(),
            })
            .await
        {
            Ok(order) => order,
            Err(StoreError::Conflict(reason)) => {
                // a concurrent submit with the same key won the insert
                if let Some(ref key) = request.idempotency_key
                    && let Some(existing) = self.existing(key).await?
                {
                    return Ok(Placement::Existing(existing));
                }
                return Err(StoreError::Conflict(reason).into());
            }
            Err(e) => return Err(e.into()),
        };
        let mut stage = WriteStage::Created;
        tracing::debug!(order_id = %order.id, %stage, "Order row inserted");

        stage = WriteStage::ItemsPending;
        let items = match self.store.insert_order_items(order.id, new_items).await {
            Ok(items) => items,
            Err(e) => {
                self.roll_back(order.id, stage, &[]).await;
                return Err(e.into());
            }
        };

        stage = WriteStage::ItemsCommitted;
        let mut adjusted: Vec<(ProductId, u32)> = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            match self.adjust_stock(line).await {
                Ok(stock) => {
                    metrics::counter!("stock_adjustments_total").increment(1);
                    tracing::debug!(
                        order_id = %order.id,
                        product_id = %line.product_id,
                        quantity = line.quantity,
                        stock,
                        "Stock adjusted"
                    );
                    adjusted.push((line.product_id, line.quantity));
                }
                Err(e) => {
                    self.roll_back(order.id, stage, &adjusted).await;
                    return Err(e);
                }
            }
        }

        stage = WriteStage::StockAdjusted;
        tracing::debug!(order_id = %order.id, %stage, "Order write finished");
        Ok(Placement::Created(PlacedOrder { order, items }))
    }

    /// The order an idempotency key already placed.
    ///
    /// Every placed order has at least one line, so a keyed row without
    /// lines is never replayed as a success.
    async fn existing(&self, key: &str) -> Result<Option<PlacedOrder>> {
        let Some(order) = self.store.find_order_by_idempotency_key(key).await? else {
            return Ok(None);
        };
        let items = self.store.list_order_items(order.id).await?;
        if items.is_empty() {
            return Err(CheckoutError::IncompleteOrder(order.id));
        }
        Ok(Some(PlacedOrder { order, items }))
    }

    /// Takes one line's quantity out of stock and returns the new stock.
    async fn adjust_stock(&self, line: &CheckoutLine) -> Result<i32> {
        let product_id = line.product_id;
        match self.policy {
            StockPolicy::ReadModifyWrite => {
                let product = self
                    .store
                    .get_product(product_id)
                    .await?
                    .ok_or(CheckoutError::ProductNotFound(product_id))?;
                let quantity =
                    i32::try_from(line.quantity).map_err(|_| CheckoutError::InvalidQuantity {
                        product_id,
                        quantity: line.quantity,
                    })?;
                let stock = product.stock.saturating_sub(quantity);
                self.store.set_stock(product_id, stock).await?;
                Ok(stock)
            }
            StockPolicy::Conditional => {
                match self
                    .store
                    .decrement_stock_if_available(product_id, line.quantity)
                    .await
                {
                    Ok(Some(stock)) => Ok(stock),
                    Ok(None) => {
                        let available = self
                            .store
                            .get_product(product_id)
                            .await?
                            .map(|p| p.stock)
                            .unwrap_or(0);
                        Err(CheckoutError::InsufficientStock {
                            product_id,
                            requested: line.quantity,
                            available,
                        })
                    }
                    Err(StoreError::NotFound { .. }) => {
                        Err(CheckoutError::ProductNotFound(product_id))
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    /// Undoes a failed write. The idempotency key is released first so a
    /// retry never matches the row being undone; then, in reverse order,
    /// the lines already taken out of stock are restocked, the lines are
    /// deleted and the order is deleted.
    ///
    /// Each step is attempted once. Failures are logged and counted and
    /// never replace the error that caused the rollback.
    #[tracing::instrument(skip(self, adjusted), fields(adjusted = adjusted.len()))]
    async fn roll_back(&self, order_id: OrderId, stage: WriteStage, adjusted: &[(ProductId, u32)]) {
        metrics::counter!("order_rollbacks_total").increment(1);
        tracing::warn!(%order_id, %stage, "Rolling back order write");

        let mut failures: u64 = 0;

        if let Err(e) = self.store.release_idempotency_key(order_id).await {
            failures += 1;
            tracing::error!(%order_id, error = %e, "Failed to release idempotency key during rollback");
        }

        for (product_id, quantity) in adjusted.iter().rev() {
            if let Err(e) = self.store.increment_stock(*product_id, *quantity).await {
                failures += 1;
                tracing::error!(
                    %order_id,
                    %product_id,
                    quantity,
                    error = %e,
                    "Failed to restock during rollback"
                );
            }
        }

        // the line batch is all-or-nothing, so a failed insert left none behind
        if stage == WriteStage::ItemsCommitted
            && let Err(e) = self.store.delete_order_items(order_id).await
        {
            failures += 1;
            tracing::error!(%order_id, error = %e, "Failed to delete order items during rollback");
        }

        if let Err(e) = self.store.delete_order(order_id).await {
            failures += 1;
            tracing::error!(%order_id, error = %e, "Failed to delete order during rollback");
        }

        if failures > 0 {
            metrics::counter!("order_compensation_failures_total").increment(failures);
        } else {
            tracing::info!(%order_id, stage = %WriteStage::RolledBack, "Order write rolled back");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{FailPoint, InMemoryStore, NewProduct, ProductStore};

    async fn setup(policy: StockPolicy, stock: i32) -> (OrderWriter<InMemoryStore>, InMemoryStore, ProductId) {
        let store = InMemoryStore::new();
        let product = store
            .insert_product(NewProduct::new("Trail Runner", Money::from_cents(9000), stock))
            .await
            .unwrap();
        (OrderWriter::new(store.clone(), policy), store, product.id)
    }

    fn request(product_id: ProductId, quantity: u32) -> PlaceOrder {
        let line = CheckoutLine::new(product_id, "Trail Runner", quantity, Money::from_cents(9000));
        let total = line.line_total() + Money::from_cents(700);
        PlaceOrder::new(
            CustomerDetails::default(),
            vec![line],
            Money::from_cents(500),
            Money::from_cents(200),
            total,
        )
    }

    #[tokio::test]
    async fn test_rejects_empty_cart() {
        let (writer, store, _) = setup(StockPolicy::default(), 1).await;
        let mut req = request(ProductId::new(), 1);
        req.lines.clear();

        assert!(matches!(writer.place(req).await, Err(CheckoutError::EmptyCart)));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_rejects_zero_quantity() {
        let (writer, _, product_id) = setup(StockPolicy::default(), 1).await;
        let mut req = request(product_id, 1);
        req.lines[0].quantity = 0;

        assert!(matches!(
            writer.place(req).await,
            Err(CheckoutError::InvalidQuantity { quantity: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_total_mismatch() {
        let (writer, store, product_id) = setup(StockPolicy::default(), 1).await;
        let mut req = request(product_id, 1);
        req.total = Money::from_cents(1);

        let result = writer.place(req).await;
        assert!(matches!(
            result,
            Err(CheckoutError::TotalMismatch { expected, .. }) if expected.cents() == 9700
        ));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_rejects_negative_tax() {
        let (writer, _, product_id) = setup(StockPolicy::default(), 1).await;
        let mut req = request(product_id, 1);
        req.tax = Money::from_cents(-200);
        req.total = Money::from_cents(9300);

        let Err(CheckoutError::Validation(errors)) = writer.place(req).await else {
            panic!("expected validation error");
        };
        assert!(errors.has("tax"));
    }

    #[tokio::test]
    async fn test_rejects_total_that_overflows() {
        let (writer, store, product_id) = setup(StockPolicy::default(), 5).await;
        let mut req = request(product_id, 2);
        req.lines[0].unit_price = Money::from_cents(i64::MAX / 2 + 1);
        req.total = Money::from_cents(1200);

        let Err(CheckoutError::Validation(errors)) = writer.place(req).await else {
            panic!("expected validation error");
        };
        assert!(errors.has("total"));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.stock_of(product_id).await, Some(5));
    }

    #[tokio::test]
    async fn test_successful_placement_writes_everything() {
        let (writer, store, product_id) = setup(StockPolicy::default(), 5).await;

        let placement = writer.place(request(product_id, 2)).await.unwrap();
        assert!(placement.is_new());

        let placed = placement.placed();
        assert_eq!(placed.items.len(), 1);
        assert_eq!(placed.order.subtotal.cents(), 18000);
        assert_eq!(placed.order.total.cents(), 18700);
        assert_eq!(store.stock_of(product_id).await, Some(3));
    }

    #[tokio::test]
    async fn test_missing_product_rolls_back() {
        let (writer, store, _) = setup(StockPolicy::default(), 5).await;

        let result = writer.place(request(ProductId::new(), 1)).await;
        assert!(matches!(result, Err(CheckoutError::ProductNotFound(_))));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.order_item_count().await, 0);
    }

    #[tokio::test]
    async fn test_conditional_rejects_oversell() {
        let (writer, store, product_id) = setup(StockPolicy::Conditional, 1).await;

        let result = writer.place(request(product_id, 2)).await;
        assert!(matches!(
            result,
            Err(CheckoutError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            })
        ));
        assert_eq!(store.stock_of(product_id).await, Some(1));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_items_failure_deletes_order_only() {
        let (writer, store, product_id) = setup(StockPolicy::default(), 5).await;
        store.fail_on(FailPoint::InsertOrderItems).await;

        let result = writer.place(request(product_id, 1)).await;
        assert!(matches!(result, Err(CheckoutError::Store(StoreError::Unavailable(_)))));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.order_item_count().await, 0);
        assert_eq!(store.stock_of(product_id).await, Some(5));
    }

    #[test]
    fn test_checkout_line_accepts_cart_item_shape() {
        let product_id = ProductId::new();
        let json = serde_json::json!({
            "id": product_id.to_string(),
            "name": "Trail Runner",
            "price": 9000,
            "quantity": 2,
            "size": "42"
        });

        let line: CheckoutLine = serde_json::from_value(json).unwrap();
        assert_eq!(line.product_id, product_id);
        assert_eq!(line.unit_price.cents(), 9000);
        assert_eq!(line.size.as_deref(), Some("42"));
        assert_eq!(line.line_total().cents(), 18000);
    }
}
