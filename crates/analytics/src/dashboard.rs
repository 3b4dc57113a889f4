//! Admin dashboard summary.

use std::collections::{BTreeMap, HashMap, HashSet};

use common::{Money, OrderId, OrderStatus, PaymentStatus, ProductId};
use serde::Serialize;
use store::{Order, OrderItem, OrderQuery, Product, ProductQuery, Store};

use crate::RECENT_ORDER_COUNT;

/// Units sold and revenue for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub product_id: ProductId,
    pub product_name: String,
    pub units_sold: u64,
    pub revenue: Money,
}

/// A product whose stock is below the alert threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAlert {
    pub product_id: ProductId,
    pub name: String,
    pub stock: i32,
}

/// Headline figures for the admin dashboard.
///
/// Revenue, average order value and product sales only count orders that
/// are neither cancelled nor refunded. Order counts include every order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_revenue: Money,
    pub order_count: usize,
    pub average_order_value: Money,
    /// Every order status, zero counts included.
    pub orders_by_status: BTreeMap<&'static str, usize>,
    /// Every payment status, zero counts included.
    pub orders_by_payment_status: BTreeMap<&'static str, usize>,
    /// Distinct customer emails, compared case-insensitively.
    pub unique_customers: usize,
    pub top_products: Vec<ProductSales>,
    /// Lowest stock first. Oversold products show up with negative stock.
    pub low_stock: Vec<StockAlert>,
    /// Newest first.
    pub recent_orders: Vec<Order>,
}

/// Whether an order's money still counts as earned.
fn counts_as_revenue(order: &Order) -> bool {
    order.status != OrderStatus::Cancelled && order.payment_status != PaymentStatus::Refunded
}

impl DashboardSummary {
    pub fn compute(
        orders: &[Order],
        items: &[OrderItem],
        products: &[Product],
        low_stock_threshold: i32,
        top_n: usize,
    ) -> Self {
        let earning: HashSet<OrderId> = orders
            .iter()
            .filter(|o| counts_as_revenue(o))
            .map(|o| o.id)
            .collect();

        let total_revenue: Money = orders
            .iter()
            .filter(|o| earning.contains(&o.id))
            .map(|o| o.total)
            .sum();
        let average_order_value = if earning.is_empty() {
            Money::zero()
        } else {
            Money::from_cents(total_revenue.cents() / earning.len() as i64)
        };

        let mut orders_by_status: BTreeMap<&'static str, usize> =
            OrderStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
        let mut orders_by_payment_status: BTreeMap<&'static str, usize> =
            PaymentStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
        for order in orders {
            *orders_by_status.entry(order.status.as_str()).or_default() += 1;
            *orders_by_payment_status
                .entry(order.payment_status.as_str())
                .or_default() += 1;
        }

        let unique_customers = orders
            .iter()
            .map(|o| o.customer.email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .collect::<HashSet<_>>()
            .len();

        Self {
            total_revenue,
            order_count: orders.len(),
            average_order_value,
            orders_by_status,
            orders_by_payment_status,
            unique_customers,
            top_products: top_products(items, &earning, top_n),
            low_stock: low_stock(products, low_stock_threshold),
            recent_orders: recent_orders(orders),
        }
    }

    /// Fetches every order, order line and product, then computes the summary.
    #[tracing::instrument(skip(store))]
    pub async fn load<S: Store>(
        store: &S,
        low_stock_threshold: i32,
        top_n: usize,
    ) -> store::Result<Self> {
        let orders = store.list_orders(OrderQuery::new()).await?;
        let items = store.list_all_order_items().await?;
        let products = store.list_products(ProductQuery::new()).await?;
        tracing::debug!(
            orders = orders.len(),
            items = items.len(),
            products = products.len(),
            "Computing dashboard"
        );
        Ok(Self::compute(
            &orders,
            &items,
            &products,
            low_stock_threshold,
            top_n,
        ))
    }
}

fn top_products(items: &[OrderItem], earning: &HashSet<OrderId>, top_n: usize) -> Vec<ProductSales> {
    let mut sales: HashMap<ProductId, ProductSales> = HashMap::new();
    for item in items.iter().filter(|i| earning.contains(&i.order_id)) {
        let entry = sales.entry(item.product_id).or_insert_with(|| ProductSales {
            product_id: item.product_id,
            product_name: item.product_name.clone(),
            units_sold: 0,
            revenue: Money::zero(),
        });
        entry.units_sold += u64::from(item.quantity);
        entry.revenue += item.line_total();
    }

    let mut ranked: Vec<ProductSales> = sales.into_values().collect();
    ranked.sort_by(|a, b| {
        b.units_sold
            .cmp(&a.units_sold)
            .then_with(|| b.revenue.cmp(&a.revenue))
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
    ranked.truncate(top_n);
    ranked
}

fn low_stock(products: &[Product], threshold: i32) -> Vec<StockAlert> {
    let mut alerts: Vec<StockAlert> = products
        .iter()
        .filter(|p| p.stock < threshold)
        .map(|p| StockAlert {
            product_id: p.id,
            name: p.name.clone(),
            stock: p.stock,
        })
        .collect();
    alerts.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));
    alerts
}

fn recent_orders(orders: &[Order]) -> Vec<Order> {
    let mut recent: Vec<&Order> = orders.iter().collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    recent
        .into_iter()
        .take(RECENT_ORDER_COUNT)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use common::OrderItemId;
    use store::CustomerDetails;

    fn order(email: &str, total: i64, minutes_ago: i64) -> Order {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        Order {
            id: OrderId::new(),
            user_id: None,
            customer: CustomerDetails {
                email: email.to_string(),
                ..Default::default()
            },
            subtotal: Money::from_cents(total),
            shipping: Money::zero(),
            tax: Money::zero(),
            total: Money::from_cents(total),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            idempotency_key: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn item(order: &Order, product_id: ProductId, name: &str, quantity: u32, price: i64) -> OrderItem {
        OrderItem {
            id: OrderItemId::new(),
            order_id: order.id,
            product_id,
            product_name: name.to_string(),
            quantity,
            unit_price: Money::from_cents(price),
            size: None,
            color: None,
            image: None,
        }
    }

    fn product(name: &str, stock: i32) -> Product {
        Product {
            id: ProductId::new(),
            name: name.to_string(),
            description: String::new(),
            price: Money::from_cents(1000),
            category: "misc".to_string(),
            stock,
            images: vec![],
            sizes: vec![],
            colors: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_dashboard() {
        let summary = DashboardSummary::compute(&[], &[], &[], 5, 3);
        assert_eq!(summary.total_revenue, Money::zero());
        assert_eq!(summary.average_order_value, Money::zero());
        assert_eq!(summary.order_count, 0);
        assert_eq!(summary.orders_by_status.len(), OrderStatus::ALL.len());
        assert!(summary.orders_by_status.values().all(|&n| n == 0));
        assert!(summary.top_products.is_empty());
        assert!(summary.recent_orders.is_empty());
    }

    #[test]
    fn test_revenue_skips_cancelled_and_refunded() {
        let kept = order("a@example.com", 3000, 3);
        let mut cancelled = order("b@example.com", 9000, 2);
        cancelled.status = OrderStatus::Cancelled;
        let mut refunded = order("c@example.com", 7000, 1);
        refunded.payment_status = PaymentStatus::Refunded;
        let paid = order("d@example.com", 1000, 0);

        let summary = DashboardSummary::compute(&[kept, cancelled, refunded, paid], &[], &[], 5, 3);

        assert_eq!(summary.total_revenue.cents(), 4000);
        assert_eq!(summary.average_order_value.cents(), 2000);
        assert_eq!(summary.order_count, 4);
        assert_eq!(summary.orders_by_status["cancelled"], 1);
        assert_eq!(summary.orders_by_status["pending"], 3);
        assert_eq!(summary.orders_by_payment_status["refunded"], 1);
    }

    #[test]
    fn test_unique_customers_ignore_case() {
        let orders = [
            order("Ada@Example.com", 100, 2),
            order("ada@example.com ", 100, 1),
            order("grace@example.com", 100, 0),
        ];
        let summary = DashboardSummary::compute(&orders, &[], &[], 5, 3);
        assert_eq!(summary.unique_customers, 2);
    }

    #[test]
    fn test_top_products_ranked_by_units() {
        let first = order("a@example.com", 0, 1);
        let mut cancelled = order("b@example.com", 0, 0);
        cancelled.status = OrderStatus::Cancelled;
        let hat = ProductId::new();
        let scarf = ProductId::new();
        let gloves = ProductId::new();

        let items = [
            item(&first, hat, "Hat", 2, 1500),
            item(&first, scarf, "Scarf", 5, 900),
            item(&first, gloves, "Gloves", 1, 2000),
            item(&cancelled, gloves, "Gloves", 10, 2000),
        ];
        let summary = DashboardSummary::compute(&[first, cancelled], &items, &[], 5, 2);

        assert_eq!(summary.top_products.len(), 2);
        assert_eq!(summary.top_products[0].product_name, "Scarf");
        assert_eq!(summary.top_products[0].units_sold, 5);
        assert_eq!(summary.top_products[0].revenue.cents(), 4500);
        assert_eq!(summary.top_products[1].product_id, hat);
    }

    #[test]
    fn test_low_stock_includes_oversold() {
        let products = [product("Plenty", 40), product("Few", 2), product("Oversold", -1)];
        let summary = DashboardSummary::compute(&[], &[], &products, 5, 3);

        let names: Vec<&str> = summary.low_stock.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Oversold", "Few"]);
        assert_eq!(summary.low_stock[0].stock, -1);
    }

    #[test]
    fn test_recent_orders_newest_five() {
        let orders: Vec<Order> = (0..7).map(|i| order("x@example.com", 100, i)).collect();
        let summary = DashboardSummary::compute(&orders, &[], &[], 5, 3);

        assert_eq!(summary.recent_orders.len(), RECENT_ORDER_COUNT);
        assert_eq!(summary.recent_orders[0].id, orders[0].id);
        assert_eq!(summary.recent_orders[4].id, orders[4].id);
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let summary = DashboardSummary::compute(&[order("a@example.com", 1250, 0)], &[], &[], 5, 3);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["totalRevenue"], 1250);
        assert_eq!(json["ordersByStatus"]["pending"], 1);
        assert!(json["recentOrders"].is_array());
    }
}
