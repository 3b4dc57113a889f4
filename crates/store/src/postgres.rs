use async_trait::async_trait;
use common::{
    CartId, CartItemId, Money, OrderId, OrderItemId, OrderStatus, PaymentStatus, ProductId, UserId,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Cart, CartItem, CustomerDetails, NewCartItem, NewOrder, NewOrderItem, NewProduct, Order,
    OrderItem, OrderQuery, Product, ProductQuery, ProductUpdate, Result, StoreError,
    store::{CartStore, OrderStore, ProductStore},
};

const PRODUCT_COLUMNS: &str = "id, name, description, price_cents, category, stock, images, sizes, colors, created_at, updated_at";

const CART_ITEM_COLUMNS: &str = "id, cart_id, product_id, quantity, size, color, added_at";

const ORDER_COLUMNS: &str = "id, user_id, customer, subtotal_cents, shipping_cents, tax_cents, total_cents, status, payment_status, idempotency_key, created_at, updated_at";

const ORDER_ITEM_COLUMNS: &str =
    "id, order_id, product_id, product_name, quantity, unit_price_cents, size, color, image";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        tracing::info!("Running storefront migrations");
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            category: row.try_get("category")?,
            stock: row.try_get("stock")?,
            images: serde_json::from_value(row.try_get::<serde_json::Value, _>("images")?)?,
            sizes: serde_json::from_value(row.try_get::<serde_json::Value, _>("sizes")?)?,
            colors: serde_json::from_value(row.try_get::<serde_json::Value, _>("colors")?)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_cart(row: PgRow) -> Result<Cart> {
        Ok(Cart {
            id: CartId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_cart_item(row: PgRow) -> Result<CartItem> {
        Ok(CartItem {
            id: CartItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            cart_id: CartId::from_uuid(row.try_get::<Uuid, _>("cart_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            quantity: quantity_from_db(row.try_get("quantity")?)?,
            size: variant_from_db(row.try_get("size")?),
            color: variant_from_db(row.try_get("color")?),
            added_at: row.try_get("added_at")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let customer: CustomerDetails =
            serde_json::from_value(row.try_get::<serde_json::Value, _>("customer")?)?;
        let status: OrderStatus = row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(|e: common::ParseStatusError| StoreError::InvalidData(e.to_string()))?;
        let payment_status: PaymentStatus = row
            .try_get::<String, _>("payment_status")?
            .parse()
            .map_err(|e: common::ParseStatusError| StoreError::InvalidData(e.to_string()))?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: row
                .try_get::<Option<Uuid>, _>("user_id")?
                .map(UserId::from_uuid),
            customer,
            subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
            shipping: Money::from_cents(row.try_get("shipping_cents")?),
            tax: Money::from_cents(row.try_get("tax_cents")?),
            total: Money::from_cents(row.try_get("total_cents")?),
            status,
            payment_status,
            idempotency_key: row.try_get("idempotency_key")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order_item(row: PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            product_name: row.try_get("product_name")?,
            quantity: quantity_from_db(row.try_get("quantity")?)?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            size: row.try_get("size")?,
            color: row.try_get("color")?,
            image: row.try_get("image")?,
        })
    }

    async fn product_exists(&self, id: ProductId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

fn quantity_from_db(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::InvalidData(format!("negative quantity {value}")))
}

fn quantity_to_db(value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("quantity {value} out of range")))
}

fn variant_from_db(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Escapes LIKE wildcards so user search text matches literally.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Maps constraint violations to store errors; everything else stays a database error.
fn map_write_error(e: sqlx::Error, entity: &'static str, id: impl ToString) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(db_err.message().to_string());
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::not_found(entity, id);
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl ProductStore for PostgresStore {
    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (id, name, description, price_cents, category, stock, images, sizes, colors)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(&product.category)
        .bind(product.stock)
        .bind(serde_json::to_value(&product.images)?)
        .bind(serde_json::to_value(&product.sizes)?)
        .bind(serde_json::to_value(&product.colors)?)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_product(row)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>> {
        let mut sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE 1=1");
        let mut param_count = 0;

        if query.category.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND category = ${param_count}"));
        }
        if query.search.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND name ILIKE ${param_count}"));
        }
        if query.low_stock_below.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND stock < ${param_count}"));
        }

        sql.push_str(" ORDER BY name ASC, id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(category) = query.category {
            sqlx_query = sqlx_query.bind(category);
        }
        if let Some(search) = query.search {
            sqlx_query = sqlx_query.bind(like_pattern(&search));
        }
        if let Some(threshold) = query.low_stock_below {
            sqlx_query = sqlx_query.bind(threshold);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product> {
        let images = update.images.map(serde_json::to_value).transpose()?;
        let sizes = update.sizes.map(serde_json::to_value).transpose()?;
        let colors = update.colors.map(serde_json::to_value).transpose()?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE products SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price_cents = COALESCE($4, price_cents),
                category = COALESCE($5, category),
                stock = COALESCE($6, stock),
                images = COALESCE($7, images),
                sizes = COALESCE($8, sizes),
                colors = COALESCE($9, colors),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(update.name)
        .bind(update.description)
        .bind(update.price.map(|p| p.cents()))
        .bind(update.category)
        .bind(update.stock)
        .bind(images)
        .bind(sizes)
        .bind(colors)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_product(row),
            None => Err(StoreError::not_found("Product", id)),
        }
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_stock(&self, id: ProductId, stock: i32) -> Result<()> {
        let result = sqlx::query("UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1")
            .bind(id.as_uuid())
            .bind(stock)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Product", id));
        }
        Ok(())
    }

    async fn decrement_stock_if_available(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<Option<i32>> {
        let stock: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE products SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(id.as_uuid())
        .bind(quantity_to_db(quantity)?)
        .fetch_optional(&self.pool)
        .await?;

        // no row back means either a missing product or a failed guard
        if stock.is_none() && !self.product_exists(id).await? {
            return Err(StoreError::not_found("Product", id));
        }
        Ok(stock)
    }

    async fn increment_stock(&self, id: ProductId, quantity: u32) -> Result<i32> {
        let stock: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE products SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING stock
            "#,
        )
        .bind(id.as_uuid())
        .bind(quantity_to_db(quantity)?)
        .fetch_optional(&self.pool)
        .await?;

        stock.ok_or_else(|| StoreError::not_found("Product", id))
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn get_active_cart(&self, user_id: UserId) -> Result<Option<Cart>> {
        let row = sqlx::query(
            "SELECT id, user_id, active, created_at FROM carts WHERE user_id = $1 AND active",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_cart).transpose()
    }

    async fn create_cart(&self, user_id: UserId) -> Result<Cart> {
        let row = sqlx::query(
            r#"
            INSERT INTO carts (id, user_id, active)
            VALUES ($1, $2, TRUE)
            RETURNING id, user_id, active, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "User", user_id))?;

        Self::row_to_cart(row)
    }

    async fn list_cart_items(&self, cart_id: CartId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {CART_ITEM_COLUMNS} FROM cart_items WHERE cart_id = $1 ORDER BY added_at ASC, id ASC"
        ))
        .bind(cart_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_cart_item).collect()
    }

    async fn upsert_cart_item(&self, cart_id: CartId, item: NewCartItem) -> Result<CartItem> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity, size, color)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT ON CONSTRAINT unique_cart_line
            DO UPDATE SET quantity = EXCLUDED.quantity
            RETURNING {CART_ITEM_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(cart_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(quantity_to_db(item.quantity)?)
        .bind(item.size.unwrap_or_default())
        .bind(item.color.unwrap_or_default())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "Cart", cart_id))?;

        Self::row_to_cart_item(row)
    }

    async fn update_cart_item_quantity(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<CartItem> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE cart_items SET quantity = $3
            WHERE cart_id = $1 AND id = $2
            RETURNING {CART_ITEM_COLUMNS}
            "#
        ))
        .bind(cart_id.as_uuid())
        .bind(item_id.as_uuid())
        .bind(quantity_to_db(quantity)?)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_cart_item(row),
            None => Err(StoreError::not_found("CartItem", item_id)),
        }
    }

    async fn remove_cart_item(&self, cart_id: CartId, item_id: CartItemId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND id = $2")
            .bind(cart_id.as_uuid())
            .bind(item_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, cart_id: CartId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn deactivate_cart(&self, cart_id: CartId) -> Result<()> {
        let result = sqlx::query("UPDATE carts SET active = FALSE WHERE id = $1")
            .bind(cart_id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Cart", cart_id));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert_order(&self, order: NewOrder) -> Result<Order> {
        let id = OrderId::new();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (id, user_id, customer, subtotal_cents, shipping_cents, tax_cents, total_cents, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(order.user_id.map(|u| u.as_uuid()))
        .bind(serde_json::to_value(&order.customer)?)
        .bind(order.subtotal.cents())
        .bind(order.shipping.cents())
        .bind(order.tax.cents())
        .bind(order.total.cents())
        .bind(&order.idempotency_key)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "Order", id))?;

        Self::row_to_order(row)
    }

    async fn insert_order_items(
        &self,
        order_id: OrderId,
        items: Vec<NewOrderItem>,
    ) -> Result<Vec<OrderItem>> {
        let mut tx = self.pool.begin().await?;
        let mut rows = Vec::with_capacity(items.len());

        for (position, item) in items.into_iter().enumerate() {
            let item = item.into_item(order_id);

            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, product_name, quantity, unit_price_cents, size, color, image, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(order_id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(&item.product_name)
            .bind(quantity_to_db(item.quantity)?)
            .bind(item.unit_price.cents())
            .bind(&item.size)
            .bind(&item.color)
            .bind(&item.image)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "Order", order_id))?;

            rows.push(item);
        }

        tx.commit().await?;
        tracing::debug!(order_id = %order_id, count = rows.len(), "Inserted order items");
        Ok(rows)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn find_order_by_idempotency_key(&self, key: &str) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE idempotency_key = $1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.user_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND user_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        if query.payment_status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND payment_status = ${param_count}"));
        }
        if query.from_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at >= ${param_count}"));
        }
        if query.to_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at <= ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(user_id) = query.user_id {
            sqlx_query = sqlx_query.bind(user_id.as_uuid());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(payment_status) = query.payment_status {
            sqlx_query = sqlx_query.bind(payment_status.as_str());
        }
        if let Some(from_ts) = query.from_timestamp {
            sqlx_query = sqlx_query.bind(from_ts);
        }
        if let Some(to_ts) = query.to_timestamp {
            sqlx_query = sqlx_query.bind(to_ts);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY position ASC"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order_item).collect()
    }

    async fn list_all_order_items(&self) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items ORDER BY order_id ASC, position ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order_item).collect()
    }

    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let row = sqlx::query(&format!(
            "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_order(row),
            None => Err(StoreError::not_found("Order", id)),
        }
    }

    async fn update_payment_status(&self, id: OrderId, status: PaymentStatus) -> Result<Order> {
        let row = sqlx::query(&format!(
            "UPDATE orders SET payment_status = $2, updated_at = NOW() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_order(row),
            None => Err(StoreError::not_found("Order", id)),
        }
    }

    async fn release_idempotency_key(&self, id: OrderId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE orders SET idempotency_key = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_order_items(&self, order_id: OrderId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
