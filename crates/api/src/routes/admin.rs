//! Admin back office: product CRUD, order management and the dashboard.
//!
//! Every handler takes an [`AdminSession`], so non-admins get 403 before any
//! work is done.

use std::sync::Arc;

use analytics::DashboardSummary;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{OrderId, OrderStatus, PaymentStatus, ProductId};
use serde::Deserialize;
use store::{NewProduct, Order, OrderQuery, Product, ProductUpdate, Store};

use crate::AppState;
use crate::error::ApiError;
use crate::routes::{json_body, parse_id};
use crate::session::AdminSession;

const DEFAULT_TOP_PRODUCTS: usize = 5;

// -- Products --

/// POST /api/admin/products
#[tracing::instrument(skip(state, _admin, payload))]
pub async fn create_product<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminSession,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.catalog.create(json_body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/admin/products/{id}: partial update; absent fields are kept.
#[tracing::instrument(skip(state, _admin, payload))]
pub async fn update_product<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminSession,
    Path(id): Path<String>,
    payload: Result<Json<ProductUpdate>, JsonRejection>,
) -> Result<Json<Product>, ApiError> {
    let product_id: ProductId = parse_id(&id, "Product")?;
    let update = json_body(payload)?;
    Ok(Json(state.catalog.update(product_id, update).await?))
}

/// DELETE /api/admin/products/{id}
#[tracing::instrument(skip(state, _admin))]
pub async fn delete_product<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminSession,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let product_id: ProductId = parse_id(&id, "Product")?;
    state.catalog.delete(product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Orders --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListParams {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl OrderListParams {
    fn into_query(self) -> Result<OrderQuery, ApiError> {
        let mut query = OrderQuery::new();
        if let Some(status) = self.status.filter(|s| !s.is_empty()) {
            let status: OrderStatus = status
                .parse()
                .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
            query = query.status(status);
        }
        if let Some(status) = self.payment_status.filter(|s| !s.is_empty()) {
            let status: PaymentStatus = status
                .parse()
                .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
            query = query.payment_status(status);
        }
        query.limit = self.limit;
        query.offset = self.offset;
        Ok(query)
    }
}

/// GET /api/admin/orders: every order, newest first, optionally filtered.
#[tracing::instrument(skip(state, _admin))]
pub async fn list_orders<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminSession,
    Query(params): Query<OrderListParams>,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.orders.list(params.into_query()?).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusRequest {
    #[serde(alias = "status")]
    pub payment_status: PaymentStatus,
}

/// PATCH /api/admin/orders/{id}/status
#[tracing::instrument(skip(state, _admin, payload))]
pub async fn update_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminSession,
    Path(id): Path<String>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id, "Order")?;
    let StatusRequest { status } = json_body(payload)?;
    Ok(Json(state.orders.update_status(order_id, status).await?))
}

/// PATCH /api/admin/orders/{id}/payment-status
#[tracing::instrument(skip(state, _admin, payload))]
pub async fn update_payment_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminSession,
    Path(id): Path<String>,
    payload: Result<Json<PaymentStatusRequest>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id, "Order")?;
    let PaymentStatusRequest { payment_status } = json_body(payload)?;
    Ok(Json(
        state
            .orders
            .update_payment_status(order_id, payment_status)
            .await?,
    ))
}

// -- Dashboard --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardParams {
    pub top: Option<usize>,
    pub low_stock_threshold: Option<i32>,
}

/// GET /api/admin/dashboard
#[tracing::instrument(skip(state, _admin))]
pub async fn dashboard<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminSession,
    Query(params): Query<DashboardParams>,
) -> Result<Json<DashboardSummary>, ApiError> {
    let threshold = params
        .low_stock_threshold
        .unwrap_or(state.low_stock_threshold);
    let top = params.top.unwrap_or(DEFAULT_TOP_PRODUCTS);
    Ok(Json(
        DashboardSummary::load(&state.store, threshold, top).await?,
    ))
}
