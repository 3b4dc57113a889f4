//! Order placement and the signed-in user's order history.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::{CheckoutLine, PlaceOrder, PlacedOrder, Placement};
use common::{Money, OrderId};
use domain::ShippingForm;
use serde::{Deserialize, Serialize};
use store::{Order, Store};

use crate::AppState;
use crate::error::ApiError;
use crate::routes::{json_body, parse_id};
use crate::session::{MaybeSession, Role, Session};

// -- Request types --

/// Body of `POST /api/orders`. Money fields are integer cents.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub form_data: ShippingForm,
    pub cart_items: Vec<CheckoutLine>,
    pub total: Money,
    #[serde(default)]
    pub shipping: Money,
    #[serde(default)]
    pub tax: Money,
    /// Repeating a submit with the same key returns the first order.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub message: &'static str,
    pub order: PlacedOrder,
}

// -- Handlers --

/// POST /api/orders: place an order from the submitted cart lines.
///
/// Answers 201 for a new order and 200 when the idempotency key matched an
/// earlier one. Guests may order; a session attaches the order to the user.
#[tracing::instrument(skip(state, session, payload))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    MaybeSession(session): MaybeSession,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let req = json_body(payload)?;

    let mut request = PlaceOrder::from_form(
        &req.form_data,
        req.cart_items,
        req.shipping,
        req.tax,
        req.total,
    )?;
    if let Some(session) = session {
        request = request.for_user(session.user_id);
    }
    if let Some(key) = req.idempotency_key.filter(|k| !k.trim().is_empty()) {
        request = request.with_idempotency_key(key);
    }

    let placement = state.writer.place(request).await?;
    let (status, message) = match placement {
        Placement::Created(_) => (StatusCode::CREATED, "Order created successfully"),
        Placement::Existing(_) => (StatusCode::OK, "Order already placed"),
    };

    Ok((
        status,
        Json(OrderCreatedResponse {
            message,
            order: placement.into_placed(),
        }),
    ))
}

/// GET /api/orders: the session user's orders, newest first.
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.orders.list_for_user(session.user_id).await?))
}

/// GET /api/orders/{id}: one order with its lines.
///
/// Customers only see their own orders; admins see any.
#[tracing::instrument(skip(state, session))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<PlacedOrder>, ApiError> {
    let order_id: OrderId = parse_id(&id, "Order")?;
    let (order, items) = match session.role {
        Role::Admin => state.orders.get(order_id).await?,
        Role::Customer => state.orders.get_for_user(session.user_id, order_id).await?,
    };
    Ok(Json(PlacedOrder { order, items }))
}
