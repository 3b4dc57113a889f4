//! The signed-in user's cart.
//!
//! Every mutation answers with the refreshed cart so the client never has to
//! re-fetch.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::CartItemId;
use domain::CartView;
use serde::Deserialize;
use store::{NewCartItem, Store};

use crate::AppState;
use crate::error::ApiError;
use crate::routes::{json_body, parse_id};
use crate::session::Session;

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct MergeCartRequest {
    pub items: Vec<NewCartItem>,
}

/// GET /api/cart
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn view<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(state.carts.view(session.user_id).await?))
}

/// POST /api/cart/items: add units, merging with a matching line.
#[tracing::instrument(skip(state, session, payload), fields(user_id = %session.user_id))]
pub async fn add_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
    payload: Result<Json<NewCartItem>, JsonRejection>,
) -> Result<(StatusCode, Json<CartView>), ApiError> {
    let item = json_body(payload)?;
    state.carts.add_item(session.user_id, item).await?;
    Ok((
        StatusCode::CREATED,
        Json(state.carts.view(session.user_id).await?),
    ))
}

/// PATCH /api/cart/items/{id}: set a line's quantity; zero removes it.
#[tracing::instrument(skip(state, session, payload), fields(user_id = %session.user_id))]
pub async fn update_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
    Path(id): Path<String>,
    payload: Result<Json<UpdateQuantityRequest>, JsonRejection>,
) -> Result<Json<CartView>, ApiError> {
    let item_id: CartItemId = parse_id(&id, "Cart item")?;
    let UpdateQuantityRequest { quantity } = json_body(payload)?;
    state
        .carts
        .update_quantity(session.user_id, item_id, quantity)
        .await?;
    Ok(Json(state.carts.view(session.user_id).await?))
}

/// DELETE /api/cart/items/{id}
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn remove_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<CartView>, ApiError> {
    let item_id: CartItemId = parse_id(&id, "Cart item")?;
    if !state.carts.remove_item(session.user_id, item_id).await? {
        return Err(ApiError::NotFound(format!("Cart item {id} not found")));
    }
    Ok(Json(state.carts.view(session.user_id).await?))
}

/// DELETE /api/cart: empty the cart.
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn clear<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
) -> Result<StatusCode, ApiError> {
    state.carts.clear(session.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/cart/merge: fold a guest cart in after sign-in.
#[tracing::instrument(skip(state, session, payload), fields(user_id = %session.user_id))]
pub async fn merge<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
    payload: Result<Json<MergeCartRequest>, JsonRejection>,
) -> Result<Json<CartView>, ApiError> {
    let MergeCartRequest { items } = json_body(payload)?;
    Ok(Json(
        state.carts.merge_guest_cart(session.user_id, items).await?,
    ))
}
