//! Public catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::ProductId;
use serde::Deserialize;
use store::{Product, ProductQuery, Store};

use crate::AppState;
use crate::error::ApiError;
use crate::routes::parse_id;

#[derive(Debug, Default, Deserialize)]
pub struct ProductListParams {
    pub category: Option<String>,
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl From<ProductListParams> for ProductQuery {
    fn from(params: ProductListParams) -> Self {
        let mut query = ProductQuery::new();
        if let Some(category) = params.category.filter(|c| !c.is_empty()) {
            query = query.category(category);
        }
        if let Some(search) = params.search.filter(|s| !s.is_empty()) {
            query = query.search(search);
        }
        query.limit = params.limit;
        query.offset = params.offset;
        query
    }
}

/// GET /api/products: catalog listing, ordered by name.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ProductListParams>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.catalog.list(params.into()).await?))
}

/// GET /api/products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let product_id: ProductId = parse_id(&id, "Product")?;
    Ok(Json(state.catalog.get(product_id).await?))
}
