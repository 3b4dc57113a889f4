//! HTTP API server for the storefront.
//!
//! Provides REST endpoints for the catalog, the signed-in user's cart,
//! order placement and the admin back office, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod session;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post, put};
use checkout::OrderWriter;
use domain::{CartService, CatalogService, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub writer: OrderWriter<S>,
    pub carts: CartService<S>,
    pub catalog: CatalogService<S>,
    pub orders: OrderService<S>,
    pub store: S,
    /// Name of the storage backend, reported by the health check.
    pub storage: &'static str,
    pub low_stock_threshold: i32,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let admin = Router::new()
        .route("/products", post(routes::admin::create_product::<S>))
        .route(
            "/products/{id}",
            put(routes::admin::update_product::<S>).delete(routes::admin::delete_product::<S>),
        )
        .route("/orders", get(routes::admin::list_orders::<S>))
        .route("/orders/{id}/status", patch(routes::admin::update_status::<S>))
        .route(
            "/orders/{id}/payment-status",
            patch(routes::admin::update_payment_status::<S>),
        )
        .route("/dashboard", get(routes::admin::dashboard::<S>));

    let api = Router::new()
        .route("/products", get(routes::products::list::<S>))
        .route("/products/{id}", get(routes::products::get::<S>))
        .route(
            "/cart",
            get(routes::cart::view::<S>).delete(routes::cart::clear::<S>),
        )
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{id}",
            patch(routes::cart::update_item::<S>).delete(routes::cart::remove_item::<S>),
        )
        .route("/cart/merge", post(routes::cart::merge::<S>))
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .nest("/admin", admin);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .nest("/api", api)
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over `store`.
pub fn create_default_state<S: Store + Clone + 'static>(
    store: S,
    storage: &'static str,
    config: &Config,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        writer: OrderWriter::new(store.clone(), config.stock_policy),
        carts: CartService::new(store.clone()),
        catalog: CatalogService::new(store.clone()),
        orders: OrderService::new(store.clone()),
        store,
        storage,
        low_stock_threshold: config.low_stock_threshold,
    })
}
