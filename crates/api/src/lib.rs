//! HTTP API server with observability for the vending platform.
//!
//! Exposes the order, stock, restock, pickup and alert operations as
//! REST endpoints plus the payment provider webhook, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use alerts::AlertService;
use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use ops::{
    CheckoutService, InMemoryCatalog, InMemoryDirectory, PaymentReconciler, PickupService,
    RestockManager, StockService,
};
use store::VendingStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: VendingStore> {
    pub checkout: CheckoutService<S, InMemoryCatalog>,
    pub stock: StockService<S>,
    pub restocks: RestockManager<S, InMemoryDirectory>,
    pub pickups: PickupService<S>,
    pub reconciler: PaymentReconciler<S>,
    pub alerts: AlertService<S>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: VendingStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/payment", post(routes::orders::begin_payment::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/orders/{id}/expire", post(routes::orders::expire::<S>))
        .route("/orders/{id}/pickups", get(routes::pickups::list_for_order::<S>))
        .route("/pickups", post(routes::pickups::create::<S>))
        .route("/pickups/{id}", get(routes::pickups::get::<S>))
        .route("/pickups/{id}/complete", post(routes::pickups::complete::<S>))
        .route("/pickups/{id}/fail", post(routes::pickups::fail::<S>))
        .route("/machines/{id}/slots", post(routes::stock::configure_slot::<S>))
        .route("/machines/{id}/stock", get(routes::stock::list_for_machine::<S>))
        .route("/stock/{id}/delta", post(routes::stock::apply_delta::<S>))
        .route("/machines/{id}/restocks", post(routes::restocks::create::<S>))
        .route("/machines/{id}/restocks", get(routes::restocks::list_for_machine::<S>))
        .route("/machines/{id}/restocks/max", post(routes::restocks::create_max::<S>))
        .route("/restocks/{id}", get(routes::restocks::get::<S>))
        .route("/machines/{id}/alerts", get(routes::alerts::list_for_machine::<S>))
        .route("/machines/{id}/alerts/recompute", post(routes::alerts::recompute::<S>))
        .route("/alerts", get(routes::alerts::list_active::<S>))
        .route("/webhooks/payments", post(routes::webhooks::payment_event::<S>))
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

/// Creates the default application state with in-memory collaborators.
///
/// The catalog and directory handles are returned so the caller can seed
/// products and the fallback admin before serving traffic.
pub fn create_default_state<S: VendingStore + 'static>(
    store: Arc<S>,
) -> (Arc<AppState<S>>, Arc<InMemoryCatalog>, Arc<InMemoryDirectory>) {
    let catalog = Arc::new(InMemoryCatalog::new());
    let directory = Arc::new(InMemoryDirectory::new());

    let state = Arc::new(AppState {
        checkout: CheckoutService::new(Arc::clone(&store), Arc::clone(&catalog)),
        stock: StockService::new(Arc::clone(&store)),
        restocks: RestockManager::new(Arc::clone(&store), Arc::clone(&directory)),
        pickups: PickupService::new(Arc::clone(&store)),
        reconciler: PaymentReconciler::new(Arc::clone(&store)),
        alerts: AlertService::new(store),
    });

    (state, catalog, directory)
}
