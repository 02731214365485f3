//! HTTP API server with observability for the photo-math order system.
//!
//! Provides REST endpoints for order submission, credit balances, ledger
//! audit, checkout, and the signed payment webhook, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use ledger::LedgerStore;
use metrics_exporter_prometheus::PrometheusHandle;
use pipeline::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<L, O>(state: Arc<AppState<L, O>>, metrics_handle: PrometheusHandle) -> Router
where
    L: LedgerStore + 'static,
    O: OrderStore + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<L, O>))
        .route("/orders/{id}", get(routes::orders::get::<L, O>))
        .route("/orders/{id}/retry", post(routes::orders::retry::<L, O>))
        .route("/accounts", post(routes::accounts::open::<L, O>))
        .route(
            "/accounts/{id}/balance",
            get(routes::accounts::balance::<L, O>),
        )
        .route(
            "/accounts/{id}/ledger",
            get(routes::accounts::entries::<L, O>),
        )
        .route(
            "/accounts/{id}/adjustments",
            post(routes::accounts::adjust::<L, O>),
        )
        .route(
            "/accounts/{id}/orders",
            get(routes::orders::list_for_account::<L, O>),
        )
        .route("/checkout", post(routes::payments::checkout::<L, O>))
        .route("/webhooks/payment", post(routes::payments::webhook::<L, O>))
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

/// Creates application state on the in-memory stores and provider doubles.
pub fn create_default_state(
    config: &Config,
) -> Arc<AppState<ledger::InMemoryLedgerStore, pipeline::InMemoryOrderStore>> {
    use gateway::{InMemoryPaymentProvider, WebhookIngestor};
    use ledger::{InMemoryLedgerStore, LedgerService};
    use pipeline::{
        InMemoryAssemblyService, InMemoryFileStorage, InMemoryOcrProvider,
        InMemorySolutionProvider, InMemoryOrderStore, PipelineOrchestrator, PipelineQueue,
        queue::DEFAULT_QUEUE_CAPACITY,
    };

    let ledger_store = InMemoryLedgerStore::new();
    let storage = InMemoryFileStorage::new();

    let orchestrator = Arc::new(PipelineOrchestrator::new(
        InMemoryOrderStore::new(),
        ledger_store.clone(),
        InMemoryOcrProvider::new(),
        InMemorySolutionProvider::new(),
        InMemoryAssemblyService::new(),
        storage.clone(),
    ));
    let queue = PipelineQueue::start(
        Arc::clone(&orchestrator),
        config.pipeline_workers,
        DEFAULT_QUEUE_CAPACITY,
    );

    Arc::new(AppState {
        orchestrator,
        queue,
        ledger: LedgerService::new(ledger_store.clone()),
        ingestor: WebhookIngestor::new(ledger_store, config.webhook_secret.as_bytes()),
        payment: InMemoryPaymentProvider::new(),
        storage,
    })
}
