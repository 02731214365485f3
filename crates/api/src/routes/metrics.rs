//! Prometheus exposition endpoint.
//!
//! Renders the pipeline, ledger, and webhook counters registered against the
//! recorder installed in `main`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

/// GET /metrics — Prometheus text exposition of the order system's metrics.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    let content_type = [(
        axum::http::header::CONTENT_TYPE,
        "text/plain; version=0.0.4; charset=utf-8",
    )];
    (StatusCode::OK, content_type, handle.render())
}
