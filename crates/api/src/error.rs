//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gateway::WebhookError;
use ledger::LedgerError;
use pipeline::PipelineError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Ledger operation error.
    Ledger(LedgerError),
    /// Pipeline operation error.
    Pipeline(PipelineError),
    /// Webhook handling error.
    Webhook(WebhookError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Ledger(err) => ledger_error_to_response(err),
            ApiError::Pipeline(err) => pipeline_error_to_response(err),
            ApiError::Webhook(err) => webhook_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

/// Insufficient balance gets its own status so clients can prompt a top-up
/// instead of a blind retry.
fn ledger_error_to_response(err: LedgerError) -> (StatusCode, String) {
    match &err {
        LedgerError::InsufficientBalance { .. } => (StatusCode::PAYMENT_REQUIRED, err.to_string()),
        LedgerError::AccountNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        LedgerError::AccountAlreadyExists(_) => (StatusCode::CONFLICT, err.to_string()),
        LedgerError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        LedgerError::DuplicateGatewayTransaction(_) => (StatusCode::CONFLICT, err.to_string()),
        LedgerError::DuplicateOrderDeduction(_) => (StatusCode::CONFLICT, err.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn pipeline_error_to_response(err: PipelineError) -> (StatusCode, String) {
    if let PipelineError::Ledger(inner) = err {
        return ledger_error_to_response(inner);
    }

    let status = match &err {
        PipelineError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::OrderAlreadyExists(_) | PipelineError::NotRetryable { .. } => {
            StatusCode::CONFLICT
        }
        PipelineError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

/// Signature failures must be non-2xx so the provider retries the delivery.
fn webhook_error_to_response(err: WebhookError) -> (StatusCode, String) {
    match err {
        WebhookError::SignatureInvalid => (StatusCode::BAD_REQUEST, err.to_string()),
        WebhookError::MalformedPayload(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        WebhookError::Ledger(inner) => ledger_error_to_response(inner),
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Pipeline(err)
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        ApiError::Webhook(err)
    }
}
