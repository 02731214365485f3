//! Checkout and payment webhook endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use gateway::{CheckoutSessionRequest, PaymentProvider, WebhookDisposition};
use ledger::LedgerStore;
use pipeline::OrderStore;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::orders::{AppState, parse_account_id};

/// Header carrying the provider signature, `t=...,v1=...` format.
pub const SIGNATURE_HEADER: &str = "webhook-signature";

// -- Request types --

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub account_id: String,
    pub package_id: String,
    /// Price in the currency's minor unit.
    pub amount: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Credits the package grants on completion.
    pub credits: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
}

#[derive(Serialize)]
pub struct WebhookResponse {
    pub disposition: &'static str,
}

// -- Handlers --

/// POST /checkout — open a payment-provider checkout session.
#[tracing::instrument(skip(state, req))]
pub async fn checkout<L, O>(
    State(state): State<Arc<AppState<L, O>>>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError>
where
    L: LedgerStore + 'static,
    O: OrderStore + 'static,
{
    let account_id = parse_account_id(&req.account_id)?;
    // The webhook will fail loudly on an unknown account; catch it here.
    state.ledger.get_balance(account_id).await?;

    if req.amount <= 0 || req.credits <= 0 {
        return Err(ApiError::BadRequest(
            "amount and credits must be positive".to_string(),
        ));
    }

    let session = state
        .payment
        .create_checkout_session(CheckoutSessionRequest {
            account_id,
            package_id: req.package_id,
            amount: req.amount,
            currency: req.currency,
            success_url: req.success_url,
            cancel_url: req.cancel_url,
            credits: req.credits,
        })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(CheckoutResponse {
        session_id: session.session_id,
        url: session.url,
    }))
}

/// POST /webhooks/payment — signed provider callback.
///
/// The body must stay raw for signature verification; axum's `String`
/// extractor preserves it byte for byte. Credited, duplicate, and ignored
/// deliveries all acknowledge with 200 so the provider stops retrying;
/// signature and payload failures map to 400 through [`ApiError`].
#[tracing::instrument(skip(state, headers, body))]
pub async fn webhook<L, O>(
    State(state): State<Arc<AppState<L, O>>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError>
where
    L: LedgerStore + 'static,
    O: OrderStore + 'static,
{
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing signature header".to_string()))?;

    let disposition = state.ingestor.handle_callback(&body, signature).await?;

    let disposition = match disposition {
        WebhookDisposition::Credited(_) => "credited",
        WebhookDisposition::Duplicate => "duplicate",
        WebhookDisposition::Ignored => "ignored",
    };
    Ok(Json(WebhookResponse { disposition }))
}
