//! Account, balance, and ledger audit endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::AccountId;
use ledger::{LedgerAction, LedgerEntry, LedgerStore};
use pipeline::OrderStore;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::orders::{AppState, parse_account_id};

// -- Request types --

#[derive(Deserialize)]
pub struct OpenAccountRequest {
    /// Caller-chosen ID (mirrors the upstream identity system); random when
    /// absent.
    pub account_id: Option<String>,
    #[serde(default)]
    pub welcome_bonus: i64,
}

#[derive(Deserialize)]
pub struct AdjustmentRequest {
    /// Signed credit delta; negative debits, positive credits.
    pub amount: i64,
    pub reason: String,
    pub actor_id: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct AccountResponse {
    pub account_id: String,
    pub balance: i64,
}

#[derive(Serialize)]
pub struct LedgerEntryResponse {
    pub id: String,
    pub action: String,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub reason: Option<String>,
    pub related_order_id: Option<String>,
    pub gateway_transaction_id: Option<String>,
    pub created_at: String,
}

impl From<LedgerEntry> for LedgerEntryResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            action: entry.action.to_string(),
            amount: entry.amount,
            balance_before: entry.balance_before,
            balance_after: entry.balance_after,
            reason: entry.reason,
            related_order_id: entry.related_order_id.map(|id| id.to_string()),
            gateway_transaction_id: entry.gateway.map(|g| g.transaction_id),
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

// -- Handlers --

/// POST /accounts — open an account, optionally with a welcome bonus.
#[tracing::instrument(skip(state, req))]
pub async fn open<L, O>(
    State(state): State<Arc<AppState<L, O>>>,
    Json(req): Json<OpenAccountRequest>,
) -> Result<(axum::http::StatusCode, Json<AccountResponse>), ApiError>
where
    L: LedgerStore + 'static,
    O: OrderStore + 'static,
{
    let account_id = match req.account_id {
        Some(ref raw) => parse_account_id(raw)?,
        None => AccountId::new(),
    };
    if req.welcome_bonus < 0 {
        return Err(ApiError::BadRequest(format!(
            "Invalid welcome_bonus: {}",
            req.welcome_bonus
        )));
    }

    state.ledger.open_account(account_id, req.welcome_bonus).await?;
    let balance = state.ledger.get_balance(account_id).await?;

    let response = AccountResponse {
        account_id: account_id.to_string(),
        balance,
    };
    Ok((axum::http::StatusCode::CREATED, Json(response)))
}

/// GET /accounts/:id/balance — current credit balance.
#[tracing::instrument(skip(state))]
pub async fn balance<L, O>(
    State(state): State<Arc<AppState<L, O>>>,
    Path(id): Path<String>,
) -> Result<Json<AccountResponse>, ApiError>
where
    L: LedgerStore + 'static,
    O: OrderStore + 'static,
{
    let account_id = parse_account_id(&id)?;
    let balance = state.ledger.get_balance(account_id).await?;

    Ok(Json(AccountResponse {
        account_id: account_id.to_string(),
        balance,
    }))
}

/// GET /accounts/:id/ledger — the account's entries in insertion order.
#[tracing::instrument(skip(state))]
pub async fn entries<L, O>(
    State(state): State<Arc<AppState<L, O>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LedgerEntryResponse>>, ApiError>
where
    L: LedgerStore + 'static,
    O: OrderStore + 'static,
{
    let account_id = parse_account_id(&id)?;
    let entries = state.ledger.entries(account_id).await?;

    Ok(Json(entries.into_iter().map(LedgerEntryResponse::from).collect()))
}

/// POST /accounts/:id/adjustments — admin credit or debit.
#[tracing::instrument(skip(state, req))]
pub async fn adjust<L, O>(
    State(state): State<Arc<AppState<L, O>>>,
    Path(id): Path<String>,
    Json(req): Json<AdjustmentRequest>,
) -> Result<Json<LedgerEntryResponse>, ApiError>
where
    L: LedgerStore + 'static,
    O: OrderStore + 'static,
{
    let account_id = parse_account_id(&id)?;
    let actor_id = req
        .actor_id
        .as_deref()
        .map(uuid::Uuid::parse_str)
        .transpose()
        .map_err(|e| ApiError::BadRequest(format!("Invalid actor_id: {e}")))?;

    let entry = state
        .ledger
        .record_adjustment(
            account_id,
            req.amount,
            LedgerAction::AdminAdjustment,
            req.reason,
            actor_id,
        )
        .await?;

    Ok(Json(entry.into()))
}
