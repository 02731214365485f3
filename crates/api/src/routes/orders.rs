//! Order submission, inspection, and retry endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{AccountId, OrderId};
use gateway::{InMemoryPaymentProvider, WebhookIngestor};
use ledger::{LedgerService, LedgerStore};
use pipeline::{
    InMemoryAssemblyService, InMemoryFileStorage, InMemoryOcrProvider, InMemorySolutionProvider,
    Order, OrderStore, PipelineOrchestrator, PipelineQueue,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
///
/// Providers are the in-memory doubles; production wiring swaps the stores
/// for their Postgres implementations.
pub struct AppState<L: LedgerStore, O: OrderStore> {
    pub orchestrator: Arc<
        PipelineOrchestrator<
            O,
            L,
            InMemoryOcrProvider,
            InMemorySolutionProvider,
            InMemoryAssemblyService,
            InMemoryFileStorage,
        >,
    >,
    pub queue: PipelineQueue,
    pub ledger: LedgerService<L>,
    pub ingestor: WebhookIngestor<L>,
    pub payment: InMemoryPaymentProvider,
    pub storage: InMemoryFileStorage,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub account_id: String,
    pub image_url: String,
    pub source_exercise_id: Option<String>,
    pub credits: Option<i64>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub account_id: String,
    pub status: String,
    pub image_url: String,
    pub ocr_text: Option<String>,
    pub solution: Option<serde_json::Value>,
    pub final_video_url: Option<String>,
    pub error_message: Option<String>,
    pub credits_consumed: i64,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            account_id: order.account_id.to_string(),
            status: order.status.to_string(),
            image_url: order.image_url,
            ocr_text: order.ocr_text,
            solution: order.solution,
            final_video_url: order.final_video_url,
            error_message: order.error_message,
            credits_consumed: order.credits_consumed,
            created_at: order.created_at.to_rfc3339(),
            completed_at: order.completed_at.map(|at| at.to_rfc3339()),
        }
    }
}

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub order_id: String,
    pub status: String,
}

// -- Handlers --

/// POST /orders — submit a photographed problem for processing.
#[tracing::instrument(skip(state, req))]
pub async fn create<L, O>(
    State(state): State<Arc<AppState<L, O>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(axum::http::StatusCode, Json<OrderCreatedResponse>), ApiError>
where
    L: LedgerStore + 'static,
    O: OrderStore + 'static,
{
    let account_id = parse_account_id(&req.account_id)?;
    // Reject unknown accounts up front rather than failing mid-pipeline.
    state.ledger.get_balance(account_id).await?;

    let mut order = Order::new(account_id, req.image_url);
    if let Some(ref raw) = req.source_exercise_id {
        let exercise_id = uuid::Uuid::parse_str(raw)
            .map_err(|e| ApiError::BadRequest(format!("Invalid source_exercise_id: {e}")))?;
        order = order.with_source_exercise(exercise_id);
    }
    if let Some(credits) = req.credits {
        if credits <= 0 {
            return Err(ApiError::BadRequest(format!("Invalid credits: {credits}")));
        }
        order = order.with_credits(credits);
    }

    let order = state.orchestrator.submit(order).await?;
    state.queue.enqueue(order.id).await?;

    let response = OrderCreatedResponse {
        order_id: order.id.to_string(),
        status: order.status.to_string(),
    };
    Ok((axum::http::StatusCode::CREATED, Json(response)))
}

/// GET /orders/:id — load an order by ID.
#[tracing::instrument(skip(state))]
pub async fn get<L, O>(
    State(state): State<Arc<AppState<L, O>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    L: LedgerStore + 'static,
    O: OrderStore + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state
        .orchestrator
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(order.into()))
}

/// POST /orders/:id/retry — re-enter the pipeline for a failed order.
#[tracing::instrument(skip(state))]
pub async fn retry<L, O>(
    State(state): State<Arc<AppState<L, O>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    L: LedgerStore + 'static,
    O: OrderStore + 'static,
{
    let order_id = parse_order_id(&id)?;
    state.orchestrator.retry(order_id).await?;

    let order = state
        .orchestrator
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(order.into()))
}

/// GET /accounts/:id/orders — list an account's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_for_account<L, O>(
    State(state): State<Arc<AppState<L, O>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError>
where
    L: LedgerStore + 'static,
    O: OrderStore + 'static,
{
    let account_id = parse_account_id(&id)?;
    let orders = state
        .orchestrator
        .store()
        .orders_for_account(account_id)
        .await?;

    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

pub(crate) fn parse_account_id(id: &str) -> Result<AccountId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid account ID: {e}")))?;
    Ok(AccountId::from_uuid(uuid))
}

pub(crate) fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}
