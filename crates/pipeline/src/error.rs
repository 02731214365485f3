use common::OrderId;
use ledger::LedgerError;
use thiserror::Error;

use crate::status::OrderStatus;

/// Errors that can occur during pipeline operations.
///
/// Collaborator failures never surface here: the orchestrator persists them
/// as a failure status plus diagnostic. These errors cover the cases where
/// the pipeline itself cannot make progress.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// An order with this ID already exists.
    #[error("Order already exists: {0}")]
    OrderAlreadyExists(OrderId),

    /// Retry was requested for an order that is not in a retryable status.
    #[error("Order {order_id} is not retryable from status {status}")]
    NotRetryable {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// The work queue has shut down.
    #[error("Pipeline queue is closed")]
    QueueClosed,

    /// A ledger error occurred outside the insufficient-balance path.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
