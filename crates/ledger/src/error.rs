use common::{AccountId, OrderId};
use thiserror::Error;

/// Errors that can occur when interacting with the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The account does not exist in the ledger store.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// An account with this ID already exists.
    #[error("Account already exists: {0}")]
    AccountAlreadyExists(AccountId),

    /// The requested change would leave the balance negative.
    #[error(
        "Insufficient balance for account {account_id}: balance {balance}, requested {requested}"
    )]
    InsufficientBalance {
        account_id: AccountId,
        balance: i64,
        requested: i64,
    },

    /// A purchase entry with this gateway transaction ID was already recorded.
    #[error("Gateway transaction already processed: {0}")]
    DuplicateGatewayTransaction(String),

    /// A usage deduction for this order was already recorded.
    #[error("Order already deducted: {0}")]
    DuplicateOrderDeduction(OrderId),

    /// The amount is not valid for the requested operation.
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
