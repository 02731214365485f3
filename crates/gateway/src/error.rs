use ledger::LedgerError;
use thiserror::Error;

/// Errors that can occur while handling a payment-provider callback.
///
/// The HTTP layer maps these to status codes with opposite retry semantics:
/// `SignatureInvalid` must produce a non-2xx response so the provider
/// retries, while a duplicate delivery never reaches this type at all.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The signature header does not verify against the raw body.
    #[error("Webhook signature verification failed")]
    SignatureInvalid,

    /// The payload parsed but required fields are missing or invalid.
    /// An integration bug, surfaced loudly rather than retried.
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    /// A ledger error occurred while recording the credit.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Result type for webhook operations.
pub type Result<T> = std::result::Result<T, WebhookError>;
