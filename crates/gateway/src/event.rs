//! Checkout event model: the payload the payment provider posts back.

use common::AccountId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, WebhookError};

/// The only event type that carries a credit purchase.
pub const CHECKOUT_COMPLETED: &str = "checkout.completed";

/// A payment-provider webhook event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutEvent {
    pub event_type: String,
    pub session: CheckoutSession,
}

/// The checkout session embedded in the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Gateway transaction ID; the ledger's idempotency key.
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub metadata: CheckoutMetadata,
}

/// Metadata we attached when creating the session, echoed back by the
/// provider. Provider metadata values are always strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutMetadata {
    pub account_id: Option<String>,
    pub credits: Option<String>,
    pub package_id: Option<String>,
}

/// The validated credit request extracted from a completed checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditRequest {
    pub account_id: AccountId,
    pub credits: i64,
    pub package_id: String,
}

impl CheckoutEvent {
    /// Returns true for the event type that carries a purchase.
    pub fn is_checkout_completed(&self) -> bool {
        self.event_type == CHECKOUT_COMPLETED
    }

    /// Extracts and validates the credit request from the metadata.
    ///
    /// Missing or unparsable fields are an integration bug on the checkout
    /// side, so each failure names the offending field.
    pub fn credit_request(&self) -> Result<CreditRequest> {
        let metadata = &self.session.metadata;

        let account_id = metadata
            .account_id
            .as_deref()
            .and_then(|raw| raw.parse::<Uuid>().ok())
            .map(AccountId::from_uuid)
            .ok_or_else(|| WebhookError::MalformedPayload("metadata.account_id".to_string()))?;

        let credits = metadata
            .credits
            .as_deref()
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|credits| *credits > 0)
            .ok_or_else(|| WebhookError::MalformedPayload("metadata.credits".to_string()))?;

        let package_id = metadata
            .package_id
            .clone()
            .ok_or_else(|| WebhookError::MalformedPayload("metadata.package_id".to_string()))?;

        Ok(CreditRequest {
            account_id,
            credits,
            package_id,
        })
    }
}
