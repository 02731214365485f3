//! Webhook ingestor: maps signed provider callbacks onto the ledger
//! exactly once.

use ledger::{GatewayCreditOutcome, LedgerEntry, LedgerService, LedgerStore};

use crate::error::{Result, WebhookError};
use crate::event::CheckoutEvent;
use crate::signature::verify_signature;

/// Gateway name recorded on purchase entries.
pub const GATEWAY_NAME: &str = "stripe";

/// What a callback did, from the provider's point of view.
///
/// All three variants are acknowledged with a success status; only a
/// [`WebhookError`] makes the provider retry.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookDisposition {
    /// A new purchase entry was recorded and the balance credited.
    Credited(LedgerEntry),
    /// This gateway transaction was already credited; nothing changed.
    /// Expected under at-least-once delivery.
    Duplicate,
    /// The event type carries no purchase; acknowledged and dropped.
    Ignored,
}

/// Validates payment-provider callbacks and credits purchases through the
/// ledger. Idempotency lives in the ledger's gateway-transaction gate, so a
/// replayed delivery resolves to [`WebhookDisposition::Duplicate`] no matter
/// which process instance handles it.
pub struct WebhookIngestor<S: LedgerStore> {
    ledger: LedgerService<S>,
    secret: Vec<u8>,
}

impl<S: LedgerStore> WebhookIngestor<S> {
    /// Creates an ingestor verifying callbacks against the given secret.
    pub fn new(store: S, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            ledger: LedgerService::new(store),
            secret: secret.into(),
        }
    }

    /// Handles one inbound provider notification.
    ///
    /// Signature verification runs over the raw body before any parsing.
    /// `SignatureInvalid` and `MalformedPayload` must surface to the
    /// provider as a retryable failure and a loud integration error
    /// respectively; everything else is acknowledged.
    #[tracing::instrument(skip(self, raw_body, signature_header))]
    pub async fn handle_callback(
        &self,
        raw_body: &str,
        signature_header: &str,
    ) -> Result<WebhookDisposition> {
        verify_signature(raw_body, signature_header, &self.secret).inspect_err(|_| {
            metrics::counter!("webhook_signature_failures_total").increment(1);
            tracing::warn!("webhook signature verification failed");
        })?;

        let payload: serde_json::Value = serde_json::from_str(raw_body)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
        let event: CheckoutEvent = serde_json::from_value(payload.clone())
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        if !event.is_checkout_completed() {
            metrics::counter!("webhook_ignored_total").increment(1);
            tracing::debug!(event_type = %event.event_type, "webhook event ignored");
            return Ok(WebhookDisposition::Ignored);
        }

        let request = event.credit_request()?;
        let outcome = self
            .ledger
            .record_gateway_credit(
                request.account_id,
                request.credits,
                GATEWAY_NAME,
                &event.session.id,
                &event.session.status,
                payload,
                format!("purchase {}", request.package_id),
            )
            .await?;

        match outcome {
            GatewayCreditOutcome::Recorded(entry) => {
                tracing::info!(
                    account_id = %request.account_id,
                    credits = request.credits,
                    session_id = %event.session.id,
                    "checkout credited"
                );
                Ok(WebhookDisposition::Credited(entry))
            }
            GatewayCreditOutcome::AlreadyProcessed => Ok(WebhookDisposition::Duplicate),
        }
    }
}
