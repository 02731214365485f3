//! Outbound payment-provider client: checkout session creation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::AccountId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned by the payment provider's outbound API.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct PaymentError {
    pub code: String,
    pub message: String,
}

impl PaymentError {
    /// Creates a payment error with the given code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// What we send the provider to open a checkout session.
///
/// The metadata comes back verbatim on the `checkout.completed` webhook, so
/// it must carry everything the ingestor needs to credit the purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionRequest {
    pub account_id: AccountId,
    pub package_id: String,
    /// Price in the currency's minor unit.
    pub amount: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Credits the package grants, echoed back in webhook metadata.
    pub credits: i64,
}

/// A session the provider opened for us.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSessionHandle {
    /// Provider session ID; will arrive back as the gateway transaction ID.
    pub session_id: String,
    /// URL the client is redirected to for payment.
    pub url: String,
}

/// Trait for the payment provider's outbound API.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Opens a checkout session and returns its redirect URL.
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSessionHandle, PaymentError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    fail_on_create: bool,
    next_id: u32,
    sessions: Vec<CheckoutSessionRequest>,
}

/// In-memory payment provider for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProvider {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentProvider {
    /// Creates a new in-memory payment provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the provider to fail on session creation.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Returns the number of sessions created.
    pub fn session_count(&self) -> usize {
        self.state.read().unwrap().sessions.len()
    }
}

#[async_trait]
impl PaymentProvider for InMemoryPaymentProvider {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSessionHandle, PaymentError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_create {
            return Err(PaymentError::new("unavailable", "payment provider unavailable"));
        }

        state.next_id += 1;
        let session_id = format!("sess_mem_{:04}", state.next_id);
        let url = format!("https://pay.test/checkout/{session_id}");
        state.sessions.push(request);

        Ok(CheckoutSessionHandle { session_id, url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            account_id: AccountId::new(),
            package_id: "starter".to_string(),
            amount: 499,
            currency: "usd".to_string(),
            success_url: "https://app.test/paid".to_string(),
            cancel_url: "https://app.test/cancelled".to_string(),
            credits: 50,
        }
    }

    #[tokio::test]
    async fn test_create_session_returns_handle() {
        let provider = InMemoryPaymentProvider::new();

        let handle = provider.create_checkout_session(request()).await.unwrap();
        assert!(handle.url.contains(&handle.session_id));
        assert_eq!(provider.session_count(), 1);
    }

    #[tokio::test]
    async fn test_fail_on_create() {
        let provider = InMemoryPaymentProvider::new();
        provider.set_fail_on_create(true);

        let result = provider.create_checkout_session(request()).await;
        assert!(result.is_err());
        assert_eq!(provider.session_count(), 0);
    }
}
