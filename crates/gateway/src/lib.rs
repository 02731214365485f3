//! Payment-provider integration.
//!
//! Two independent halves: an outbound [`PaymentProvider`] that opens
//! checkout sessions, and a [`WebhookIngestor`] that validates the signed
//! callbacks the provider posts back and credits the ledger exactly once.
//! Delivery is at-least-once, possibly duplicated, possibly out of order;
//! every duplicate resolves to [`WebhookDisposition::Duplicate`].

pub mod checkout;
pub mod error;
pub mod event;
pub mod ingestor;
pub mod signature;

pub use checkout::{
    CheckoutSessionHandle, CheckoutSessionRequest, InMemoryPaymentProvider, PaymentError,
    PaymentProvider,
};
pub use error::{Result, WebhookError};
pub use event::{CheckoutEvent, CheckoutMetadata, CheckoutSession, CreditRequest,
    CHECKOUT_COMPLETED};
pub use ingestor::{WebhookDisposition, WebhookIngestor, GATEWAY_NAME};
pub use signature::{sign, verify_signature};
