//! Webhook signature scheme: `t=<unix ts>,v1=<hex hmac-sha256>` over
//! `"{t}.{body}"`, verified in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Result, WebhookError};

type HmacSha256 = Hmac<Sha256>;

/// Computes the signature header for a body at the given timestamp.
///
/// The inverse of [`verify_signature`]; used by tests and local tooling to
/// forge provider callbacks.
pub fn sign(raw_body: &str, timestamp: i64, secret: &[u8]) -> String {
    let digest = signed_digest(raw_body, timestamp, secret);
    format!("t={timestamp},v1={}", hex::encode(digest))
}

/// Verifies the signature header against the raw body.
///
/// Any parse failure, hex failure, or digest mismatch collapses into
/// `SignatureInvalid`; the caller must respond non-2xx so the provider
/// retries the delivery.
pub fn verify_signature(raw_body: &str, header: &str, secret: &[u8]) -> Result<()> {
    let mut timestamp: Option<i64> = None;
    let mut signature: Option<&str> = None;

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signature = Some(value),
            _ => {}
        }
    }

    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        return Err(WebhookError::SignatureInvalid);
    };
    let expected = hex::decode(signature).map_err(|_| WebhookError::SignatureInvalid)?;

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| WebhookError::SignatureInvalid)?;
    mac.update(format!("{timestamp}.{raw_body}").as_bytes());
    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::SignatureInvalid)
}

fn signed_digest(raw_body: &str, timestamp: i64, secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(format!("{timestamp}.{raw_body}").as_bytes());
    mac.finalize().into_bytes().to_vec()
}
