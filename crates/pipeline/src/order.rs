//! Order model: the mutable record driven through the pipeline.

use chrono::{DateTime, Utc};
use common::{AccountId, OrderId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::OrderStatus;

/// A photographed math problem submitted for resolution.
///
/// Mutated only by the pipeline orchestrator; never deleted, so failed
/// orders keep their diagnostic for the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub account_id: AccountId,
    /// Pre-solved exercise this order was created from, if any.
    pub source_exercise_id: Option<Uuid>,
    /// Storage URL of the uploaded problem image.
    pub image_url: String,
    pub status: OrderStatus,
    /// Text extracted by the OCR stage.
    pub ocr_text: Option<String>,
    /// Structured solution steps produced by the AI stage.
    pub solution: Option<serde_json::Value>,
    /// Storage URL of the assembled final video.
    pub final_video_url: Option<String>,
    /// Diagnostic recorded when a stage fails.
    pub error_message: Option<String>,
    /// Credits charged by the deduction stage. Fixed at creation.
    pub credits_consumed: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Creates a new order at `Pending` for the given image.
    pub fn new(account_id: AccountId, image_url: impl Into<String>) -> Self {
        Self {
            id: OrderId::new(),
            account_id,
            source_exercise_id: None,
            image_url: image_url.into(),
            status: OrderStatus::Pending,
            ocr_text: None,
            solution: None,
            final_video_url: None,
            error_message: None,
            credits_consumed: 1,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Sets the pre-solved exercise this order was created from.
    pub fn with_source_exercise(mut self, exercise_id: Uuid) -> Self {
        self.source_exercise_id = Some(exercise_id);
        self
    }

    /// Overrides the credits charged for this order.
    pub fn with_credits(mut self, credits: i64) -> Self {
        self.credits_consumed = credits;
        self
    }
}

/// Optional field updates applied together with a status transition.
///
/// `None` fields are left untouched; `clear_error` resets the diagnostic
/// when a failed order re-enters the pipeline.
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub ocr_text: Option<String>,
    pub solution: Option<serde_json::Value>,
    pub final_video_url: Option<String>,
    pub error_message: Option<String>,
    pub clear_error: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OrderPatch {
    /// A patch that changes nothing but the status.
    pub fn none() -> Self {
        Self::default()
    }

    /// A patch recording a stage diagnostic.
    pub fn diagnostic(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// A patch clearing the diagnostic for re-entry.
    pub fn cleared() -> Self {
        Self {
            clear_error: true,
            ..Self::default()
        }
    }

    /// Applies the patch to an order in place.
    pub fn apply_to(&self, order: &mut Order) {
        if let Some(ref text) = self.ocr_text {
            order.ocr_text = Some(text.clone());
        }
        if let Some(ref solution) = self.solution {
            order.solution = Some(solution.clone());
        }
        if let Some(ref url) = self.final_video_url {
            order.final_video_url = Some(url.clone());
        }
        if self.clear_error {
            order.error_message = None;
        } else if let Some(ref message) = self.error_message {
            order.error_message = Some(message.clone());
        }
        if let Some(at) = self.completed_at {
            order.completed_at = Some(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_order_defaults() {
        let account_id = AccountId::new();
        let order = Order::new(account_id, "mem://uploads/problem.jpg");

        assert_eq!(order.account_id, account_id);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.credits_consumed, 1);
        assert!(order.ocr_text.is_none());
        assert!(order.error_message.is_none());
        assert!(order.completed_at.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let exercise = Uuid::new_v4();
        let order = Order::new(AccountId::new(), "mem://x.jpg")
            .with_source_exercise(exercise)
            .with_credits(2);

        assert_eq!(order.source_exercise_id, Some(exercise));
        assert_eq!(order.credits_consumed, 2);
    }

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut order = Order::new(AccountId::new(), "mem://x.jpg");
        order.error_message = Some("previous failure".to_string());

        let patch = OrderPatch {
            ocr_text: Some("x^2 = 4".to_string()),
            ..OrderPatch::default()
        };
        patch.apply_to(&mut order);

        assert_eq!(order.ocr_text.as_deref(), Some("x^2 = 4"));
        // Untouched fields survive.
        assert_eq!(order.error_message.as_deref(), Some("previous failure"));
    }

    #[test]
    fn test_patch_cleared_resets_diagnostic() {
        let mut order = Order::new(AccountId::new(), "mem://x.jpg");
        order.error_message = Some("ocr failed".to_string());

        OrderPatch::cleared().apply_to(&mut order);
        assert!(order.error_message.is_none());
    }
}
