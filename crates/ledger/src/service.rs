//! Ledger service: the only writer of account balances.

use common::{AccountId, OrderId};
use uuid::Uuid;

use crate::{
    GatewayDetails, LedgerAction, LedgerEntry, LedgerError, LedgerMutation, LedgerStore, Result,
};

/// Outcome of recording a gateway credit.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCreditOutcome {
    /// The credit was applied and a new entry recorded.
    Recorded(LedgerEntry),
    /// An entry for this gateway transaction already exists; the balance was
    /// not touched. Expected under at-least-once webhook delivery.
    AlreadyProcessed,
}

/// Service for mutating and reading account balances through the ledger.
///
/// Wraps a [`LedgerStore`] and enforces the operation-level rules: amounts
/// must be non-zero, deductions are positive credit counts applied as
/// negative deltas, and duplicate gateway credits resolve to
/// [`GatewayCreditOutcome::AlreadyProcessed`] rather than an error.
pub struct LedgerService<S: LedgerStore> {
    store: S,
}

impl<S: LedgerStore> LedgerService<S> {
    /// Creates a new ledger service with the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates an account, optionally granting a welcome bonus.
    ///
    /// The bonus is recorded as a `welcome_bonus` entry so the ledger replay
    /// invariant holds from the account's first day.
    #[tracing::instrument(skip(self))]
    pub async fn open_account(
        &self,
        account_id: AccountId,
        welcome_bonus: i64,
    ) -> Result<Option<LedgerEntry>> {
        self.store.create_account(account_id, 0).await?;

        if welcome_bonus <= 0 {
            return Ok(None);
        }

        let entry = self
            .store
            .apply(
                account_id,
                LedgerMutation::new(LedgerAction::WelcomeBonus, welcome_bonus)
                    .with_reason("welcome bonus"),
            )
            .await?;

        metrics::counter!("ledger_welcome_bonuses_total").increment(1);
        tracing::info!(%account_id, amount = welcome_bonus, "account opened with welcome bonus");
        Ok(Some(entry))
    }

    /// Reads the current balance. No side effects.
    #[tracing::instrument(skip(self))]
    pub async fn get_balance(&self, account_id: AccountId) -> Result<i64> {
        self.store.balance(account_id).await
    }

    /// Records a manual balance adjustment (welcome bonus or admin change).
    ///
    /// Atomic with its entry append. A negative amount that would overdraw
    /// the account fails with `InsufficientBalance` and changes nothing.
    #[tracing::instrument(skip(self, reason))]
    pub async fn record_adjustment(
        &self,
        account_id: AccountId,
        amount: i64,
        action: LedgerAction,
        reason: impl Into<String>,
        actor_id: Option<Uuid>,
    ) -> Result<LedgerEntry> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut mutation = LedgerMutation::new(action, amount).with_reason(reason);
        if let Some(actor) = actor_id {
            mutation = mutation.with_actor(actor);
        }

        let entry = self.store.apply(account_id, mutation).await?;
        metrics::counter!("ledger_adjustments_total").increment(1);
        tracing::info!(%account_id, amount, action = %action, "adjustment recorded");
        Ok(entry)
    }

    /// Credits a completed gateway purchase exactly once.
    ///
    /// A second delivery of the same gateway transaction ID returns
    /// [`GatewayCreditOutcome::AlreadyProcessed`] without touching the
    /// balance. This is the idempotency gate for payment webhooks.
    #[tracing::instrument(skip(self, payload, reason))]
    pub async fn record_gateway_credit(
        &self,
        account_id: AccountId,
        amount: i64,
        gateway: impl Into<String> + std::fmt::Debug,
        transaction_id: impl Into<String> + std::fmt::Debug,
        status: impl Into<String> + std::fmt::Debug,
        payload: serde_json::Value,
        reason: impl Into<String>,
    ) -> Result<GatewayCreditOutcome> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let transaction_id = transaction_id.into();
        let mutation = LedgerMutation::new(LedgerAction::PurchaseSuccess, amount)
            .with_reason(reason)
            .with_gateway(GatewayDetails {
                gateway: gateway.into(),
                transaction_id: transaction_id.clone(),
                status: status.into(),
                payload,
            });

        match self.store.apply(account_id, mutation).await {
            Ok(entry) => {
                metrics::counter!("ledger_gateway_credits_total").increment(1);
                tracing::info!(%account_id, amount, transaction_id, "gateway credit recorded");
                Ok(GatewayCreditOutcome::Recorded(entry))
            }
            Err(LedgerError::DuplicateGatewayTransaction(_)) => {
                metrics::counter!("ledger_gateway_duplicates_total").increment(1);
                tracing::info!(%account_id, transaction_id, "duplicate gateway credit ignored");
                Ok(GatewayCreditOutcome::AlreadyProcessed)
            }
            Err(e) => Err(e),
        }
    }

    /// Deducts credits for resolving an order, at most once per order.
    ///
    /// `credits` is a positive count applied internally as a negative delta.
    /// Fails with `InsufficientBalance` (and changes nothing) when the
    /// account cannot cover it, and with `DuplicateOrderDeduction` when a
    /// deduction for this order was already recorded.
    #[tracing::instrument(skip(self))]
    pub async fn try_deduct(
        &self,
        account_id: AccountId,
        credits: i64,
        order_id: OrderId,
    ) -> Result<LedgerEntry> {
        if credits <= 0 {
            return Err(LedgerError::InvalidAmount(credits));
        }

        let entry = self
            .store
            .apply(
                account_id,
                LedgerMutation::new(LedgerAction::UsageResolution, -credits)
                    .with_reason(format!("order {order_id}"))
                    .with_related_order(order_id),
            )
            .await?;

        metrics::counter!("ledger_deductions_total").increment(1);
        tracing::info!(%account_id, credits, %order_id, "credits deducted");
        Ok(entry)
    }

    /// Returns the account's entries in insertion order, for audit reads.
    #[tracing::instrument(skip(self))]
    pub async fn entries(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>> {
        self.store.entries_for_account(account_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryLedgerStore;

    fn service() -> LedgerService<InMemoryLedgerStore> {
        LedgerService::new(InMemoryLedgerStore::new())
    }

    #[tokio::test]
    async fn test_open_account_with_welcome_bonus() {
        let service = service();
        let account_id = AccountId::new();

        let entry = service.open_account(account_id, 3).await.unwrap().unwrap();
        assert_eq!(entry.action, LedgerAction::WelcomeBonus);
        assert_eq!(entry.balance_before, 0);
        assert_eq!(entry.balance_after, 3);
        assert_eq!(service.get_balance(account_id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_open_account_without_bonus() {
        let service = service();
        let account_id = AccountId::new();

        let entry = service.open_account(account_id, 0).await.unwrap();
        assert!(entry.is_none());
        assert_eq!(service.get_balance(account_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_adjustment_rejects_zero_amount() {
        let service = service();
        let account_id = AccountId::new();
        service.open_account(account_id, 0).await.unwrap();

        let result = service
            .record_adjustment(
                account_id,
                0,
                LedgerAction::AdminAdjustment,
                "no-op",
                None,
            )
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidAmount(0))));
    }

    #[tokio::test]
    async fn test_negative_adjustment_cannot_overdraw() {
        let service = service();
        let account_id = AccountId::new();
        service.open_account(account_id, 2).await.unwrap();

        let result = service
            .record_adjustment(
                account_id,
                -5,
                LedgerAction::AdminAdjustment,
                "correction",
                Some(Uuid::new_v4()),
            )
            .await;

        assert!(matches!(result, Err(LedgerError::InsufficientBalance { .. })));
        assert_eq!(service.get_balance(account_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_gateway_credit_is_idempotent() {
        let service = service();
        let account_id = AccountId::new();
        service.open_account(account_id, 0).await.unwrap();

        let first = service
            .record_gateway_credit(
                account_id,
                50,
                "stripe",
                "sess_123",
                "paid",
                serde_json::json!({"id": "sess_123"}),
                "starter pack",
            )
            .await
            .unwrap();
        assert!(matches!(first, GatewayCreditOutcome::Recorded(_)));

        let second = service
            .record_gateway_credit(
                account_id,
                50,
                "stripe",
                "sess_123",
                "paid",
                serde_json::json!({"id": "sess_123"}),
                "starter pack",
            )
            .await
            .unwrap();
        assert_eq!(second, GatewayCreditOutcome::AlreadyProcessed);

        // Balance changed exactly once, exactly one purchase entry exists.
        assert_eq!(service.get_balance(account_id).await.unwrap(), 50);
        let entries = service.entries(account_id).await.unwrap();
        let purchases: Vec<_> = entries
            .iter()
            .filter(|e| e.action == LedgerAction::PurchaseSuccess)
            .collect();
        assert_eq!(purchases.len(), 1);
    }

    #[tokio::test]
    async fn test_gateway_credit_rejects_non_positive_amount() {
        let service = service();
        let account_id = AccountId::new();
        service.open_account(account_id, 0).await.unwrap();

        let result = service
            .record_gateway_credit(
                account_id,
                0,
                "stripe",
                "sess_0",
                "paid",
                serde_json::json!({}),
                "empty pack",
            )
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidAmount(0))));
    }

    #[tokio::test]
    async fn test_gateway_credit_unknown_account() {
        let service = service();

        let result = service
            .record_gateway_credit(
                AccountId::new(),
                50,
                "stripe",
                "sess_404",
                "paid",
                serde_json::json!({}),
                "starter pack",
            )
            .await;
        assert!(matches!(result, Err(LedgerError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_try_deduct_links_order() {
        let service = service();
        let account_id = AccountId::new();
        let order_id = OrderId::new();
        service.open_account(account_id, 1).await.unwrap();

        let entry = service.try_deduct(account_id, 1, order_id).await.unwrap();

        assert_eq!(entry.action, LedgerAction::UsageResolution);
        assert_eq!(entry.amount, -1);
        assert_eq!(entry.balance_before, 1);
        assert_eq!(entry.balance_after, 0);
        assert_eq!(entry.related_order_id, Some(order_id));
        assert_eq!(
            entry.reason.as_deref(),
            Some(format!("order {order_id}").as_str())
        );
    }

    #[tokio::test]
    async fn test_try_deduct_twice_for_same_order_rejected() {
        let service = service();
        let account_id = AccountId::new();
        let order_id = OrderId::new();
        service.open_account(account_id, 5).await.unwrap();

        service.try_deduct(account_id, 1, order_id).await.unwrap();
        let result = service.try_deduct(account_id, 1, order_id).await;

        assert!(matches!(
            result,
            Err(LedgerError::DuplicateOrderDeduction(id)) if id == order_id
        ));
        // The first deduction stands alone; the balance moved exactly once.
        assert_eq!(service.get_balance(account_id).await.unwrap(), 4);
        assert_eq!(service.entries(account_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_try_deduct_insufficient_leaves_no_entry() {
        let service = service();
        let account_id = AccountId::new();
        service.open_account(account_id, 0).await.unwrap();

        let result = service
            .try_deduct(account_id, 1, OrderId::new())
            .await;
        assert!(matches!(result, Err(LedgerError::InsufficientBalance { .. })));
        assert_eq!(service.get_balance(account_id).await.unwrap(), 0);
        assert!(service.entries(account_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replaying_entries_reconstructs_balance() {
        let service = service();
        let account_id = AccountId::new();
        service.open_account(account_id, 3).await.unwrap();

        service
            .record_gateway_credit(
                account_id,
                50,
                "stripe",
                "sess_replay",
                "paid",
                serde_json::json!({}),
                "pack",
            )
            .await
            .unwrap();
        service
            .try_deduct(account_id, 2, OrderId::new())
            .await
            .unwrap();
        service
            .record_adjustment(
                account_id,
                -10,
                LedgerAction::AdminAdjustment,
                "abuse rollback",
                Some(Uuid::new_v4()),
            )
            .await
            .unwrap();

        let entries = service.entries(account_id).await.unwrap();
        let replayed: i64 = entries.iter().map(|e| e.amount).sum();
        assert_eq!(replayed, service.get_balance(account_id).await.unwrap());

        // Snapshots chain without gaps.
        for pair in entries.windows(2) {
            assert_eq!(pair[0].balance_after, pair[1].balance_before);
        }
        for entry in &entries {
            assert!(entry.is_consistent());
        }
    }
}
