use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AccountId;
use tokio::sync::{Mutex, RwLock};

use crate::{LedgerAction, LedgerEntry, LedgerError, LedgerMutation, LedgerStore, Result};

#[derive(Debug, Default)]
struct AccountCell {
    balance: i64,
    active: bool,
    entries: Vec<LedgerEntry>,
}

/// In-memory ledger store implementation for testing and local development.
///
/// Each account lives behind its own mutex, so mutations against the same
/// account serialize while distinct accounts proceed in parallel — the same
/// locking discipline the PostgreSQL implementation gets from row locks.
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    accounts: Arc<RwLock<HashMap<AccountId, Arc<Mutex<AccountCell>>>>>,
    gateway_index: Arc<Mutex<HashMap<String, LedgerEntry>>>,
}

impl InMemoryLedgerStore {
    /// Creates a new empty in-memory ledger store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of accounts.
    pub async fn account_count(&self) -> usize {
        self.accounts.read().await.len()
    }

    async fn cell(&self, account_id: AccountId) -> Result<Arc<Mutex<AccountCell>>> {
        let accounts = self.accounts.read().await;
        accounts
            .get(&account_id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(account_id))
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn create_account(&self, account_id: AccountId, initial_balance: i64) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account_id) {
            return Err(LedgerError::AccountAlreadyExists(account_id));
        }
        accounts.insert(
            account_id,
            Arc::new(Mutex::new(AccountCell {
                balance: initial_balance,
                active: true,
                entries: Vec::new(),
            })),
        );
        Ok(())
    }

    async fn balance(&self, account_id: AccountId) -> Result<i64> {
        let cell = self.cell(account_id).await?;
        let cell = cell.lock().await;
        Ok(cell.balance)
    }

    async fn apply(&self, account_id: AccountId, mutation: LedgerMutation) -> Result<LedgerEntry> {
        let cell = self.cell(account_id).await?;
        let mut cell = cell.lock().await;

        // A deduction always targets the order's owning account, so the
        // account lock is enough to make this check race-free.
        if mutation.action == LedgerAction::UsageResolution
            && let Some(order_id) = mutation.related_order_id
            && cell.entries.iter().any(|e| {
                e.action == LedgerAction::UsageResolution
                    && e.related_order_id == Some(order_id)
            })
        {
            return Err(LedgerError::DuplicateOrderDeduction(order_id));
        }

        let balance_after = cell.balance + mutation.amount;
        if balance_after < 0 {
            return Err(LedgerError::InsufficientBalance {
                account_id,
                balance: cell.balance,
                requested: mutation.amount,
            });
        }

        let entry = mutation.into_entry(account_id, cell.balance);

        // Idempotency gate: check and reserve under one index lock so the
        // same transaction cannot land on two accounts concurrently.
        if let Some(ref gateway) = entry.gateway
            && entry.action == LedgerAction::PurchaseSuccess
        {
            let mut index = self.gateway_index.lock().await;
            if index.contains_key(&gateway.transaction_id) {
                return Err(LedgerError::DuplicateGatewayTransaction(
                    gateway.transaction_id.clone(),
                ));
            }
            index.insert(gateway.transaction_id.clone(), entry.clone());
        }

        cell.balance = entry.balance_after;
        cell.entries.push(entry.clone());

        Ok(entry)
    }

    async fn entries_for_account(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>> {
        let cell = self.cell(account_id).await?;
        let cell = cell.lock().await;
        Ok(cell.entries.clone())
    }

    async fn find_gateway_entry(&self, transaction_id: &str) -> Result<Option<LedgerEntry>> {
        let index = self.gateway_index.lock().await;
        Ok(index.get(transaction_id).cloned())
    }

    async fn deactivate_account(&self, account_id: AccountId) -> Result<()> {
        let cell = self.cell(account_id).await?;
        let mut cell = cell.lock().await;
        cell.active = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GatewayDetails;

    fn gateway_details(transaction_id: &str) -> GatewayDetails {
        GatewayDetails {
            gateway: "stripe".to_string(),
            transaction_id: transaction_id.to_string(),
            status: "paid".to_string(),
            payload: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn create_and_read_balance() {
        let store = InMemoryLedgerStore::new();
        let account_id = AccountId::new();

        store.create_account(account_id, 5).await.unwrap();
        assert_eq!(store.balance(account_id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn create_duplicate_account_fails() {
        let store = InMemoryLedgerStore::new();
        let account_id = AccountId::new();

        store.create_account(account_id, 0).await.unwrap();
        let result = store.create_account(account_id, 0).await;
        assert!(matches!(result, Err(LedgerError::AccountAlreadyExists(_))));
    }

    #[tokio::test]
    async fn balance_of_unknown_account_fails() {
        let store = InMemoryLedgerStore::new();
        let result = store.balance(AccountId::new()).await;
        assert!(matches!(result, Err(LedgerError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn apply_updates_balance_and_appends_entry() {
        let store = InMemoryLedgerStore::new();
        let account_id = AccountId::new();
        store.create_account(account_id, 10).await.unwrap();

        let entry = store
            .apply(
                account_id,
                LedgerMutation::new(LedgerAction::UsageResolution, -3),
            )
            .await
            .unwrap();

        assert_eq!(entry.balance_before, 10);
        assert_eq!(entry.balance_after, 7);
        assert_eq!(store.balance(account_id).await.unwrap(), 7);

        let entries = store.entries_for_account(account_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], entry);
    }

    #[tokio::test]
    async fn apply_rejects_negative_balance() {
        let store = InMemoryLedgerStore::new();
        let account_id = AccountId::new();
        store.create_account(account_id, 2).await.unwrap();

        let result = store
            .apply(
                account_id,
                LedgerMutation::new(LedgerAction::UsageResolution, -3),
            )
            .await;

        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance {
                balance: 2,
                requested: -3,
                ..
            })
        ));
        // Nothing persisted on failure
        assert_eq!(store.balance(account_id).await.unwrap(), 2);
        assert!(
            store
                .entries_for_account(account_id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn apply_rejects_duplicate_gateway_transaction() {
        let store = InMemoryLedgerStore::new();
        let account_id = AccountId::new();
        store.create_account(account_id, 0).await.unwrap();

        let mutation = || {
            LedgerMutation::new(LedgerAction::PurchaseSuccess, 50)
                .with_gateway(gateway_details("sess_123"))
        };

        store.apply(account_id, mutation()).await.unwrap();
        let result = store.apply(account_id, mutation()).await;

        assert!(matches!(
            result,
            Err(LedgerError::DuplicateGatewayTransaction(ref id)) if id == "sess_123"
        ));
        assert_eq!(store.balance(account_id).await.unwrap(), 50);
        assert_eq!(
            store.entries_for_account(account_id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn apply_rejects_duplicate_gateway_transaction_across_accounts() {
        let store = InMemoryLedgerStore::new();
        let first_account = AccountId::new();
        let second_account = AccountId::new();
        store.create_account(first_account, 0).await.unwrap();
        store.create_account(second_account, 0).await.unwrap();

        store
            .apply(
                first_account,
                LedgerMutation::new(LedgerAction::PurchaseSuccess, 50)
                    .with_gateway(gateway_details("sess_shared")),
            )
            .await
            .unwrap();

        // The same transaction must not credit a second account.
        let result = store
            .apply(
                second_account,
                LedgerMutation::new(LedgerAction::PurchaseSuccess, 50)
                    .with_gateway(gateway_details("sess_shared")),
            )
            .await;

        assert!(matches!(
            result,
            Err(LedgerError::DuplicateGatewayTransaction(ref id)) if id == "sess_shared"
        ));
        assert_eq!(store.balance(second_account).await.unwrap(), 0);
        assert!(
            store
                .entries_for_account(second_account)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn apply_rejects_second_deduction_for_same_order() {
        let store = InMemoryLedgerStore::new();
        let account_id = AccountId::new();
        let order_id = common::OrderId::new();
        store.create_account(account_id, 5).await.unwrap();

        let mutation = || {
            LedgerMutation::new(LedgerAction::UsageResolution, -1).with_related_order(order_id)
        };

        store.apply(account_id, mutation()).await.unwrap();
        let result = store.apply(account_id, mutation()).await;

        assert!(matches!(
            result,
            Err(LedgerError::DuplicateOrderDeduction(id)) if id == order_id
        ));
        assert_eq!(store.balance(account_id).await.unwrap(), 4);
        assert_eq!(
            store.entries_for_account(account_id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn find_gateway_entry_by_transaction_id() {
        let store = InMemoryLedgerStore::new();
        let account_id = AccountId::new();
        store.create_account(account_id, 0).await.unwrap();

        assert!(
            store
                .find_gateway_entry("sess_abc")
                .await
                .unwrap()
                .is_none()
        );

        store
            .apply(
                account_id,
                LedgerMutation::new(LedgerAction::PurchaseSuccess, 10)
                    .with_gateway(gateway_details("sess_abc")),
            )
            .await
            .unwrap();

        let found = store.find_gateway_entry("sess_abc").await.unwrap().unwrap();
        assert_eq!(found.amount, 10);
    }

    #[tokio::test]
    async fn concurrent_deductions_never_overdraw() {
        let store = InMemoryLedgerStore::new();
        let account_id = AccountId::new();
        store.create_account(account_id, 3).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .apply(
                        account_id,
                        LedgerMutation::new(LedgerAction::UsageResolution, -1),
                    )
                    .await
            }));
        }

        let mut successes = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(LedgerError::InsufficientBalance { .. }) => insufficient += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(successes, 3);
        assert_eq!(insufficient, 7);
        assert_eq!(store.balance(account_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deactivate_keeps_balance_and_entries() {
        let store = InMemoryLedgerStore::new();
        let account_id = AccountId::new();
        store.create_account(account_id, 4).await.unwrap();

        store.deactivate_account(account_id).await.unwrap();
        assert_eq!(store.balance(account_id).await.unwrap(), 4);
    }
}
