//! Ledger store trait: durable, transactional storage for balances and entries.

use async_trait::async_trait;
use common::AccountId;

use crate::{LedgerEntry, LedgerMutation, Result};

/// Storage backend for account balances and their append-only entry log.
///
/// Implementations must make [`LedgerStore::apply`] atomic per account: the
/// balance read, the negative-balance check, the duplicate-gateway check, the
/// balance write, and the entry append all happen under one per-account lock
/// (or database row lock), both-or-neither. No call ever touches more than
/// one account, which bounds contention to "per account".
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Creates an account with the given starting balance.
    ///
    /// Fails with `AccountAlreadyExists` if the ID is taken.
    async fn create_account(&self, account_id: AccountId, initial_balance: i64) -> Result<()>;

    /// Reads the current balance. Fails with `AccountNotFound` if absent.
    async fn balance(&self, account_id: AccountId) -> Result<i64>;

    /// Atomically applies a mutation and appends its entry.
    ///
    /// Fails with `InsufficientBalance` if the resulting balance would be
    /// negative, with `DuplicateGatewayTransaction` if the mutation carries
    /// a gateway transaction ID that already has a `purchase_success` entry,
    /// and with `DuplicateOrderDeduction` if a `usage_resolution` mutation
    /// names an order that was already deducted. On failure nothing is
    /// persisted.
    async fn apply(&self, account_id: AccountId, mutation: LedgerMutation) -> Result<LedgerEntry>;

    /// Returns all entries for the account in insertion order.
    async fn entries_for_account(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>>;

    /// Looks up the `purchase_success` entry for a gateway transaction ID.
    async fn find_gateway_entry(&self, transaction_id: &str) -> Result<Option<LedgerEntry>>;

    /// Marks an account inactive. Entries and balance are retained.
    async fn deactivate_account(&self, account_id: AccountId) -> Result<()>;
}
