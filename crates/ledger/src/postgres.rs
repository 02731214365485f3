use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AccountId, OrderId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    EntryId, GatewayDetails, LedgerAction, LedgerEntry, LedgerError, LedgerMutation, LedgerStore,
    Result,
};

/// PostgreSQL-backed ledger store implementation.
///
/// Atomicity of [`LedgerStore::apply`] comes from a single transaction with a
/// `SELECT ... FOR UPDATE` row lock on the account. Idempotency of gateway
/// credits and of per-order deductions is double-guarded: an in-transaction
/// lookup plus the partial unique indexes `uniq_gateway_purchase` and
/// `uniq_order_deduction`.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Creates a new PostgreSQL ledger store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_entry(row: PgRow) -> Result<LedgerEntry> {
        let action: String = row.try_get("action")?;
        let action: LedgerAction = action
            .parse()
            .map_err(|e: String| LedgerError::Serialization(serde_json::Error::io(
                std::io::Error::other(e),
            )))?;

        let gateway = match row.try_get::<Option<String>, _>("gateway_transaction_id")? {
            Some(transaction_id) => Some(GatewayDetails {
                gateway: row.try_get("payment_gateway")?,
                transaction_id,
                status: row.try_get("gateway_status")?,
                payload: row.try_get("gateway_payload")?,
            }),
            None => None,
        };

        Ok(LedgerEntry {
            id: EntryId::from_uuid(row.try_get::<Uuid, _>("id")?),
            account_id: AccountId::from_uuid(row.try_get::<Uuid, _>("account_id")?),
            actor_id: row.try_get("actor_id")?,
            action,
            amount: row.try_get("amount")?,
            balance_before: row.try_get("balance_before")?,
            balance_after: row.try_get("balance_after")?,
            reason: row.try_get("reason")?,
            related_order_id: row
                .try_get::<Option<Uuid>, _>("related_order_id")?
                .map(OrderId::from_uuid),
            gateway,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }
}

const ENTRY_COLUMNS: &str = "id, account_id, actor_id, action, amount, balance_before, \
     balance_after, reason, related_order_id, payment_gateway, gateway_transaction_id, \
     gateway_status, gateway_payload, created_at";

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn create_account(&self, account_id: AccountId, initial_balance: i64) -> Result<()> {
        sqlx::query("INSERT INTO accounts (id, balance, active) VALUES ($1, $2, TRUE)")
            .bind(account_id.as_uuid())
            .bind(initial_balance)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return LedgerError::AccountAlreadyExists(account_id);
                }
                LedgerError::Database(e)
            })?;
        Ok(())
    }

    async fn balance(&self, account_id: AccountId) -> Result<i64> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM accounts WHERE id = $1")
                .bind(account_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        balance.ok_or(LedgerError::AccountNotFound(account_id))
    }

    async fn apply(&self, account_id: AccountId, mutation: LedgerMutation) -> Result<LedgerEntry> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes all mutations against this account.
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM accounts WHERE id = $1 FOR UPDATE")
                .bind(account_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let balance = balance.ok_or(LedgerError::AccountNotFound(account_id))?;

        if let Some(ref gateway) = mutation.gateway
            && mutation.action == LedgerAction::PurchaseSuccess
        {
            let existing: Option<i64> = sqlx::query_scalar(
                "SELECT 1 FROM ledger_entries \
                 WHERE gateway_transaction_id = $1 AND action = 'purchase_success'",
            )
            .bind(&gateway.transaction_id)
            .fetch_optional(&mut *tx)
            .await?;

            if existing.is_some() {
                return Err(LedgerError::DuplicateGatewayTransaction(
                    gateway.transaction_id.clone(),
                ));
            }
        }

        if mutation.action == LedgerAction::UsageResolution
            && let Some(order_id) = mutation.related_order_id
        {
            let existing: Option<i64> = sqlx::query_scalar(
                "SELECT 1 FROM ledger_entries \
                 WHERE related_order_id = $1 AND action = 'usage_resolution'",
            )
            .bind(order_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;

            if existing.is_some() {
                return Err(LedgerError::DuplicateOrderDeduction(order_id));
            }
        }

        if balance + mutation.amount < 0 {
            return Err(LedgerError::InsufficientBalance {
                account_id,
                balance,
                requested: mutation.amount,
            });
        }

        let entry = mutation.into_entry(account_id, balance);

        sqlx::query("UPDATE accounts SET balance = $1 WHERE id = $2")
            .bind(entry.balance_after)
            .bind(account_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO ledger_entries \
             (id, account_id, actor_id, action, amount, balance_before, balance_after, reason, \
              related_order_id, payment_gateway, gateway_transaction_id, gateway_status, \
              gateway_payload, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(entry.id.as_uuid())
        .bind(entry.account_id.as_uuid())
        .bind(entry.actor_id)
        .bind(entry.action.as_str())
        .bind(entry.amount)
        .bind(entry.balance_before)
        .bind(entry.balance_after)
        .bind(&entry.reason)
        .bind(entry.related_order_id.map(|id| id.as_uuid()))
        .bind(entry.gateway.as_ref().map(|g| g.gateway.as_str()))
        .bind(entry.gateway.as_ref().map(|g| g.transaction_id.as_str()))
        .bind(entry.gateway.as_ref().map(|g| g.status.as_str()))
        .bind(entry.gateway.as_ref().map(|g| &g.payload))
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some("uniq_gateway_purchase") {
                    let transaction_id = entry
                        .gateway
                        .as_ref()
                        .map(|g| g.transaction_id.clone())
                        .unwrap_or_default();
                    return LedgerError::DuplicateGatewayTransaction(transaction_id);
                }
                if db_err.constraint() == Some("uniq_order_deduction")
                    && let Some(order_id) = entry.related_order_id
                {
                    return LedgerError::DuplicateOrderDeduction(order_id);
                }
            }
            LedgerError::Database(e)
        })?;

        tx.commit().await?;
        Ok(entry)
    }

    async fn entries_for_account(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE account_id = $1 ORDER BY seq ASC"
        ))
        .bind(account_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn find_gateway_entry(&self, transaction_id: &str) -> Result<Option<LedgerEntry>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries \
             WHERE gateway_transaction_id = $1 AND action = 'purchase_success'"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_entry).transpose()
    }

    async fn deactivate_account(&self, account_id: AccountId) -> Result<()> {
        let result = sqlx::query("UPDATE accounts SET active = FALSE WHERE id = $1")
            .bind(account_id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::AccountNotFound(account_id));
        }
        Ok(())
    }
}
