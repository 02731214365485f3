//! PostgreSQL integration tests for the ledger store.
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p ledger --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use ledger::{
    AccountId, GatewayCreditOutcome, LedgerAction, LedgerError, LedgerMutation, LedgerService,
    LedgerStore, OrderId, PostgresLedgerStore,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_ledger_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresLedgerStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE ledger_entries, accounts")
        .execute(&pool)
        .await
        .unwrap();

    PostgresLedgerStore::new(pool)
}

#[tokio::test]
#[serial_test::serial]
async fn apply_is_atomic_and_snapshots_balance() {
    let store = get_test_store().await;
    let account_id = AccountId::new();

    store.create_account(account_id, 10).await.unwrap();

    let entry = store
        .apply(
            account_id,
            LedgerMutation::new(LedgerAction::UsageResolution, -4)
                .with_reason("order test")
                .with_related_order(OrderId::new()),
        )
        .await
        .unwrap();

    assert_eq!(entry.balance_before, 10);
    assert_eq!(entry.balance_after, 6);
    assert_eq!(store.balance(account_id).await.unwrap(), 6);

    let entries = store.entries_for_account(account_id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, -4);
    assert!(entries[0].related_order_id.is_some());
}

#[tokio::test]
#[serial_test::serial]
async fn insufficient_balance_rolls_back_everything() {
    let store = get_test_store().await;
    let account_id = AccountId::new();

    store.create_account(account_id, 1).await.unwrap();

    let result = store
        .apply(
            account_id,
            LedgerMutation::new(LedgerAction::UsageResolution, -2),
        )
        .await;

    assert!(matches!(result, Err(LedgerError::InsufficientBalance { .. })));
    assert_eq!(store.balance(account_id).await.unwrap(), 1);
    assert!(
        store
            .entries_for_account(account_id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
#[serial_test::serial]
async fn duplicate_gateway_transaction_rejected_by_index() {
    let store = get_test_store().await;
    let account_id = AccountId::new();

    store.create_account(account_id, 0).await.unwrap();

    let service = LedgerService::new(store);

    let first = service
        .record_gateway_credit(
            account_id,
            50,
            "stripe",
            "sess_pg_1",
            "paid",
            serde_json::json!({"id": "sess_pg_1"}),
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
            "sess_pg_1",
            "paid",
            serde_json::json!({"id": "sess_pg_1"}),
            "starter pack",
        )
        .await
        .unwrap();
    assert_eq!(second, GatewayCreditOutcome::AlreadyProcessed);

    assert_eq!(service.get_balance(account_id).await.unwrap(), 50);

    let found = service
        .store()
        .find_gateway_entry("sess_pg_1")
        .await
        .unwrap();
    assert!(found.is_some());
}

#[tokio::test]
#[serial_test::serial]
async fn duplicate_order_deduction_rejected() {
    let store = get_test_store().await;
    let account_id = AccountId::new();
    let order_id = OrderId::new();

    store.create_account(account_id, 5).await.unwrap();

    let mutation =
        || LedgerMutation::new(LedgerAction::UsageResolution, -1).with_related_order(order_id);

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
#[serial_test::serial]
async fn concurrent_deductions_respect_row_lock() {
    let store = get_test_store().await;
    let account_id = AccountId::new();

    store.create_account(account_id, 3).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
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
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, 3);
    assert_eq!(store.balance(account_id).await.unwrap(), 0);

    // Replay from the initial balance reproduces the final balance.
    let entries = store.entries_for_account(account_id).await.unwrap();
    let replayed: i64 = entries.iter().map(|e| e.amount).sum();
    assert_eq!(3 + replayed, 0);
}

#[tokio::test]
#[serial_test::serial]
async fn deactivate_account_keeps_ledger() {
    let store = get_test_store().await;
    let account_id = AccountId::new();

    store.create_account(account_id, 5).await.unwrap();
    store.deactivate_account(account_id).await.unwrap();

    assert_eq!(store.balance(account_id).await.unwrap(), 5);

    let missing = store.deactivate_account(AccountId::new()).await;
    assert!(matches!(missing, Err(LedgerError::AccountNotFound(_))));
}
