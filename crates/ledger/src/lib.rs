//! Credit ledger: append-only transaction log backing mutable account balances.
//!
//! Every balance change goes through [`LedgerService`], which enforces
//! atomicity of "mutate balance + append entry" and idempotency of
//! gateway-sourced credits. Entries are never mutated or removed, so
//! replaying them in insertion order reconstructs the balance exactly.

pub mod entry;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod service;
pub mod store;

pub use common::{AccountId, OrderId};
pub use entry::{EntryId, GatewayDetails, LedgerAction, LedgerEntry, LedgerMutation};
pub use error::{LedgerError, Result};
pub use memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use service::{GatewayCreditOutcome, LedgerService};
pub use store::LedgerStore;
