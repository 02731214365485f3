//! Shared identifier types used across the ledger and pipeline crates.

pub mod types;

pub use types::{AccountId, OrderId};
