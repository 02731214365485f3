//! Ledger entry model: immutable records of individual balance changes.

use chrono::{DateTime, Utc};
use common::{AccountId, OrderId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Creates a new random entry ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entry ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of balance change an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerAction {
    /// A completed payment-gateway purchase credited the account.
    PurchaseSuccess,

    /// Credits consumed by resolving an order through the pipeline.
    UsageResolution,

    /// One-time credit granted when the account is opened.
    WelcomeBonus,

    /// Manual credit or debit issued by an administrator.
    AdminAdjustment,
}

impl LedgerAction {
    /// Returns the action name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerAction::PurchaseSuccess => "purchase_success",
            LedgerAction::UsageResolution => "usage_resolution",
            LedgerAction::WelcomeBonus => "welcome_bonus",
            LedgerAction::AdminAdjustment => "admin_adjustment",
        }
    }
}

impl std::fmt::Display for LedgerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LedgerAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "purchase_success" => Ok(LedgerAction::PurchaseSuccess),
            "usage_resolution" => Ok(LedgerAction::UsageResolution),
            "welcome_bonus" => Ok(LedgerAction::WelcomeBonus),
            "admin_adjustment" => Ok(LedgerAction::AdminAdjustment),
            other => Err(format!("unknown ledger action: {other}")),
        }
    }
}

/// External payment-gateway details attached to a purchase entry.
///
/// `transaction_id` together with [`LedgerAction::PurchaseSuccess`] forms the
/// idempotency key that guards against duplicate webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayDetails {
    /// Gateway name, e.g. "stripe".
    pub gateway: String,
    /// The gateway's transaction/session identifier.
    pub transaction_id: String,
    /// Status string reported by the gateway.
    pub status: String,
    /// Opaque raw payload for audit purposes.
    pub payload: serde_json::Value,
}

/// An immutable, append-only record of one balance change.
///
/// Invariant: `balance_after == balance_before + amount`. Both snapshots are
/// taken at write time and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub account_id: AccountId,
    /// Administrator who initiated the change, when applicable.
    pub actor_id: Option<Uuid>,
    pub action: LedgerAction,
    /// Signed delta in credits; negative for deductions.
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub reason: Option<String>,
    /// Order whose resolution consumed these credits, when applicable.
    pub related_order_id: Option<OrderId>,
    pub gateway: Option<GatewayDetails>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Returns true if the before/after snapshots are consistent with the amount.
    pub fn is_consistent(&self) -> bool {
        self.balance_after == self.balance_before + self.amount
    }
}

/// A requested balance change, to be applied atomically by a ledger store.
#[derive(Debug, Clone)]
pub struct LedgerMutation {
    pub action: LedgerAction,
    /// Signed delta in credits.
    pub amount: i64,
    pub reason: Option<String>,
    pub actor_id: Option<Uuid>,
    pub related_order_id: Option<OrderId>,
    pub gateway: Option<GatewayDetails>,
}

impl LedgerMutation {
    /// Creates a mutation for the given action and signed amount.
    pub fn new(action: LedgerAction, amount: i64) -> Self {
        Self {
            action,
            amount,
            reason: None,
            actor_id: None,
            related_order_id: None,
            gateway: None,
        }
    }

    /// Attaches a human-readable reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the administrator who initiated the change.
    pub fn with_actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Links the mutation to the order it resolves.
    pub fn with_related_order(mut self, order_id: OrderId) -> Self {
        self.related_order_id = Some(order_id);
        self
    }

    /// Attaches payment-gateway details.
    pub fn with_gateway(mut self, gateway: GatewayDetails) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Materializes the entry for this mutation at the given balance snapshot.
    pub fn into_entry(self, account_id: AccountId, balance_before: i64) -> LedgerEntry {
        LedgerEntry {
            id: EntryId::new(),
            account_id,
            actor_id: self.actor_id,
            action: self.action,
            amount: self.amount,
            balance_before,
            balance_after: balance_before + self.amount,
            reason: self.reason,
            related_order_id: self.related_order_id,
            gateway: self.gateway,
            created_at: Utc::now(),
        }
    }
}
