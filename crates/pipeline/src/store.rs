//! Order store trait: durable storage for orders and their pipeline status.

use async_trait::async_trait;
use common::OrderId;

use crate::{Order, OrderPatch, OrderStatus, Result};

/// Outcome of a conditional status transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The order was in an allowed status; the transition and patch applied.
    Applied(Order),
    /// The order had already moved past the allowed statuses; nothing
    /// changed. Stale or duplicate stage invocations land here.
    Superseded(Order),
}

impl Transition {
    /// The order as observed, whether or not the transition applied.
    pub fn order(&self) -> &Order {
        match self {
            Transition::Applied(order) | Transition::Superseded(order) => order,
        }
    }
}

/// Storage backend for pipeline orders.
///
/// [`OrderStore::transition`] is the primitive the orchestrator builds its
/// write-before-call discipline on: a compare-and-set on status that makes
/// stale invocations observable as [`Transition::Superseded`] no-ops.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order. Fails with `OrderAlreadyExists` on ID reuse.
    async fn insert(&self, order: Order) -> Result<()>;

    /// Loads an order by ID, or `None` if absent.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Atomically moves the order to `to` and applies `patch`, but only if
    /// its current status is one of `allowed_from`.
    async fn transition(
        &self,
        order_id: OrderId,
        allowed_from: &[OrderStatus],
        to: OrderStatus,
        patch: OrderPatch,
    ) -> Result<Transition>;

    /// Lists orders for an account, newest first.
    async fn orders_for_account(&self, account_id: common::AccountId) -> Result<Vec<Order>>;
}
