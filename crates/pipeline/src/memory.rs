use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{AccountId, OrderId};
use tokio::sync::RwLock;

use crate::{Order, OrderPatch, OrderStatus, OrderStore, PipelineError, Result, Transition};

/// In-memory order store implementation for testing and local development.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(PipelineError::OrderAlreadyExists(order.id));
        }
        orders.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn transition(
        &self,
        order_id: OrderId,
        allowed_from: &[OrderStatus],
        to: OrderStatus,
        patch: OrderPatch,
    ) -> Result<Transition> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&order_id)
            .ok_or(PipelineError::OrderNotFound(order_id))?;

        if !allowed_from.contains(&order.status) {
            return Ok(Transition::Superseded(order.clone()));
        }

        order.status = to;
        patch.apply_to(order);
        Ok(Transition::Applied(order.clone()))
    }

    async fn orders_for_account(&self, account_id: AccountId) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut result: Vec<Order> = orders
            .values()
            .filter(|o| o.account_id == account_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_and_get() {
        let store = InMemoryOrderStore::new();
        let order = Order::new(AccountId::new(), "mem://a.jpg");
        let order_id = order.id;

        store.insert(order.clone()).await.unwrap();
        let loaded = store.get(order_id).await.unwrap().unwrap();
        assert_eq!(loaded, order);
    }

    #[tokio::test]
    async fn insert_duplicate_fails() {
        let store = InMemoryOrderStore::new();
        let order = Order::new(AccountId::new(), "mem://a.jpg");

        store.insert(order.clone()).await.unwrap();
        let result = store.insert(order).await;
        assert!(matches!(result, Err(PipelineError::OrderAlreadyExists(_))));
    }

    #[tokio::test]
    async fn transition_applies_from_allowed_status() {
        let store = InMemoryOrderStore::new();
        let order = Order::new(AccountId::new(), "mem://a.jpg");
        let order_id = order.id;
        store.insert(order).await.unwrap();

        let result = store
            .transition(
                order_id,
                OrderStatus::OCR_ENTRY,
                OrderStatus::ProcessingOcr,
                OrderPatch::none(),
            )
            .await
            .unwrap();

        match result {
            Transition::Applied(order) => assert_eq!(order.status, OrderStatus::ProcessingOcr),
            Transition::Superseded(_) => panic!("expected Applied"),
        }
    }

    #[tokio::test]
    async fn transition_is_superseded_past_allowed_statuses() {
        let store = InMemoryOrderStore::new();
        let mut order = Order::new(AccountId::new(), "mem://a.jpg");
        order.status = OrderStatus::Completed;
        let order_id = order.id;
        store.insert(order).await.unwrap();

        let result = store
            .transition(
                order_id,
                OrderStatus::OCR_ENTRY,
                OrderStatus::ProcessingOcr,
                OrderPatch::none(),
            )
            .await
            .unwrap();

        match result {
            Transition::Superseded(order) => assert_eq!(order.status, OrderStatus::Completed),
            Transition::Applied(_) => panic!("expected Superseded"),
        }
    }

    #[tokio::test]
    async fn transition_patch_records_data() {
        let store = InMemoryOrderStore::new();
        let mut order = Order::new(AccountId::new(), "mem://a.jpg");
        order.status = OrderStatus::ProcessingOcr;
        let order_id = order.id;
        store.insert(order).await.unwrap();

        let patch = OrderPatch {
            ocr_text: Some("2x + 1 = 5".to_string()),
            ..OrderPatch::default()
        };
        store
            .transition(
                order_id,
                &[OrderStatus::ProcessingOcr],
                OrderStatus::OcrSuccessfulCreditPending,
                patch,
            )
            .await
            .unwrap();

        let loaded = store.get(order_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::OcrSuccessfulCreditPending);
        assert_eq!(loaded.ocr_text.as_deref(), Some("2x + 1 = 5"));
    }

    #[tokio::test]
    async fn orders_for_account_newest_first() {
        let store = InMemoryOrderStore::new();
        let account_id = AccountId::new();

        let mut first = Order::new(account_id, "mem://1.jpg");
        first.created_at = chrono::Utc::now() - chrono::Duration::seconds(10);
        let second = Order::new(account_id, "mem://2.jpg");
        let other = Order::new(AccountId::new(), "mem://3.jpg");

        store.insert(first.clone()).await.unwrap();
        store.insert(second.clone()).await.unwrap();
        store.insert(other).await.unwrap();

        let orders = store.orders_for_account(account_id).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id, second.id);
        assert_eq!(orders[1].id, first.id);
    }
}
