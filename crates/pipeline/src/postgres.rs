use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AccountId, OrderId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Order, OrderPatch, OrderStatus, OrderStore, PipelineError, Result, Transition,
};

/// PostgreSQL-backed order store implementation.
///
/// Status transitions compile to a single conditional `UPDATE`, so the
/// compare-and-set that guards stale stage invocations is atomic at the
/// database level.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

const ORDER_COLUMNS: &str = "id, account_id, source_exercise_id, image_url, status, ocr_text, \
     solution, final_video_url, error_message, credits_consumed, created_at, completed_at";

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
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

    fn row_to_order(row: PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        let status: OrderStatus = status.parse().map_err(|e: String| {
            PipelineError::Serialization(serde_json::Error::io(std::io::Error::other(e)))
        })?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            account_id: AccountId::from_uuid(row.try_get::<Uuid, _>("account_id")?),
            source_exercise_id: row.try_get("source_exercise_id")?,
            image_url: row.try_get("image_url")?,
            status,
            ocr_text: row.try_get("ocr_text")?,
            solution: row.try_get("solution")?,
            final_video_url: row.try_get("final_video_url")?,
            error_message: row.try_get("error_message")?,
            credits_consumed: row.try_get("credits_consumed")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert(&self, order: Order) -> Result<()> {
        sqlx::query(
            "INSERT INTO orders \
             (id, account_id, source_exercise_id, image_url, status, ocr_text, solution, \
              final_video_url, error_message, credits_consumed, created_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(order.id.as_uuid())
        .bind(order.account_id.as_uuid())
        .bind(order.source_exercise_id)
        .bind(&order.image_url)
        .bind(order.status.as_str())
        .bind(&order.ocr_text)
        .bind(&order.solution)
        .bind(&order.final_video_url)
        .bind(&order.error_message)
        .bind(order.credits_consumed)
        .bind(order.created_at)
        .bind(order.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return PipelineError::OrderAlreadyExists(order.id);
            }
            PipelineError::Database(e)
        })?;
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(order_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn transition(
        &self,
        order_id: OrderId,
        allowed_from: &[OrderStatus],
        to: OrderStatus,
        patch: OrderPatch,
    ) -> Result<Transition> {
        let allowed: Vec<&str> = allowed_from.iter().map(|s| s.as_str()).collect();

        let row: Option<PgRow> = sqlx::query(&format!(
            "UPDATE orders SET \
                 status = $2, \
                 ocr_text = COALESCE($3, ocr_text), \
                 solution = COALESCE($4, solution), \
                 final_video_url = COALESCE($5, final_video_url), \
                 error_message = CASE WHEN $6 THEN NULL ELSE COALESCE($7, error_message) END, \
                 completed_at = COALESCE($8, completed_at) \
             WHERE id = $1 AND status = ANY($9) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id.as_uuid())
        .bind(to.as_str())
        .bind(&patch.ocr_text)
        .bind(&patch.solution)
        .bind(&patch.final_video_url)
        .bind(patch.clear_error)
        .bind(&patch.error_message)
        .bind(patch.completed_at)
        .bind(&allowed)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Transition::Applied(Self::row_to_order(row)?)),
            None => {
                let current = self
                    .get(order_id)
                    .await?
                    .ok_or(PipelineError::OrderNotFound(order_id))?;
                Ok(Transition::Superseded(current))
            }
        }
    }

    async fn orders_for_account(&self, account_id: AccountId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE account_id = $1 ORDER BY created_at DESC"
        ))
        .bind(account_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }
}
