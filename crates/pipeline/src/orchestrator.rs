//! Pipeline orchestrator: the only writer of order status.

use std::time::Duration;

use common::OrderId;
use ledger::{LedgerError, LedgerService, LedgerStore};

use crate::error::{PipelineError, Result};
use crate::order::OrderPatch;
use crate::providers::{
    AssemblyService, FileStorage, OcrProvider, ProviderError, SolutionProvider, SolutionSteps,
};
use crate::status::OrderStatus;
use crate::store::{OrderStore, Transition};

/// Default bound on a single collaborator call.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// What a single stage invocation did to the order.
enum StageOutcome {
    /// The stage succeeded and the order moved to the next pending status.
    Advanced,
    /// The order was not in a status this stage owns, or a stage wrote a
    /// failure status. The pipeline stops here with the observed status.
    Halted(OrderStatus),
}

/// Drives orders through OCR, credit deduction, AI solution, and assembly.
///
/// Each stage durably writes its in-progress status *before* calling the
/// external collaborator, then writes either the next pending status or the
/// stage's failure status plus a diagnostic. All status writes go through
/// [`OrderStore::transition`], so a stale or duplicate invocation observes
/// [`Transition::Superseded`] and becomes a no-op instead of re-running side
/// effects.
pub struct PipelineOrchestrator<St, L, O, A, V, F>
where
    St: OrderStore,
    L: LedgerStore,
    O: OcrProvider,
    A: SolutionProvider,
    V: AssemblyService,
    F: FileStorage,
{
    store: St,
    ledger: LedgerService<L>,
    ocr: O,
    solver: A,
    assembly: V,
    storage: F,
    stage_timeout: Duration,
}

impl<St, L, O, A, V, F> PipelineOrchestrator<St, L, O, A, V, F>
where
    St: OrderStore,
    L: LedgerStore,
    O: OcrProvider,
    A: SolutionProvider,
    V: AssemblyService,
    F: FileStorage,
{
    /// Creates a new orchestrator with the default stage timeout.
    pub fn new(store: St, ledger_store: L, ocr: O, solver: A, assembly: V, storage: F) -> Self {
        Self {
            store,
            ledger: LedgerService::new(ledger_store),
            ocr,
            solver,
            assembly,
            storage,
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
        }
    }

    /// Overrides the bound on a single collaborator call.
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Returns a reference to the order store.
    pub fn store(&self) -> &St {
        &self.store
    }

    /// Persists a new order so it can be advanced.
    pub async fn submit(&self, order: crate::Order) -> Result<crate::Order> {
        self.store.insert(order.clone()).await?;
        metrics::counter!("pipeline_orders_submitted_total").increment(1);
        tracing::info!(order_id = %order.id, account_id = %order.account_id, "order submitted");
        Ok(order)
    }

    /// Loads an order by ID.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<crate::Order>> {
        self.store.get(order_id).await
    }

    /// Advances an order as far as it will go and returns the status it
    /// settled in: `Completed`, a failure status, or whatever status a
    /// concurrent driver already moved it to.
    #[tracing::instrument(skip(self))]
    pub async fn advance(&self, order_id: OrderId) -> Result<OrderStatus> {
        let start = std::time::Instant::now();

        loop {
            let order = self
                .store
                .get(order_id)
                .await?
                .ok_or(PipelineError::OrderNotFound(order_id))?;

            let outcome = match order.status {
                OrderStatus::Pending | OrderStatus::OcrPending | OrderStatus::ProcessingOcr => {
                    self.run_ocr_stage(&order).await?
                }
                OrderStatus::OcrSuccessfulCreditPending => self.run_credit_stage(&order).await?,
                OrderStatus::AiSolutionPending => self.run_solution_stage(&order).await?,
                OrderStatus::GeneratingAudioPending
                | OrderStatus::RenderingAnimationPending
                | OrderStatus::AssemblingFinalPending => self.run_assembly_stage(&order).await?,
                status => StageOutcome::Halted(status),
            };

            match outcome {
                StageOutcome::Advanced => continue,
                StageOutcome::Halted(status) => {
                    metrics::histogram!("pipeline_advance_duration_seconds")
                        .record(start.elapsed().as_secs_f64());
                    return Ok(status);
                }
            }
        }
    }

    /// Re-enters the pipeline for a failed order.
    ///
    /// Moves the order from its failure status back to the failed stage's
    /// pending status, clears the diagnostic, and advances. A `Completed`
    /// order is not retryable; a non-failed order is advanced as-is, which
    /// re-drives work left behind by a crash.
    #[tracing::instrument(skip(self))]
    pub async fn retry(&self, order_id: OrderId) -> Result<OrderStatus> {
        let order = self
            .store
            .get(order_id)
            .await?
            .ok_or(PipelineError::OrderNotFound(order_id))?;

        if order.status == OrderStatus::Completed {
            return Err(PipelineError::NotRetryable {
                order_id,
                status: order.status,
            });
        }

        if let Some(reentry) = order.status.reentry_status() {
            match self
                .store
                .transition(order_id, &[order.status], reentry, OrderPatch::cleared())
                .await?
            {
                Transition::Applied(_) => {
                    metrics::counter!("pipeline_retries_total").increment(1);
                    tracing::info!(
                        %order_id, from = %order.status, to = %reentry, "order re-entered"
                    );
                }
                // Another driver already re-entered this order and owns it.
                Transition::Superseded(order) => return Ok(order.status),
            }
        }

        self.advance(order_id).await
    }

    /// OCR stage: read the uploaded image and extract the problem text.
    async fn run_ocr_stage(&self, order: &crate::Order) -> Result<StageOutcome> {
        // Durable in-progress status before the provider call.
        let order = match self
            .store
            .transition(
                order.id,
                OrderStatus::OCR_ENTRY,
                OrderStatus::ProcessingOcr,
                OrderPatch::none(),
            )
            .await?
        {
            Transition::Applied(order) => order,
            Transition::Superseded(order) => return Ok(StageOutcome::Halted(order.status)),
        };

        tracing::info!(order_id = %order.id, stage = "ocr", "stage started");

        let extraction = match self.bounded("ocr", self.read_and_extract(&order)).await {
            Ok(extraction) => extraction,
            Err(e) => {
                return self
                    .fail_stage(
                        order.id,
                        &[OrderStatus::ProcessingOcr],
                        OrderStatus::OcrFailed,
                        e.to_string(),
                    )
                    .await;
            }
        };

        if extraction.is_unreadable_marker() {
            return self
                .fail_stage(
                    order.id,
                    &[OrderStatus::ProcessingOcr],
                    OrderStatus::OcrFailed,
                    format!("image not readable as a math problem: {}", extraction.text),
                )
                .await;
        }

        let patch = OrderPatch {
            ocr_text: Some(extraction.text),
            ..OrderPatch::default()
        };
        self.complete_stage(
            order.id,
            &[OrderStatus::ProcessingOcr],
            OrderStatus::OcrSuccessfulCreditPending,
            patch,
        )
        .await
    }

    async fn read_and_extract(
        &self,
        order: &crate::Order,
    ) -> std::result::Result<crate::OcrExtraction, ProviderError> {
        let image = self.storage.read(&order.image_url).await?;
        self.ocr.extract(&image).await
    }

    /// Credit stage: deduct the order's credit cost through the ledger.
    ///
    /// The ledger records at most one `usage_resolution` entry per order, so
    /// a concurrent driver racing this stage cannot charge the account twice;
    /// the loser observes `DuplicateOrderDeduction` and simply moves on.
    async fn run_credit_stage(&self, order: &crate::Order) -> Result<StageOutcome> {
        tracing::info!(order_id = %order.id, stage = "credit_deduction", "stage started");

        match self
            .ledger
            .try_deduct(order.account_id, order.credits_consumed, order.id)
            .await
        {
            Ok(entry) => {
                tracing::info!(
                    order_id = %order.id,
                    balance_after = entry.balance_after,
                    "credits deducted"
                );
                self.complete_stage(
                    order.id,
                    &[OrderStatus::OcrSuccessfulCreditPending],
                    OrderStatus::AiSolutionPending,
                    OrderPatch::none(),
                )
                .await
            }
            // A concurrent driver already charged this order; advance without
            // a second entry. The transition is superseded if that driver has
            // moved the order on already.
            Err(LedgerError::DuplicateOrderDeduction(_)) => {
                self.complete_stage(
                    order.id,
                    &[OrderStatus::OcrSuccessfulCreditPending],
                    OrderStatus::AiSolutionPending,
                    OrderPatch::none(),
                )
                .await
            }
            Err(e @ LedgerError::InsufficientBalance { .. }) => {
                self.fail_stage(
                    order.id,
                    &[OrderStatus::OcrSuccessfulCreditPending],
                    OrderStatus::CreditDeductionFailed,
                    e.to_string(),
                )
                .await
            }
            Err(e) => {
                self.fail_stage(
                    order.id,
                    &[OrderStatus::OcrSuccessfulCreditPending],
                    OrderStatus::FailedGeneral,
                    format!("ledger error: {e}"),
                )
                .await
            }
        }
    }

    /// Solution stage: generate step-by-step solution content.
    async fn run_solution_stage(&self, order: &crate::Order) -> Result<StageOutcome> {
        tracing::info!(order_id = %order.id, stage = "ai_solution", "stage started");

        let problem_text = match order.ocr_text.as_deref() {
            Some(text) => text,
            None => {
                return self
                    .fail_stage(
                        order.id,
                        &[OrderStatus::AiSolutionPending],
                        OrderStatus::FailedGeneral,
                        "no OCR text recorded before solution stage",
                    )
                    .await;
            }
        };

        let hints: Vec<String> = order
            .source_exercise_id
            .iter()
            .map(|id| format!("source exercise {id}"))
            .collect();

        let solution = match self
            .bounded("ai_solution", self.solver.solve(problem_text, &hints))
            .await
        {
            Ok(solution) => solution,
            Err(e) => {
                return self
                    .fail_stage(
                        order.id,
                        &[OrderStatus::AiSolutionPending],
                        OrderStatus::AiSolutionFailed,
                        e.to_string(),
                    )
                    .await;
            }
        };

        let patch = OrderPatch {
            solution: Some(solution.to_value()),
            ..OrderPatch::default()
        };
        self.complete_stage(
            order.id,
            &[OrderStatus::AiSolutionPending],
            OrderStatus::AssemblingFinalPending,
            patch,
        )
        .await
    }

    /// Assembly stage: concatenate the per-step clips into the final video.
    ///
    /// Owns the audio and animation sub-steps, so it accepts entry from any
    /// of the three assembly-phase statuses.
    async fn run_assembly_stage(&self, order: &crate::Order) -> Result<StageOutcome> {
        let order = match self
            .store
            .transition(
                order.id,
                OrderStatus::ASSEMBLY_ENTRY,
                OrderStatus::AssemblingFinalPending,
                OrderPatch::none(),
            )
            .await?
        {
            Transition::Applied(order) => order,
            Transition::Superseded(order) => return Ok(StageOutcome::Halted(order.status)),
        };

        tracing::info!(order_id = %order.id, stage = "assembly", "stage started");

        let steps = match order
            .solution
            .as_ref()
            .and_then(|value| serde_json::from_value::<SolutionSteps>(value.clone()).ok())
        {
            Some(solution) => solution.steps,
            None => {
                return self
                    .fail_stage(
                        order.id,
                        &[OrderStatus::AssemblingFinalPending],
                        OrderStatus::FailedGeneral,
                        "no solution recorded before assembly stage",
                    )
                    .await;
            }
        };

        let video_clips: Vec<String> = (0..steps.len())
            .map(|i| format!("clips/{}/step-{i}.mp4", order.id))
            .collect();
        let audio_clips: Vec<String> = (0..steps.len())
            .map(|i| format!("clips/{}/step-{i}.wav", order.id))
            .collect();

        let final_url = match self
            .bounded("assembly", self.assembly.assemble(&video_clips, &audio_clips))
            .await
        {
            Ok(url) => url,
            Err(e) => {
                return self
                    .fail_stage(
                        order.id,
                        &[OrderStatus::AssemblingFinalPending],
                        OrderStatus::AssemblyFailed,
                        e.to_string(),
                    )
                    .await;
            }
        };

        let patch = OrderPatch {
            final_video_url: Some(final_url),
            completed_at: Some(chrono::Utc::now()),
            ..OrderPatch::default()
        };
        let outcome = self
            .complete_stage(
                order.id,
                &[OrderStatus::AssemblingFinalPending],
                OrderStatus::Completed,
                patch,
            )
            .await?;

        if matches!(outcome, StageOutcome::Advanced) {
            metrics::counter!("pipeline_orders_completed_total").increment(1);
            tracing::info!(order_id = %order.id, "order completed");
        }
        Ok(outcome)
    }

    /// Records a stage success transition.
    async fn complete_stage(
        &self,
        order_id: OrderId,
        allowed_from: &[OrderStatus],
        to: OrderStatus,
        patch: OrderPatch,
    ) -> Result<StageOutcome> {
        match self.store.transition(order_id, allowed_from, to, patch).await? {
            Transition::Applied(_) => Ok(StageOutcome::Advanced),
            Transition::Superseded(order) => Ok(StageOutcome::Halted(order.status)),
        }
    }

    /// Records a stage failure status plus its diagnostic.
    async fn fail_stage(
        &self,
        order_id: OrderId,
        allowed_from: &[OrderStatus],
        failure: OrderStatus,
        diagnostic: impl Into<String>,
    ) -> Result<StageOutcome> {
        let diagnostic = diagnostic.into();
        let transition = self
            .store
            .transition(
                order_id,
                allowed_from,
                failure,
                OrderPatch::diagnostic(&diagnostic),
            )
            .await?;

        metrics::counter!("pipeline_stage_failures_total").increment(1);
        tracing::warn!(%order_id, status = %failure, diagnostic, "stage failed");
        Ok(StageOutcome::Halted(transition.order().status))
    }

    /// Bounds a collaborator call with the stage timeout.
    async fn bounded<T>(
        &self,
        what: &str,
        fut: impl std::future::Future<Output = std::result::Result<T, ProviderError>>,
    ) -> std::result::Result<T, ProviderError> {
        match tokio::time::timeout(self.stage_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout(what)),
        }
    }
}
