//! Bounded work queue feeding a pool of pipeline workers.

use std::sync::Arc;

use common::OrderId;
use ledger::LedgerStore;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::error::{PipelineError, Result};
use crate::orchestrator::PipelineOrchestrator;
use crate::providers::{AssemblyService, FileStorage, OcrProvider, SolutionProvider};
use crate::store::OrderStore;

/// Default bound on queued jobs before `enqueue` applies backpressure.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Hands submitted orders to a fixed pool of workers, each of which drives
/// [`PipelineOrchestrator::advance`] to a settled status.
///
/// Every order ID is carried by exactly one job at a time, so no two workers
/// ever drive the same order concurrently. Stage failures are persisted on
/// the order by the orchestrator; only infrastructure errors surface in the
/// worker log.
pub struct PipelineQueue {
    sender: mpsc::Sender<OrderId>,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl PipelineQueue {
    /// Spawns `workers` tasks draining a bounded channel of order IDs.
    pub fn start<St, L, O, A, V, F>(
        orchestrator: Arc<PipelineOrchestrator<St, L, O, A, V, F>>,
        workers: usize,
        capacity: usize,
    ) -> Self
    where
        St: OrderStore + 'static,
        L: LedgerStore + 'static,
        O: OcrProvider + 'static,
        A: SolutionProvider + 'static,
        V: AssemblyService + 'static,
        F: FileStorage + 'static,
    {
        let (sender, receiver) = mpsc::channel::<OrderId>(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let (shutdown, _) = watch::channel(false);

        let workers = (0..workers.max(1))
            .map(|worker| {
                let receiver = Arc::clone(&receiver);
                let orchestrator = Arc::clone(&orchestrator);
                let mut shutdown_rx = shutdown.subscribe();
                tokio::spawn(async move {
                    loop {
                        // Hold the lock only for the recv, not while working.
                        // Biased toward recv so queued jobs drain before the
                        // shutdown signal is honored.
                        let order_id = {
                            let mut receiver = receiver.lock().await;
                            tokio::select! {
                                biased;
                                order_id = receiver.recv() => order_id,
                                _ = shutdown_rx.changed() => None,
                            }
                        };
                        let Some(order_id) = order_id else {
                            break;
                        };

                        match orchestrator.advance(order_id).await {
                            Ok(status) => {
                                tracing::debug!(worker, %order_id, %status, "job settled");
                            }
                            Err(e) => {
                                metrics::counter!("pipeline_worker_errors_total").increment(1);
                                tracing::error!(worker, %order_id, error = %e, "job failed");
                            }
                        }
                    }
                    tracing::debug!(worker, "pipeline worker stopped");
                })
            })
            .collect();

        Self {
            sender,
            shutdown,
            workers,
        }
    }

    /// Queues an order for processing. Waits when the queue is full; fails
    /// with `QueueClosed` after shutdown.
    pub async fn enqueue(&self, order_id: OrderId) -> Result<()> {
        self.sender
            .send(order_id)
            .await
            .map_err(|_| PipelineError::QueueClosed)?;
        metrics::counter!("pipeline_jobs_enqueued_total").increment(1);
        Ok(())
    }

    /// Closes the queue and waits for workers to drain the remaining jobs.
    ///
    /// The shutdown signal stops the workers even if a cloned sender is
    /// still alive somewhere.
    pub async fn shutdown(self) {
        drop(self.sender);
        let _ = self.shutdown.send(true);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}
