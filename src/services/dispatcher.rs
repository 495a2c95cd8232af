use crate::app::config::DispatcherSettings;
use crate::error::EngineError;
use crate::models::payment::{FailureKind, Payment};
use crate::services::lifecycle::{LifecycleEngine, SettleOutcome};
use crate::services::rate_limiter::RateLimiter;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub reclaimed: usize,
    pub eligible: usize,
    pub attempted: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
    /// The cycle ended early because the limiter denied a permit.
    pub rate_limited: bool,
}

impl CycleReport {
    fn record(&mut self, id: Uuid, result: Result<SettleOutcome, EngineError>) {
        match result {
            Ok(SettleOutcome::Completed { .. }) => self.completed += 1,
            Ok(SettleOutcome::Retrying { .. }) => self.retried += 1,
            Ok(SettleOutcome::Failed { kind }) => {
                self.failed += 1;
                if kind == FailureKind::RetryBudgetExhausted {
                    debug!(payment_id = %id, "retry budget exhausted");
                }
            }
            Ok(SettleOutcome::NotClaimed { .. }) | Ok(SettleOutcome::Superseded) => self.skipped += 1,
            Err(e) => {
                self.errors += 1;
                error!(payment_id = %id, error = %e, "settlement failed, continuing cycle");
            }
        }
    }
}

/// Drives eligible payments through the provider at the limiter's pace.
pub struct Dispatcher {
    engine: Arc<LifecycleEngine>,
    limiter: Arc<dyn RateLimiter>,
    settings: DispatcherSettings,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<LifecycleEngine>,
        limiter: Arc<dyn RateLimiter>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            engine,
            limiter,
            settings,
        }
    }

    /// One pass: staleness sweep, then FIFO over eligible payments until the
    /// list is exhausted or the limiter says no. A denial ends the cycle so
    /// younger payments never take budget meant for older ones.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        match self.engine.reclaim_stale().await {
            Ok(n) => report.reclaimed = n,
            Err(e) => error!(error = %e, "staleness sweep failed"),
        }

        let eligible = match self.engine.eligible_payments().await {
            Ok(payments) => payments,
            Err(e) => {
                error!(error = %e, "failed to list pending payments");
                return report;
            }
        };
        report.eligible = eligible.len();
        if eligible.is_empty() {
            return report;
        }
        info!(count = eligible.len(), "found pending payments to process");

        let batch_size = self.settings.settle_concurrency.max(1);
        let mut queue = eligible.into_iter();

        while !report.rate_limited {
            let batch = self.admit_batch(&mut queue, batch_size, &mut report);
            if batch.is_empty() {
                break;
            }
            report.attempted += batch.len();
            self.settle_batch(batch, &mut report).await;
        }

        if report.rate_limited {
            self.engine.metrics().increment_rate_limited();
        }
        report
    }

    /// Takes up to `size` payments in order, one permit each. Stops at the
    /// first denial.
    fn admit_batch(
        &self,
        queue: &mut impl Iterator<Item = Payment>,
        size: usize,
        report: &mut CycleReport,
    ) -> Vec<Payment> {
        let mut batch = Vec::with_capacity(size);
        while batch.len() < size {
            let Some(payment) = queue.next() else {
                break;
            };
            if self.limiter.try_acquire_one() {
                batch.push(payment);
            } else {
                debug!(payment_id = %payment.id, "rate limit exceeded, deferring to next cycle");
                report.rate_limited = true;
                break;
            }
        }
        batch
    }

    async fn settle_batch(&self, batch: Vec<Payment>, report: &mut CycleReport) {
        if batch.len() == 1 {
            let id = batch[0].id;
            report.record(id, self.engine.settle(id).await);
            return;
        }

        let futures: Vec<_> = batch
            .iter()
            .map(|payment| self.engine.settle(payment.id))
            .collect();
        let results = futures::future::join_all(futures).await;

        for (payment, result) in batch.iter().zip(results) {
            report.record(payment.id, result);
        }
    }

    /// Single-shot settlement if a permit is free right now. Returns `None`
    /// when rate limited; the payment stays queued for the next cycle.
    pub async fn dispatch_now(&self, id: Uuid) -> Result<Option<SettleOutcome>, EngineError> {
        if !self.limiter.try_acquire_one() {
            info!(payment_id = %id, "rate limit exceeded, payment queued for later processing");
            self.engine.metrics().increment_rate_limited();
            return Ok(None);
        }
        self.engine.settle(id).await.map(Some)
    }

    /// Single-shot settlement that waits for a permit first.
    pub async fn dispatch_when_permitted(&self, id: Uuid) -> Result<SettleOutcome, EngineError> {
        self.limiter.wait_for_permit().await;
        self.engine.settle(id).await
    }

    /// Runs the periodic loop on the current runtime. Immediate triggers
    /// are coalesced into a single extra cycle.
    pub fn spawn(self: Arc<Self>, mut triggers: mpsc::Receiver<Uuid>) -> DispatcherHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let interval = self.settings.interval;

        let join = tokio::spawn(async move {
            info!(interval_ms = interval.as_millis() as u64, "starting dispatcher");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        self.run_cycle().await;
                    }
                    Some(id) = triggers.recv() => {
                        let mut coalesced = 1;
                        while triggers.try_recv().is_ok() {
                            coalesced += 1;
                        }
                        debug!(payment_id = %id, coalesced, "immediate dispatch triggered");
                        self.run_cycle().await;
                    }
                }
            }
            info!("dispatcher stopped");
        });

        DispatcherHandle {
            shutdown: shutdown_tx,
            join,
        }
    }
}

/// Dropping the handle without calling `shutdown` also stops the loop.
pub struct DispatcherHandle {
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Stops after the cycle in progress, if any, finishes.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.join.await {
            warn!(error = %e, "dispatcher task ended abnormally");
        }
    }
}
