use crate::app::config::EngineSettings;
use crate::clock::Clock;
use crate::error::{EngineError, StoreError};
use crate::models::payment::{FailureKind, NewPayment, Payment, PaymentStatus, Transition};
use crate::models::provider::{ProviderOutcome, ProviderRequest};
use crate::services::metrics::{EngineMetrics, MetricsSnapshot};
use crate::services::provider::PaymentProviderRef;
use crate::storage::{Expected, PaymentStoreRef};
use crate::utils::money;
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Result of one `settle` call on a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleOutcome {
    Completed { reference: String },
    /// Back in the eligible pool after a retryable failure.
    Retrying { retry_count: u32 },
    Failed { kind: FailureKind },
    /// The payment was not `PENDING` when the claim was attempted.
    NotClaimed { status: PaymentStatus },
    /// The claim was reclaimed or superseded while the provider call was in
    /// flight; the provider result was discarded.
    Superseded,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub metrics: MetricsSnapshot,
}

/// Owns the payment state machine. Intake calls `create`; the dispatcher
/// path is the only caller of `settle` and `reclaim_stale`.
pub struct LifecycleEngine {
    store: PaymentStoreRef,
    provider: PaymentProviderRef,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    metrics: Arc<EngineMetrics>,
}

impl LifecycleEngine {
    pub fn new(
        store: PaymentStoreRef,
        provider: PaymentProviderRef,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            provider,
            clock,
            settings,
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        self.metrics.clone()
    }

    pub async fn create(
        &self,
        idempotency_key: impl Into<String>,
        payload: NewPayment,
    ) -> Result<Payment, EngineError> {
        let idempotency_key = idempotency_key.into();
        if idempotency_key.trim().is_empty() {
            return Err(EngineError::invalid("idempotency key is required"));
        }
        payload.validate()?;

        let payment = Payment::new(idempotency_key, payload, self.clock.now());
        match self.store.insert_unique(payment).await {
            Ok(payment) => {
                self.metrics.increment_created();
                info!(
                    payment_id = %payment.id,
                    idempotency_key = %payment.idempotency_key,
                    amount = %money::format_amount(payment.amount, &payment.currency),
                    amount_range = money::amount_bucket(payment.amount),
                    "created payment"
                );
                Ok(payment)
            }
            Err(StoreError::DuplicateKey(key)) => {
                self.metrics.increment_duplicates_rejected();
                warn!(idempotency_key = %key, "duplicate payment attempt rejected");
                Err(EngineError::DuplicateKey(key))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Payment, EngineError> {
        self.store.get_by_id(id).await.map_err(not_found)
    }

    pub async fn get_by_idempotency_key(&self, key: &str) -> Result<Payment, EngineError> {
        self.store.get_by_key(key).await.map_err(not_found)
    }

    /// `PENDING` payments still within budget, oldest first.
    pub async fn eligible_payments(&self) -> Result<Vec<Payment>, EngineError> {
        let max_retries = self.settings.max_retries;
        let pending = self.store.list_by_status(PaymentStatus::Pending).await?;
        Ok(pending
            .into_iter()
            .filter(|p| p.retry_count <= max_retries)
            .collect())
    }

    /// Moves orphaned `PROCESSING` records back to `PENDING`. Returns how
    /// many were reclaimed.
    pub async fn reclaim_stale(&self) -> Result<usize, EngineError> {
        let now = self.clock.now();
        let stale_after = chrono::Duration::from_std(self.settings.stale_after)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        let cutoff = now - stale_after;

        let mut reclaimed = 0;
        for payment in self.store.list_stale(PaymentStatus::Processing, cutoff).await? {
            let expected = Expected::claim(PaymentStatus::Processing, payment.attempts);
            match self
                .store
                .compare_and_swap_status(payment.id, expected, Transition::Reclaim, now)
                .await
            {
                Ok(Some(_)) => {
                    reclaimed += 1;
                    warn!(
                        payment_id = %payment.id,
                        stuck_since = %payment.updated_at,
                        "reclaimed orphaned payment"
                    );
                }
                Ok(None) => {}
                Err(e) => error!(payment_id = %payment.id, error = %e, "failed to reclaim payment"),
            }
        }

        if reclaimed > 0 {
            self.metrics.add_reclaimed(reclaimed as u64);
        }
        Ok(reclaimed)
    }

    /// Claims the payment, submits it to the provider and persists the
    /// resulting transition. Each step is written on its own so a crash
    /// loses at most the in-flight call.
    #[instrument(skip(self), fields(provider = %self.provider.name()))]
    pub async fn settle(&self, id: Uuid) -> Result<SettleOutcome, EngineError> {
        let claimed = match self
            .store
            .compare_and_swap_status(
                id,
                Expected::status(PaymentStatus::Pending),
                Transition::Claim,
                self.clock.now(),
            )
            .await
            .map_err(not_found)?
        {
            Some(payment) => payment,
            None => {
                let current = self.get(id).await?;
                warn!(payment_id = %id, status = %current.status, "payment is not pending, skipping");
                return Ok(SettleOutcome::NotClaimed { status: current.status });
            }
        };

        let request = ProviderRequest::from(&claimed);
        let submitted = AssertUnwindSafe(self.provider.submit(&request))
            .catch_unwind()
            .await;

        let transition = match submitted {
            Ok(Ok(ProviderOutcome::Success { reference })) => Transition::Complete { reference },
            Ok(Ok(ProviderOutcome::RetryableFailure { reason })) => {
                claimed.retry_or_exhaust(reason, self.settings.max_retries)
            }
            Ok(Ok(ProviderOutcome::PermanentFailure { reason })) => Transition::Fail {
                reason,
                kind: FailureKind::PermanentProviderFailure,
            },
            Ok(Err(e)) => {
                self.metrics.increment_provider_faults();
                error!(payment_id = %id, error = %e, "unexpected provider error");
                Transition::Fail {
                    reason: format!("Internal processing error: {}", e),
                    kind: FailureKind::ProviderFault,
                }
            }
            Err(_) => {
                self.metrics.increment_provider_faults();
                error!(payment_id = %id, "provider panicked during submission");
                Transition::Fail {
                    reason: "Internal processing error: provider panicked".to_string(),
                    kind: FailureKind::ProviderFault,
                }
            }
        };

        let expected = Expected::claim(PaymentStatus::Processing, claimed.attempts);
        let settled = self
            .store
            .compare_and_swap_status(id, expected, transition, self.clock.now())
            .await?;

        let Some(payment) = settled else {
            warn!(payment_id = %id, attempt = claimed.attempts, "claim superseded, discarding provider result");
            return Ok(SettleOutcome::Superseded);
        };

        Ok(self.record_outcome(&payment))
    }

    fn record_outcome(&self, payment: &Payment) -> SettleOutcome {
        match payment.status {
            PaymentStatus::Completed => {
                self.metrics.increment_completed();
                let reference = payment.provider_reference.clone().unwrap_or_default();
                info!(payment_id = %payment.id, provider_reference = %reference, "payment completed");
                SettleOutcome::Completed { reference }
            }
            PaymentStatus::Pending => {
                self.metrics.increment_retried();
                warn!(
                    payment_id = %payment.id,
                    attempt = payment.retry_count,
                    reason = payment.failure_reason.as_deref().unwrap_or_default(),
                    "payment failed, will retry"
                );
                SettleOutcome::Retrying { retry_count: payment.retry_count }
            }
            PaymentStatus::Failed => {
                self.metrics.increment_failed();
                let kind = payment.failure_kind.unwrap_or(FailureKind::PermanentProviderFailure);
                error!(
                    payment_id = %payment.id,
                    ?kind,
                    reason = payment.failure_reason.as_deref().unwrap_or_default(),
                    "payment permanently failed"
                );
                SettleOutcome::Failed { kind }
            }
            PaymentStatus::Processing => SettleOutcome::Superseded,
        }
    }

    pub async fn summary(&self) -> Result<Summary, EngineError> {
        Ok(Summary {
            pending: self.store.count_by_status(PaymentStatus::Pending).await?,
            processing: self.store.count_by_status(PaymentStatus::Processing).await?,
            completed: self.store.count_by_status(PaymentStatus::Completed).await?,
            failed: self.store.count_by_status(PaymentStatus::Failed).await?,
            metrics: self.metrics.snapshot(),
        })
    }
}

fn not_found(e: StoreError) -> EngineError {
    match e {
        StoreError::NotFound(what) => EngineError::NotFound(what),
        other => EngineError::Store(other),
    }
}
