use crate::error::{EngineError, TransitionError};
use crate::utils::money;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Completed,
        PaymentStatus::Failed,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }

    /// The full edge set of the payment state machine. Nothing leaves a
    /// terminal state.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Processing, Completed) | (Processing, Failed) | (Processing, Pending)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Why the last attempt on a payment did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    RetryableProviderFailure,
    PermanentProviderFailure,
    RetryBudgetExhausted,
    OrphanedProcessing,
    /// The provider returned an error or panicked instead of an outcome.
    ProviderFault,
}

/// A single edge of the state machine together with the fields it writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Claim,
    Complete { reference: String },
    Retry { reason: String },
    Fail { reason: String, kind: FailureKind },
    Reclaim,
}

impl Transition {
    pub fn target(&self) -> PaymentStatus {
        match self {
            Transition::Claim => PaymentStatus::Processing,
            Transition::Complete { .. } => PaymentStatus::Completed,
            Transition::Retry { .. } | Transition::Reclaim => PaymentStatus::Pending,
            Transition::Fail { .. } => PaymentStatus::Failed,
        }
    }
}

/// Business payload supplied at intake. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    pub amount: Decimal,
    pub currency: String,
    pub merchant_id: String,
    pub customer_id: String,
    pub description: Option<String>,
}

impl NewPayment {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.amount <= Decimal::ZERO {
            return Err(EngineError::invalid("amount must be positive"));
        }
        if !money::is_currency_code(&self.currency) {
            return Err(EngineError::invalid(format!(
                "currency must be a 3-letter code, got {:?}",
                self.currency
            )));
        }
        if self.merchant_id.trim().is_empty() {
            return Err(EngineError::invalid("merchant_id is required"));
        }
        if self.customer_id.trim().is_empty() {
            return Err(EngineError::invalid("customer_id is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub idempotency_key: String,
    pub amount: Decimal,
    pub currency: String,
    pub merchant_id: String,
    pub customer_id: String,
    pub description: Option<String>,
    pub status: PaymentStatus,
    pub provider_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub failure_kind: Option<FailureKind>,
    pub retry_count: u32,
    /// Number of claims so far. Settlement writes are conditioned on it so a
    /// late result from a reclaimed attempt cannot land on a newer claim.
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn new(idempotency_key: String, payload: NewPayment, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            idempotency_key,
            amount: payload.amount,
            currency: payload.currency,
            merchant_id: payload.merchant_id,
            customer_id: payload.customer_id,
            description: payload.description,
            status: PaymentStatus::Pending,
            provider_reference: None,
            failure_reason: None,
            failure_kind: None,
            retry_count: 0,
            attempts: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Picks the transition for a retryable provider failure: back to the
    /// pool while budget remains, terminal otherwise.
    pub fn retry_or_exhaust(&self, reason: String, max_retries: u32) -> Transition {
        if self.retry_count < max_retries {
            Transition::Retry { reason }
        } else {
            Transition::Fail {
                reason,
                kind: FailureKind::RetryBudgetExhausted,
            }
        }
    }

    pub fn apply(&mut self, transition: Transition, at: DateTime<Utc>) -> Result<(), TransitionError> {
        let to = transition.target();
        if !self.status.can_transition_to(to) {
            return Err(TransitionError { from: self.status, to });
        }

        match transition {
            Transition::Claim => {
                self.attempts += 1;
            }
            Transition::Complete { reference } => {
                self.provider_reference = Some(reference);
            }
            Transition::Retry { reason } => {
                self.retry_count += 1;
                self.failure_reason = Some(reason);
                self.failure_kind = Some(FailureKind::RetryableProviderFailure);
            }
            Transition::Fail { reason, kind } => {
                self.failure_reason = Some(reason);
                self.failure_kind = Some(kind);
            }
            Transition::Reclaim => {
                self.failure_kind = Some(FailureKind::OrphanedProcessing);
            }
        }

        self.status = to;
        self.updated_at = at;
        if to.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(at);
        }
        Ok(())
    }
}
