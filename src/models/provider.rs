use crate::models::payment::Payment;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// Payload enviado ao provider de settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
    pub amount: Decimal,
    pub currency: String,
    #[serde(rename = "merchantId")]
    pub merchant_id: String,
    #[serde(rename = "customerId")]
    pub customer_id: String,
    pub description: Option<String>,
}

impl From<&Payment> for ProviderRequest {
    fn from(payment: &Payment) -> Self {
        Self {
            transaction_id: payment.id.to_string(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            merchant_id: payment.merchant_id.clone(),
            customer_id: payment.customer_id.clone(),
            description: payment.description.clone(),
        }
    }
}

/// What the provider decided about a single submission. Whether a failure
/// is retryable is the provider's call, never inferred by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProviderOutcome {
    Success { reference: String },
    RetryableFailure { reason: String },
    PermanentFailure { reason: String },
}

impl ProviderOutcome {
    pub fn success(reference: impl Into<String>) -> Self {
        Self::Success { reference: reference.into() }
    }

    pub fn retryable(reason: impl Into<String>) -> Self {
        Self::RetryableFailure { reason: reason.into() }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::PermanentFailure { reason: reason.into() }
    }
}
