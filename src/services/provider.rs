use crate::error::ProviderError;
use crate::models::provider::{ProviderOutcome, ProviderRequest};
use async_trait::async_trait;
use std::sync::Arc;

/// External settlement provider.
///
/// Latency is bounded but not negligible. Timeouts must come back as
/// `ProviderOutcome::RetryableFailure`; an `Err` is treated as an unexpected
/// fault and fails the payment permanently.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn submit(&self, request: &ProviderRequest) -> Result<ProviderOutcome, ProviderError>;

    fn name(&self) -> &str;
}

pub type PaymentProviderRef = Arc<dyn PaymentProvider>;
