use crate::app::config::MockProviderSettings;
use crate::error::ProviderError;
use crate::models::provider::{ProviderOutcome, ProviderRequest};
use crate::services::provider::PaymentProvider;
use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

/// Simulated provider with random latency and a fixed outcome mix.
pub struct MockProvider {
    settings: MockProviderSettings,
    transaction_counter: AtomicU64,
}

impl MockProvider {
    pub fn new(settings: MockProviderSettings) -> Self {
        Self {
            settings,
            transaction_counter: AtomicU64::new(0),
        }
    }

    fn roll(&self) -> (Duration, u32) {
        let mut rng = rand::thread_rng();
        let min = self.settings.min_latency_ms;
        let max = self.settings.max_latency_ms;
        let latency_ms = if max > min { rng.gen_range(min..max) } else { min };
        (Duration::from_millis(latency_ms), rng.gen_range(0..100))
    }

    fn outcome_for(&self, roll: u32, request: &ProviderRequest) -> ProviderOutcome {
        let retryable = self.settings.retryable_percent;
        let permanent = retryable + self.settings.permanent_percent;

        if roll < retryable {
            warn!(transaction_id = %request.transaction_id, "mock provider transient failure");
            ProviderOutcome::retryable("Temporary service unavailable")
        } else if roll < permanent {
            error!(transaction_id = %request.transaction_id, "mock provider permanent failure");
            ProviderOutcome::permanent("Card declined")
        } else {
            let n = self.transaction_counter.fetch_add(1, Ordering::Relaxed) + 1;
            let reference = format!("MOCK_TXN_{}", n);
            info!(transaction_id = %request.transaction_id, %reference, "mock provider accepted payment");
            ProviderOutcome::success(reference)
        }
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    async fn submit(&self, request: &ProviderRequest) -> Result<ProviderOutcome, ProviderError> {
        info!(
            transaction_id = %request.transaction_id,
            amount = %request.amount,
            currency = %request.currency,
            "mock provider processing payment"
        );

        let (latency, roll) = self.roll();
        tokio::time::sleep(latency).await;

        Ok(self.outcome_for(roll, request))
    }

    fn name(&self) -> &str {
        "MockPaymentProvider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> ProviderRequest {
        ProviderRequest {
            transaction_id: "tx-1".into(),
            amount: dec!(10.00),
            currency: "USD".into(),
            merchant_id: "m-1".into(),
            customer_id: "c-1".into(),
            description: None,
        }
    }

    fn settings(retryable: u32, permanent: u32) -> MockProviderSettings {
        MockProviderSettings {
            min_latency_ms: 0,
            max_latency_ms: 0,
            retryable_percent: retryable,
            permanent_percent: permanent,
        }
    }

    #[test]
    fn test_outcome_bands() {
        let provider = MockProvider::new(settings(5, 3));
        let req = request();

        assert!(matches!(provider.outcome_for(0, &req), ProviderOutcome::RetryableFailure { .. }));
        assert!(matches!(provider.outcome_for(4, &req), ProviderOutcome::RetryableFailure { .. }));
        assert_eq!(provider.outcome_for(5, &req), ProviderOutcome::permanent("Card declined"));
        assert_eq!(provider.outcome_for(7, &req), ProviderOutcome::permanent("Card declined"));
        assert_eq!(provider.outcome_for(8, &req), ProviderOutcome::success("MOCK_TXN_1"));
        assert_eq!(provider.outcome_for(99, &req), ProviderOutcome::success("MOCK_TXN_2"));
    }

    #[tokio::test]
    async fn test_always_succeeds_without_failure_bands() {
        let provider = MockProvider::new(settings(0, 0));
        for _ in 0..20 {
            let outcome = provider.submit(&request()).await.unwrap();
            assert!(matches!(outcome, ProviderOutcome::Success { .. }));
        }
    }
}
