#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use payment_gateway::app::config::{DispatcherSettings, EngineSettings};
use payment_gateway::clock::ManualClock;
use payment_gateway::models::provider::{ProviderOutcome, ProviderRequest};
use payment_gateway::services::{
    Dispatcher, FixedWindowRateLimiter, LifecycleEngine, PaymentProvider,
};
use payment_gateway::storage::InMemoryPaymentStore;
use payment_gateway::{NewPayment, ProviderError};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub enum Step {
    Outcome(ProviderOutcome),
    Error(ProviderError),
    Panic,
}

/// Provider that replays a script and then succeeds. Tracks how many calls
/// were in flight per transaction at once.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Step>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    submitted: Mutex<Vec<String>>,
    in_flight: Mutex<HashMap<String, usize>>,
    max_in_flight_per_tx: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            delay: None,
            calls: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
            in_flight: Mutex::new(HashMap::new()),
            max_in_flight_per_tx: AtomicUsize::new(0),
        }
    }

    pub fn always_succeeds() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().clone()
    }

    pub fn max_in_flight_per_tx(&self) -> usize {
        self.max_in_flight_per_tx.load(Ordering::SeqCst)
    }

    fn enter(&self, tx: &str) {
        let mut in_flight = self.in_flight.lock();
        let count = in_flight.entry(tx.to_string()).or_insert(0);
        *count += 1;
        self.max_in_flight_per_tx.fetch_max(*count, Ordering::SeqCst);
    }

    fn leave(&self, tx: &str) {
        if let Some(count) = self.in_flight.lock().get_mut(tx) {
            *count -= 1;
        }
    }
}

#[async_trait]
impl PaymentProvider for ScriptedProvider {
    async fn submit(&self, request: &ProviderRequest) -> Result<ProviderOutcome, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.submitted.lock().push(request.transaction_id.clone());
        self.enter(&request.transaction_id);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.leave(&request.transaction_id);

        let step = self.script.lock().pop_front();
        match step {
            Some(Step::Outcome(outcome)) => Ok(outcome),
            Some(Step::Error(e)) => Err(e),
            Some(Step::Panic) => panic!("scripted provider panic"),
            None => Ok(ProviderOutcome::success(format!("REF_{}", n))),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub struct Harness {
    pub engine: Arc<LifecycleEngine>,
    pub dispatcher: Arc<Dispatcher>,
    pub store: Arc<InMemoryPaymentStore>,
    pub provider: Arc<ScriptedProvider>,
    pub clock: Arc<ManualClock>,
    pub limiter: Arc<FixedWindowRateLimiter>,
}

pub struct HarnessBuilder {
    provider: ScriptedProvider,
    max_rate: u32,
    max_retries: u32,
    settle_concurrency: usize,
}

impl HarnessBuilder {
    pub fn max_rate(mut self, max_rate: u32) -> Self {
        self.max_rate = max_rate;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn settle_concurrency(mut self, n: usize) -> Self {
        self.settle_concurrency = n;
        self
    }

    pub fn build(self) -> Harness {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()));
        let store = Arc::new(InMemoryPaymentStore::new());
        let provider = Arc::new(self.provider);
        let limiter = Arc::new(FixedWindowRateLimiter::new(
            self.max_rate,
            Duration::from_secs(1),
            Duration::from_millis(100),
            clock.clone(),
        ));
        let engine = Arc::new(LifecycleEngine::new(
            store.clone(),
            provider.clone(),
            clock.clone(),
            EngineSettings {
                max_retries: self.max_retries,
                stale_after: Duration::from_secs(300),
            },
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            engine.clone(),
            limiter.clone(),
            DispatcherSettings {
                interval: Duration::from_secs(5),
                settle_concurrency: self.settle_concurrency,
            },
        ));

        Harness {
            engine,
            dispatcher,
            store,
            provider,
            clock,
            limiter,
        }
    }
}

pub fn harness(provider: ScriptedProvider) -> HarnessBuilder {
    HarnessBuilder {
        provider,
        max_rate: 2,
        max_retries: 3,
        settle_concurrency: 1,
    }
}

pub fn payload(amount: Decimal) -> NewPayment {
    NewPayment {
        amount,
        currency: "USD".to_string(),
        merchant_id: "merchant-1".to_string(),
        customer_id: "customer-1".to_string(),
        description: Some("test order".to_string()),
    }
}

pub fn retryable(reason: &str) -> Step {
    Step::Outcome(ProviderOutcome::retryable(reason))
}

pub fn permanent(reason: &str) -> Step {
    Step::Outcome(ProviderOutcome::permanent(reason))
}
