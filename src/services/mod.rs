pub mod dispatcher;
pub mod lifecycle;
pub mod metrics;
pub mod mock_provider;
pub mod provider;
pub mod rate_limiter;

pub use dispatcher::{CycleReport, Dispatcher, DispatcherHandle};
pub use lifecycle::{LifecycleEngine, SettleOutcome, Summary};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use mock_provider::MockProvider;
pub use provider::{PaymentProvider, PaymentProviderRef};
pub use rate_limiter::{FixedWindowRateLimiter, RateLimiter};
