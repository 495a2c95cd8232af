//! Payment lifecycle engine: idempotent intake, the payment state machine,
//! a rate-limited dispatch loop and the retry/recovery policy in front of an
//! external settlement provider.

pub mod app;
pub mod clock;
pub mod error;
pub mod models;
pub mod queue;
pub mod services;
pub mod storage;
pub mod utils;

pub use error::{EngineError, ProviderError, StoreError};
pub use models::{NewPayment, Payment, PaymentStatus};
pub use services::{Dispatcher, LifecycleEngine};
