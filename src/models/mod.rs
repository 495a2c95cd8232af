pub mod payment;
pub mod provider;

pub use payment::{FailureKind, NewPayment, Payment, PaymentStatus, Transition};
pub use provider::{ProviderOutcome, ProviderRequest};
