use crate::models::payment::PaymentStatus;
use thiserror::Error;

/// Errors surfaced to the intake layer by the lifecycle engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A payment with this idempotency key already exists. Callers should
    /// fetch the existing record instead of retrying the create.
    #[error("payment with idempotency key already exists: {0}")]
    DuplicateKey(String),
    #[error("payment not found: {0}")]
    NotFound(String),
    #[error("invalid payment: {0}")]
    InvalidPayment(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidPayment(msg.into())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("illegal transition {from} -> {to}")]
pub struct TransitionError {
    pub from: PaymentStatus,
    pub to: PaymentStatus,
}

/// Errors reported by a [`PaymentStore`](crate::storage::PaymentStore) backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("duplicate idempotency key: {0}")]
    DuplicateKey(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    IllegalTransition(#[from] TransitionError),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Unexpected errors from a provider adapter. Expected declines and
/// transient conditions are reported as a
/// [`ProviderOutcome`](crate::models::provider::ProviderOutcome) instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("provider internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
