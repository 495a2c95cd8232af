//! Storage port consumed by the lifecycle engine.
//!
//! A backend must enforce idempotency-key uniqueness natively and apply
//! status changes as an atomic read-check-write per record. The engine never
//! does check-then-insert or read-then-write on its own.

pub mod in_memory;

use crate::error::StoreError;
use crate::models::payment::{Payment, PaymentStatus, Transition};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub use in_memory::InMemoryPaymentStore;

pub type PaymentStoreRef = Arc<dyn PaymentStore>;

/// Precondition for [`PaymentStore::compare_and_swap_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expected {
    pub status: PaymentStatus,
    /// When set, the record's claim counter must also match.
    pub attempts: Option<u32>,
}

impl Expected {
    pub fn status(status: PaymentStatus) -> Self {
        Self { status, attempts: None }
    }

    pub fn claim(status: PaymentStatus, attempts: u32) -> Self {
        Self { status, attempts: Some(attempts) }
    }

    pub fn matches(&self, payment: &Payment) -> bool {
        payment.status == self.status && self.attempts.map_or(true, |a| a == payment.attempts)
    }
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts a new record, failing with [`StoreError::DuplicateKey`] when
    /// the idempotency key is already taken.
    async fn insert_unique(&self, payment: Payment) -> Result<Payment, StoreError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Payment, StoreError>;

    async fn get_by_key(&self, idempotency_key: &str) -> Result<Payment, StoreError>;

    /// Applies `transition` only if the record still satisfies `expected`.
    /// Returns the updated record, or `None` when the precondition no longer
    /// holds.
    async fn compare_and_swap_status(
        &self,
        id: Uuid,
        expected: Expected,
        transition: Transition,
        at: DateTime<Utc>,
    ) -> Result<Option<Payment>, StoreError>;

    /// Records in `status`, oldest `created_at` first.
    async fn list_by_status(&self, status: PaymentStatus) -> Result<Vec<Payment>, StoreError>;

    /// Records in `status` whose `updated_at` is strictly before `updated_before`.
    async fn list_stale(
        &self,
        status: PaymentStatus,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Payment>, StoreError>;

    async fn count_by_status(&self, status: PaymentStatus) -> Result<usize, StoreError>;
}
