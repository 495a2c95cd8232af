use super::{Expected, PaymentStore};
use crate::error::StoreError;
use crate::models::payment::{Payment, PaymentStatus, Transition};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredPayment {
    seq: u64,
    payment: Payment,
}

/// Concurrent in-memory payment store.
///
/// The key index and the record map are separate `DashMap`s. Inserts take
/// the key's shard lock through the entry API, so uniqueness needs no
/// application-level check. Status changes run under the record's shard
/// write lock via `get_mut`.
#[derive(Debug, Default)]
pub struct InMemoryPaymentStore {
    records: DashMap<Uuid, StoredPayment>,
    keys: DashMap<String, Uuid>,
    next_seq: AtomicU64,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn collect_sorted<F>(&self, filter: F) -> Vec<Payment>
    where
        F: Fn(&Payment) -> bool,
    {
        let mut matching: Vec<(DateTime<Utc>, u64, Payment)> = self
            .records
            .iter()
            .filter(|entry| filter(&entry.payment))
            .map(|entry| (entry.payment.created_at, entry.seq, entry.payment.clone()))
            .collect();
        // Insertion order breaks ties between identical timestamps.
        matching.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        matching.into_iter().map(|(_, _, p)| p).collect()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert_unique(&self, payment: Payment) -> Result<Payment, StoreError> {
        match self.keys.entry(payment.idempotency_key.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey(payment.idempotency_key)),
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                self.records.insert(
                    payment.id,
                    StoredPayment {
                        seq,
                        payment: payment.clone(),
                    },
                );
                slot.insert(payment.id);
                Ok(payment)
            }
        }
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Payment, StoreError> {
        self.records
            .get(&id)
            .map(|entry| entry.payment.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn get_by_key(&self, idempotency_key: &str) -> Result<Payment, StoreError> {
        let id = self
            .keys
            .get(idempotency_key)
            .map(|entry| *entry.value())
            .ok_or_else(|| StoreError::NotFound(idempotency_key.to_string()))?;
        self.get_by_id(id).await
    }

    async fn compare_and_swap_status(
        &self,
        id: Uuid,
        expected: Expected,
        transition: Transition,
        at: DateTime<Utc>,
    ) -> Result<Option<Payment>, StoreError> {
        let mut entry = self
            .records
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if !expected.matches(&entry.payment) {
            return Ok(None);
        }

        // Apply to a copy so a rejected transition leaves the record untouched.
        let mut updated = entry.payment.clone();
        updated.apply(transition, at)?;
        entry.payment = updated.clone();
        Ok(Some(updated))
    }

    async fn list_by_status(&self, status: PaymentStatus) -> Result<Vec<Payment>, StoreError> {
        Ok(self.collect_sorted(|p| p.status == status))
    }

    async fn list_stale(
        &self,
        status: PaymentStatus,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Payment>, StoreError> {
        Ok(self.collect_sorted(|p| p.status == status && p.updated_at < updated_before))
    }

    async fn count_by_status(&self, status: PaymentStatus) -> Result<usize, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.payment.status == status)
            .count())
    }
}
