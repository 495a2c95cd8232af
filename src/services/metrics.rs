use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-process lifecycle counters. Exporting them is left to the host.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    created: AtomicU64,
    duplicates_rejected: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    reclaimed: AtomicU64,
    rate_limited: AtomicU64,
    provider_faults: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub created: u64,
    pub duplicates_rejected: u64,
    pub completed: u64,
    pub failed: u64,
    pub retried: u64,
    pub reclaimed: u64,
    pub rate_limited: u64,
    pub provider_faults: u64,
    pub success_rate: f64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_duplicates_rejected(&self) {
        self.duplicates_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_reclaimed(&self, count: u64) {
        self.reclaimed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_provider_faults(&self) {
        self.provider_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let created = self.created.load(Ordering::Relaxed);
        let completed = self.completed.load(Ordering::Relaxed);
        MetricsSnapshot {
            created,
            duplicates_rejected: self.duplicates_rejected.load(Ordering::Relaxed),
            completed,
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            provider_faults: self.provider_faults.load(Ordering::Relaxed),
            success_rate: if created > 0 {
                (completed as f64 / created as f64) * 100.0
            } else {
                0.0
            },
        }
    }
}
