use crate::clock::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::debug;

/// Admission control in front of the rate-capped provider.
///
/// A shared or distributed limiter can stand in for the fixed-window one as
/// long as `try_acquire` is all-or-nothing and never admits more than the
/// configured rate per window across every caller.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Consumes `permits` from the current window, or nothing at all. Never
    /// blocks.
    fn try_acquire(&self, permits: u32) -> bool;

    fn try_acquire_one(&self) -> bool {
        self.try_acquire(1)
    }

    /// Waits until a single permit is granted. For single-shot callers only;
    /// the dispatcher loop must not use this.
    async fn wait_for_permit(&self);
}

struct Window {
    started_at: DateTime<Utc>,
    used: u32,
}

pub struct FixedWindowRateLimiter {
    max_rate: u32,
    window: Duration,
    poll_interval: StdDuration,
    clock: Arc<dyn Clock>,
    state: Mutex<Window>,
}

impl FixedWindowRateLimiter {
    pub fn new(
        max_rate: u32,
        window: StdDuration,
        poll_interval: StdDuration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let window = Duration::from_std(window).unwrap_or_else(|_| Duration::seconds(1));
        let started_at = clock.now();
        Self {
            max_rate,
            window,
            poll_interval,
            clock,
            state: Mutex::new(Window { started_at, used: 0 }),
        }
    }

    pub fn max_rate(&self) -> u32 {
        self.max_rate
    }

    /// Permits left in the current window, without rolling it over.
    pub fn available(&self) -> u32 {
        let state = self.state.lock();
        self.max_rate.saturating_sub(state.used)
    }
}

#[async_trait]
impl RateLimiter for FixedWindowRateLimiter {
    fn try_acquire(&self, permits: u32) -> bool {
        if permits > self.max_rate {
            return false;
        }

        let now = self.clock.now();
        let mut state = self.state.lock();

        if now - state.started_at >= self.window {
            state.started_at = now;
            state.used = 0;
        }

        if state.used.saturating_add(permits) <= self.max_rate {
            state.used += permits;
            true
        } else {
            debug!(
                used = state.used,
                max_rate = self.max_rate,
                requested = permits,
                "rate limit reached for current window"
            );
            false
        }
    }

    async fn wait_for_permit(&self) {
        while !self.try_acquire(1) {
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};

    fn limiter(max_rate: u32) -> (FixedWindowRateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let limiter = FixedWindowRateLimiter::new(
            max_rate,
            StdDuration::from_secs(1),
            StdDuration::from_millis(100),
            clock.clone(),
        );
        (limiter, clock)
    }

    #[test]
    fn test_third_call_in_window_denied_then_rollover() {
        let (limiter, clock) = limiter(2);

        assert!(limiter.try_acquire(1));
        assert!(limiter.try_acquire(1));
        assert!(!limiter.try_acquire(1));

        clock.advance(Duration::milliseconds(1000));
        assert!(limiter.try_acquire(1));
    }

    #[test]
    fn test_partial_window_still_denied() {
        let (limiter, clock) = limiter(2);
        assert!(limiter.try_acquire(2));

        clock.advance(Duration::milliseconds(500));
        assert!(!limiter.try_acquire_one());
    }

    #[test]
    fn test_more_than_max_rate_always_fails() {
        let (limiter, _) = limiter(2);
        assert!(!limiter.try_acquire(3));
        // The rejected request must not have consumed anything.
        assert!(limiter.try_acquire(2));
    }

    #[test]
    fn test_no_partial_consumption() {
        let (limiter, _) = limiter(3);
        assert!(limiter.try_acquire(2));
        assert!(!limiter.try_acquire(2));
        assert_eq!(limiter.available(), 1);
        assert!(limiter.try_acquire(1));
    }

    #[test]
    fn test_zero_permits_is_free() {
        let (limiter, _) = limiter(2);
        assert!(limiter.try_acquire(0));
        assert!(limiter.try_acquire(2));
        assert!(!limiter.try_acquire(1));
        assert!(limiter.try_acquire(0));
    }

    #[test]
    fn test_consecutive_windows_are_independent() {
        let (limiter, clock) = limiter(2);
        assert!(limiter.try_acquire(2));
        clock.advance(Duration::milliseconds(1100));
        assert!(limiter.try_acquire(2));
        assert!(!limiter.try_acquire(1));
        clock.advance(Duration::milliseconds(1100));
        assert!(limiter.try_acquire(1));
    }

    #[tokio::test]
    async fn test_wait_for_permit_returns_after_rollover() {
        let limiter = FixedWindowRateLimiter::new(
            2,
            StdDuration::from_millis(200),
            StdDuration::from_millis(10),
            Arc::new(SystemClock),
        );
        assert!(limiter.try_acquire(2));

        let started = std::time::Instant::now();
        limiter.wait_for_permit().await;
        let waited = started.elapsed();

        assert!(waited >= StdDuration::from_millis(150), "waited {waited:?}");
        assert!(waited < StdDuration::from_secs(2));
    }

    #[tokio::test]
    async fn test_wait_for_permit_immediate_when_available() {
        let (limiter, _) = limiter(2);
        assert!(limiter.try_acquire(1));
        tokio::time::timeout(StdDuration::from_millis(50), limiter.wait_for_permit())
            .await
            .expect("permit should be granted without waiting");
        assert!(!limiter.try_acquire(1));
    }
}
