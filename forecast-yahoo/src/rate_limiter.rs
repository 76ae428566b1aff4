//! Minimum-interval request spacing for the Yahoo client
//!
//! Callers reserve the next free slot under a short lock and then sleep
//! until it arrives, so concurrent callers get distinct slots spaced by at
//! least `min_interval`.

use parking_lot::Mutex;
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
pub struct RateLimiter {
    /// Earliest instant the next caller may proceed
    next_slot: Mutex<Instant>,
    min_interval: Duration,
    name: String,
    total_requests: AtomicU64,
    waited_requests: AtomicU64,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, name: &str) -> Self {
        Self {
            next_slot: Mutex::new(Instant::now()),
            min_interval,
            name: name.to_string(),
            total_requests: AtomicU64::new(0),
            waited_requests: AtomicU64::new(0),
        }
    }

    /// Wait for this caller's slot
    pub async fn acquire(&self) {
        let request = self.total_requests.fetch_add(1, Ordering::Relaxed) + 1;
        let now = Instant::now();

        let slot = {
            let mut next = self.next_slot.lock();
            let slot = (*next).max(now);
            *next = slot + self.min_interval;
            slot
        };

        if slot > now {
            self.waited_requests.fetch_add(1, Ordering::Relaxed);
            debug!(
                limiter = %self.name,
                request,
                wait_ms = (slot - now).as_millis() as u64,
                "Rate limiter queued request"
            );
            tokio::time::sleep_until(slot).await;
        }
    }

    /// Whether a request made now would proceed without waiting
    pub fn can_acquire_immediately(&self) -> bool {
        Instant::now() >= *self.next_slot.lock()
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            waited_requests: self.waited_requests.load(Ordering::Relaxed),
            min_interval_ms: self.min_interval.as_millis() as u64,
            name: self.name.clone(),
        }
    }
}

/// Counters for diagnostics
#[derive(Debug, Clone)]
pub struct RateLimiterStats {
    pub total_requests: u64,
    pub waited_requests: u64,
    pub min_interval_ms: u64,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_millis(100), "test");
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.stats().waited_requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_request_waits_for_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(100), "test");
        limiter.acquire().await;
        assert!(!limiter.can_acquire_immediately());

        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_period_resets_spacing() {
        let limiter = RateLimiter::new(Duration::from_millis(50), "test");
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(limiter.can_acquire_immediately());

        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_get_distinct_slots() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(50), "concurrent"));
        let start = Instant::now();

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.acquire().await;
                    start.elapsed()
                })
            })
            .collect();

        let mut times = Vec::new();
        for handle in handles {
            times.push(handle.await.unwrap());
        }
        times.sort();

        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(50));
        }
        assert!(*times.last().unwrap() >= Duration::from_millis(200));

        let stats = limiter.stats();
        assert_eq!(stats.total_requests, 5);
        assert_eq!(stats.waited_requests, 4);
    }
}
