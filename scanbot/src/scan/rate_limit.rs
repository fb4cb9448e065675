use crate::config::RateLimitConfig;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::Mutex,
    time::{Instant, sleep_until},
};
use tracing::warn;

/// Upper bound on the backoff applied after repeated violations, as a multiple of the base
/// interval.
const MAX_BACKOFF_MULTIPLE: u32 = 16;

#[derive(Debug)]
struct Inner {
    capacity: usize,
    tokens: usize,
    interval: Duration,
    base_interval: Duration,
    max_interval: Duration,
    last_refill: Instant,
}

impl Inner {
    fn refill(&mut self, now: Instant) {
        if now.duration_since(self.last_refill) >= self.interval {
            self.tokens = self.capacity;
            self.last_refill = now;
        }
    }
}

/// Token bucket rate limiter with adaptive backoff.
///
/// Permits `capacity` operations per interval. Each reported provider violation doubles the
/// interval (up to 16x the base), and a successful operation resets it.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<Inner>>,
}

impl RateLimiter {
    /// Construct a new [`RateLimiter`] allowing `capacity` operations every `interval`.
    pub fn new(capacity: usize, interval: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                capacity,
                tokens: capacity,
                interval,
                base_interval: interval,
                max_interval: interval * MAX_BACKOFF_MULTIPLE,
                last_refill: Instant::now(),
            })),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.capacity, Duration::from_millis(config.interval_ms))
    }

    /// Wait until a permit is available and consume it.
    pub async fn acquire(&self) {
        loop {
            let next_refill = {
                let mut inner = self.inner.lock().await;
                inner.refill(Instant::now());
                if inner.tokens > 0 {
                    inner.tokens -= 1;
                    return;
                }
                inner.last_refill + inner.interval
            };

            sleep_until(next_refill).await;
        }
    }

    /// Report a provider rate limit violation, backing off the refill interval.
    pub async fn report_violation(&self) {
        let mut inner = self.inner.lock().await;
        inner.interval = std::cmp::min(inner.interval * 2, inner.max_interval);
        warn!(interval = ?inner.interval, "provider rate limit violated, backing off");
    }

    /// Reset the current backoff to the base interval.
    pub async fn reset_backoff(&self) {
        let mut inner = self.inner.lock().await;
        inner.interval = inner.base_interval;
    }

    /// Current refill interval, including any backoff.
    pub async fn interval(&self) -> Duration {
        self.inner.lock().await.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limit_basic() {
        let start = Instant::now();
        let limiter = RateLimiter::new(2, Duration::from_millis(50));

        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_waiters_are_released_without_further_acquirers() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        limiter.acquire().await;

        let waiters = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.acquire().await })
            })
            .collect::<Vec<_>>();

        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_backoff() {
        let base = Duration::from_millis(20);
        let start = Instant::now();
        let limiter = RateLimiter::new(1, base);

        limiter.report_violation().await;
        assert_eq!(limiter.interval().await, base * 2);

        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= base * 2);

        for _ in 0..10 {
            limiter.report_violation().await;
        }
        assert_eq!(limiter.interval().await, base * MAX_BACKOFF_MULTIPLE);

        limiter.reset_backoff().await;
        assert_eq!(limiter.interval().await, base);
    }
}
