//! Fixed-interval polling against an overall deadline.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Source of time for polling loops.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time backed by tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// The deadline passed before the condition held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExceeded {
    pub waited: Duration,
}

/// Check a condition every `interval` until it holds or `deadline` passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub deadline: Duration,
}

impl RetryPolicy {
    pub const fn new(interval: Duration, deadline: Duration) -> Self {
        Self { interval, deadline }
    }

    /// Poll `ready` until it returns true.
    ///
    /// The condition is checked once up front, so a ready system never
    /// sleeps. Returns the number of checks made.
    pub async fn poll<F, Fut>(&self, clock: &dyn Clock, mut ready: F) -> Result<u32, DeadlineExceeded>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = bool> + Send,
    {
        let start = clock.now();
        let mut attempts = 0u32;
        loop {
            attempts = attempts.saturating_add(1);
            if ready().await {
                return Ok(attempts);
            }
            let waited = clock.now().saturating_duration_since(start);
            if waited >= self.deadline {
                return Err(DeadlineExceeded { waited });
            }
            let remaining = self.deadline.saturating_sub(waited);
            clock.sleep(self.interval.min(remaining)).await;
        }
    }
}

/// Short human form of a duration: `90s` -> `1m30s`.
pub fn human(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        return format!("{}ms", duration.as_millis());
    }
    let (minutes, seconds) = (secs / 60, secs % 60);
    match (minutes, seconds) {
        (0, s) => format!("{s}s"),
        (m, 0) => format!("{m}m"),
        (m, s) => format!("{m}m{s}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::clock::FakeClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn ready_condition_returns_without_sleeping() {
        let clock = FakeClock::new();
        let policy = RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(60));

        let attempts = policy.poll(&clock, || async { true }).await.unwrap();

        assert_eq!(attempts, 1);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn polls_at_fixed_interval_until_ready() {
        let clock = FakeClock::new();
        let policy = RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(60));
        let calls = AtomicU32::new(0);

        let attempts = policy
            .poll(&clock, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { n >= 3 }
            })
            .await
            .unwrap();

        assert_eq!(attempts, 4);
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn gives_up_at_the_deadline() {
        let clock = FakeClock::new();
        let policy = RetryPolicy::new(Duration::from_secs(2), Duration::from_secs(5));

        let err = policy.poll(&clock, || async { false }).await.unwrap_err();

        assert_eq!(err.waited, Duration::from_secs(5));
        assert_eq!(clock.elapsed(), Duration::from_secs(5));
    }

    #[test]
    fn human_durations() {
        assert_eq!(human(Duration::from_secs(60)), "1m");
        assert_eq!(human(Duration::from_secs(90)), "1m30s");
        assert_eq!(human(Duration::from_secs(45)), "45s");
        assert_eq!(human(Duration::from_millis(250)), "250ms");
    }
}
