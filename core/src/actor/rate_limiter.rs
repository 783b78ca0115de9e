//! Rate limiting for actor iterations

use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use std::thread;
use std::time::Duration;

type DirectLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Throttling settings for one phase of one actor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitOptions {
    /// Minimum time between two permitted iterations. `None` or zero disables throttling.
    pub min_period: Option<Duration>,

    /// Fixed pause before each iteration
    pub pre_sleep: Option<Duration>,

    /// Fixed pause after each iteration
    pub post_sleep: Option<Duration>,
}

impl RateLimitOptions {
    /// Throttle to one iteration per `period`
    pub fn min_period(period: Duration) -> Self {
        Self {
            min_period: Some(period),
            ..Default::default()
        }
    }

    /// Set the pause before each iteration
    pub fn with_pre_sleep(mut self, pause: Duration) -> Self {
        self.pre_sleep = Some(pause);
        self
    }

    /// Set the pause after each iteration
    pub fn with_post_sleep(mut self, pause: Duration) -> Self {
        self.post_sleep = Some(pause);
        self
    }
}

/// Blocking rate limiter built on a GCRA limiter from `governor`
///
/// Each actor creates one per phase, so limits apply per actor and per phase.
/// Burst is one: consecutive calls to [`throttle`](Self::throttle) are spaced
/// by at least `min_period`.
pub struct RateLimiter {
    limiter: Option<DirectLimiter>,
    clock: DefaultClock,
    options: RateLimitOptions,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Examples
    /// ```
    /// use std::time::Duration;
    /// use phased_bench_core::{RateLimitOptions, RateLimiter};
    ///
    /// // At most one iteration every 5ms
    /// let limiter = RateLimiter::new(RateLimitOptions::min_period(Duration::from_millis(5)));
    /// assert!(limiter.is_enabled());
    ///
    /// let unlimited = RateLimiter::new(RateLimitOptions::default());
    /// assert!(!unlimited.is_enabled());
    /// ```
    pub fn new(options: RateLimitOptions) -> Self {
        // `with_period` rejects a zero period, which is how zero disables the limit.
        let limiter = options
            .min_period
            .and_then(Quota::with_period)
            .map(DirectLimiter::direct);

        Self {
            limiter,
            clock: DefaultClock::default(),
            options,
        }
    }

    /// Create a rate limiter that never waits
    pub fn unlimited() -> Self {
        Self::new(RateLimitOptions::default())
    }

    /// Block until the next iteration is permitted
    ///
    /// Returns immediately if no minimum period is configured.
    pub fn throttle(&self) {
        let Some(limiter) = &self.limiter else {
            return;
        };
        loop {
            match limiter.check() {
                Ok(()) => return,
                Err(not_until) => thread::sleep(not_until.wait_time_from(self.clock.now())),
            }
        }
    }

    /// Run `f` as one rate-limited iteration: throttle, pre-sleep, `f`, post-sleep
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        self.throttle();
        sleep_for(self.options.pre_sleep);
        let result = f();
        sleep_for(self.options.post_sleep);
        result
    }

    /// Check if throttling is enabled
    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    /// The options this limiter was built from
    pub fn options(&self) -> &RateLimitOptions {
        &self.options
    }
}

fn sleep_for(pause: Option<Duration>) {
    if let Some(pause) = pause.filter(|p| !p.is_zero()) {
        thread::sleep(pause);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("options", &self.options)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_rate_limiter_disabled() {
        let limiter = RateLimiter::new(RateLimitOptions::default());
        assert!(!limiter.is_enabled());
        assert!(limiter.options().min_period.is_none());
    }

    #[test]
    fn test_rate_limiter_zero_period() {
        let limiter = RateLimiter::new(RateLimitOptions::min_period(Duration::ZERO));
        assert!(!limiter.is_enabled());
    }

    #[test]
    fn test_rate_limiter_enabled() {
        let limiter = RateLimiter::new(RateLimitOptions::min_period(Duration::from_millis(10)));
        assert!(limiter.is_enabled());
        assert_eq!(
            limiter.options().min_period,
            Some(Duration::from_millis(10))
        );
    }

    #[test]
    fn test_rate_limiter_default() {
        let limiter = RateLimiter::default();
        assert!(!limiter.is_enabled());
    }

    #[test]
    fn test_throttle_disabled_does_not_wait() {
        let limiter = RateLimiter::unlimited();
        let start = Instant::now();
        for _ in 0..1000 {
            limiter.throttle();
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_throttle_spaces_calls() {
        let limiter = RateLimiter::new(RateLimitOptions::min_period(Duration::from_millis(50)));

        let start = Instant::now();
        for _ in 0..10 {
            limiter.throttle();
        }
        // First call passes immediately, the other nine wait a period each.
        assert!(start.elapsed() >= Duration::from_millis(450));
    }

    #[test]
    fn test_run_applies_sleeps_in_order() {
        let limiter = RateLimiter::new(
            RateLimitOptions::default()
                .with_pre_sleep(Duration::from_millis(20))
                .with_post_sleep(Duration::from_millis(30)),
        );

        let start = Instant::now();
        let seen = limiter.run(|| start.elapsed());
        let total = start.elapsed();

        assert!(seen >= Duration::from_millis(20));
        assert!(total >= Duration::from_millis(50));
    }

    #[test]
    fn test_run_returns_value() {
        let limiter = RateLimiter::unlimited();
        assert_eq!(limiter.run(|| 42), 42);
    }

    #[test]
    fn test_rate_limiter_debug() {
        let limiter = RateLimiter::new(RateLimitOptions::min_period(Duration::from_millis(100)));
        let debug = format!("{:?}", limiter);
        assert!(debug.contains("RateLimiter"));
        assert!(debug.contains("100ms"));
        assert!(debug.contains("true"));
    }
}
