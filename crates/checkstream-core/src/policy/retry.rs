//! Exponential reconnect backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Configuration for reconnect backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum consecutive reconnect attempts. `None` retries forever.
    pub max_retries: Option<u32>,
    /// Delay before the first reconnect.
    pub initial_backoff: Duration,
    /// Cap on the delay, before jitter.
    pub max_backoff: Duration,
    /// Multiplier applied to the delay on each consecutive attempt.
    pub multiplier: f64,
    /// Add ±`jitter_fraction * delay` random jitter (0.0 = no jitter).
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
            jitter_fraction: 0.2,
        }
    }
}

/// Stateless policy — computes the delay for a given attempt number.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the delay before the `attempt`-th consecutive reconnect (1-based),
    /// or `None` once the retry budget is spent.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_retry(attempt) {
            return None;
        }
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_ms = self.config.initial_backoff.as_millis() as f64 * self.config.multiplier.powi(exp);
        let capped = base_ms.min(self.config.max_backoff.as_millis() as f64);

        let jitter = self.config.jitter_fraction.clamp(0.0, 1.0);
        let total_ms = if jitter > 0.0 {
            let spread = capped * jitter;
            capped + rand::thread_rng().gen_range(-spread..=spread)
        } else {
            capped
        };

        Some(Duration::from_millis(total_ms.max(0.0) as u64))
    }

    /// Returns `true` if another attempt is allowed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.config.max_retries.map_or(true, |max| attempt <= max)
    }
}

/// Tracks consecutive failures for one supervisor.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            policy: RetryPolicy::new(config),
            attempt: 0,
        }
    }

    /// Record a failure and return how long to wait, or `None` if the budget
    /// is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempt = self.attempt.saturating_add(1);
        self.policy.next_delay(self.attempt)
    }

    /// Forget previous failures after the stream made progress.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Consecutive failures recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}
