/// Exponential backoff with jitter
///
/// delay(n) = min(base * 2^n + jitter, max), jitter drawn from [0, base * 2^n * jitter_factor].
/// Used by the classifier (`retry_delay`), the error handler's Retry strategy
/// and the file system layer's local retry loop.
use std::time::Duration;

/// Default jitter: up to 10% on top of the exponential delay
pub const DEFAULT_JITTER_FACTOR: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay for the first retry
    base_delay: Duration,

    /// Cap applied after jitter
    max_delay: Duration,

    /// Jitter factor (0.0 - 1.0)
    jitter_factor: f64,
}

impl ExponentialBackoff {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }

    /// Create with custom jitter factor
    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Backoff used by the file system layer
    pub fn from_millis(base_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(base_ms), Duration::from_millis(max_ms))
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis();
        let max_ms = self.max_delay.as_millis();

        // 2^attempt saturates long before u128 would overflow
        let factor = 2u128.checked_pow(attempt).unwrap_or(u128::MAX);
        let exponential_ms = base_ms.saturating_mul(factor);
        if exponential_ms >= max_ms {
            return self.max_delay;
        }

        let jitter_ms = if self.jitter_factor > 0.0 {
            (exponential_ms as f64 * self.jitter_factor * rand::random::<f64>()) as u128
        } else {
            0
        };

        let final_ms = (exponential_ms + jitter_ms).min(max_ms);
        Duration::from_millis(final_ms as u64)
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}
