use std::time::Duration;

use rand::Rng;

/// Pacing and retry behaviour shared by every outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each further attempt.
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fixed pause before every request, independent of network latency.
    pub request_delay: Duration,
    /// Upper bound of the random extra added to `request_delay`.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(40),
            request_delay: Duration::from_millis(1500),
            jitter: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// No pacing and no waiting between retries.
    pub fn immediate() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            request_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Delay after the failed attempt number `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Pause to take before the next request.
    pub fn pacing(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.request_delay;
        }
        let extra = rand::rng().random_range(0..=jitter_ms);
        self.request_delay + Duration::from_millis(extra)
    }
}

/// Parses a `Retry-After` header given in seconds. HTTP-date values are not
/// supported and fall back to the regular backoff.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
