//! Retry with exponential backoff and jitter (spec §4.1). Only transport
//! errors, timeouts, and 429/5xx responses are retried; 4xx is terminal.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Whether a given HTTP status warrants a retry.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Computes the delay before retry attempt `attempt` (0-indexed: the delay
/// before the *first* retry, not the initial request), with full jitter.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp = config.base_delay.as_millis() as u64 * 2u64.saturating_pow(attempt);
    let capped = exp.min(config.max_delay.as_millis() as u64);
    let jittered = rand::thread_rng().gen_range(0..=capped.max(1));
    Duration::from_millis(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(200));
    }

    #[test]
    fn backoff_delay_never_exceeds_max() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(1),
        };
        for attempt in 0..10 {
            let delay = backoff_delay(&config, attempt);
            assert!(delay <= config.max_delay);
        }
    }
}
