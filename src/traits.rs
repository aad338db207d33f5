//! Shared trait abstractions

use crate::core::config::TileLoadingConfig;
use crate::prelude::Instant;

/// Anything that retries a failed request under a [`TileLoadingConfig`].
pub trait RetryLogic {
    /// Retries already attempted since the last success.
    fn retry_count(&self) -> u32;

    fn last_retry_time(&self) -> Option<Instant>;

    fn should_retry(&self, policy: &TileLoadingConfig) -> bool {
        should_retry_with_backoff(
            self.retry_count(),
            self.last_retry_time(),
            policy.max_retries,
            policy.retry_delay_ms,
            policy.exponential_backoff,
        )
    }
}

/// Standard retry logic implementation
pub fn should_retry_with_backoff(
    retry_count: u32,
    last_retry_time: Option<Instant>,
    max_retries: u32,
    retry_delay_ms: u64,
    exponential_backoff: bool,
) -> bool {
    if retry_count >= max_retries {
        return false;
    }

    if let Some(last_retry) = last_retry_time {
        let delay_multiplier = if exponential_backoff {
            2_u64.saturating_pow(retry_count)
        } else {
            1
        };
        let required_delay = retry_delay_ms.saturating_mul(delay_multiplier);
        last_retry.elapsed().as_millis() >= required_delay as u128
    } else {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_retry_budget() {
        assert!(should_retry_with_backoff(0, None, 3, 500, true));
        assert!(!should_retry_with_backoff(3, None, 3, 0, false));
    }

    #[test]
    fn test_backoff_delay() {
        let just_now = Some(Instant::now());
        assert!(!should_retry_with_backoff(0, just_now, 3, 60_000, false));
        assert!(should_retry_with_backoff(2, just_now, 3, 0, true));

        let Some(earlier) = Instant::now().checked_sub(Duration::from_millis(250)) else {
            return;
        };
        // 100ms * 2^1 has elapsed, 100ms * 2^2 has not
        assert!(should_retry_with_backoff(1, Some(earlier), 3, 100, true));
        assert!(!should_retry_with_backoff(2, Some(earlier), 3, 100, true));
    }
}
