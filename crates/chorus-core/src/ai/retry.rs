//! Retry policy with exponential backoff and free-tier fallback
//!
//! A failed call is re-attempted only for transient failures (timeout, rate
//! limit, 5xx) and only while the attempt budget lasts. Before a retry the
//! policy sleeps with exponential backoff plus jitter, honoring a server
//! Retry-After when one was provided, and the dispatcher downgrades to the
//! provider's next free-tier model.

use std::time::Duration;

use rand::Rng;

use crate::constants;

/// HTTP status codes that should trigger retry
pub const RETRYABLE_STATUS_CODES: &[u16] = &[
    429, // Too Many Requests
    500, // Internal Server Error
    502, // Bad Gateway
    503, // Service Unavailable
    504, // Gateway Timeout
];

/// Check if an HTTP status code is retryable
pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUS_CODES.contains(&status)
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per call, first try included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap on the backoff delay
    pub max_delay: Duration,
    /// Whether to add random jitter to delays
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: constants::retry::MAX_ATTEMPTS,
            initial_delay: constants::retry::INITIAL_DELAY,
            max_delay: constants::retry::MAX_DELAY,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to sleep before retry number `attempt` (1-based count of
    /// attempts already made)
    ///
    /// A server-provided Retry-After takes precedence over the computed
    /// backoff; both are capped by `max_delay` before jitter.
    pub fn backoff_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exponential = self
            .initial_delay
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
        let base = retry_after.unwrap_or(exponential).min(self.max_delay);

        if self.jitter {
            let jitter_ms = rand::thread_rng().gen_range(0..250);
            base + Duration::from_millis(jitter_ms)
        } else {
            base
        }
    }
}

/// Parse a Retry-After header value
///
/// The header can be either a number of seconds (e.g. "120") or an HTTP date
/// (e.g. "Wed, 21 Oct 2015 07:28:00 GMT").
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    if let Ok(seconds) = header_value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(date) = httpdate::parse_http_date(header_value) {
        let now = std::time::SystemTime::now();
        if let Ok(duration) = date.duration_since(now) {
            return Some(duration);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_status_codes() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(502));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(504));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(404));
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after("0"), Some(Duration::from_secs(0)));
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 2);
        assert!(policy.jitter);
    }

    #[test]
    fn test_backoff_growth_and_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: false,
        };
        assert_eq!(policy.backoff_delay(1, None), Duration::from_millis(500));
        assert_eq!(policy.backoff_delay(2, None), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(3, None), Duration::from_secs(2));
        // Far attempts saturate at the cap
        assert_eq!(policy.backoff_delay(10, None), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_honors_retry_after() {
        let policy = RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        };
        let delay = policy.backoff_delay(1, Some(Duration::from_secs(3)));
        assert_eq!(delay, Duration::from_secs(3));
        // Retry-After is still capped
        let capped = policy.backoff_delay(1, Some(Duration::from_secs(600)));
        assert_eq!(capped, policy.max_delay);
    }
}
