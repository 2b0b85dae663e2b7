//! Retry with error-class keyed exponential backoff.
//!
//! Generation calls fail in three distinct ways: rate limiting (429), other
//! transient faults (5xx, network timeouts), and permanent errors (400-class,
//! malformed requests). Each class gets its own backoff treatment — rate
//! limits back off harder, permanent errors are never retried. Delay
//! computation is pure ([`RetryPolicy::delay_for`]); only [`with_retry`]
//! sleeps.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Classification of a generation-call error, derived from its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// HTTP 429 — back off harder than ordinary transient faults.
    RateLimited,
    /// 5xx, network resets, timeouts — worth retrying promptly.
    Transient,
    /// 400-class, auth, malformed request — retrying cannot help.
    Permanent,
}

/// Classify an error string into a retry class.
///
/// Works on the `"HTTP <status>: <body>"` format produced by
/// [`GenerationClient`](super::client::GenerationClient), plus common network
/// failure phrasings. Unknown errors are treated as permanent — blind retries
/// of novel failures waste budget.
pub fn classify(error: &str) -> ErrorClass {
    if error.contains("HTTP 429") {
        return ErrorClass::RateLimited;
    }

    let transient_statuses = ["500", "502", "503", "504"];
    if transient_statuses
        .iter()
        .any(|s| error.contains(&format!("HTTP {s}")))
    {
        return ErrorClass::Transient;
    }

    let lower = error.to_lowercase();
    let transient_phrases = [
        "request failed:",
        "connection reset",
        "connection refused",
        "timed out",
        "timeout",
        "broken pipe",
        "network",
    ];
    if transient_phrases.iter().any(|p| lower.contains(p)) {
        return ErrorClass::Transient;
    }

    ErrorClass::Permanent
}

/// Retry policy: attempt count plus per-class exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first (1 = no retries).
    pub max_attempts: u32,
    /// Base delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Backoff multiplier per attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given total attempt count. Uses default delays.
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::with_attempts(1)
    }

    /// Delay before retrying a failure of `class` after 0-indexed `attempt`.
    ///
    /// Returns `None` when the class should not be retried at all. Rate-limit
    /// errors get four times the transient delay at every step; both are
    /// capped at `max_delay`.
    pub fn delay_for(&self, class: ErrorClass, attempt: u32) -> Option<Duration> {
        let factor = match class {
            ErrorClass::RateLimited => 4.0,
            ErrorClass::Transient => 1.0,
            ErrorClass::Permanent => return None,
        };
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32) * factor;
        let capped = base.min(self.max_delay.as_secs_f64());
        Some(Duration::from_secs_f64(capped))
    }
}

/// Drive an async operation under a retry policy.
///
/// Re-invokes `op` until it succeeds, the policy refuses the error class, or
/// `max_attempts` is exhausted. The final error is returned unchanged so the
/// caller can record it verbatim.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let class = classify(&error);
                let next = attempt + 1;
                let delay = match policy.delay_for(class, attempt) {
                    Some(d) if next < policy.max_attempts => d,
                    _ => return Err(error),
                };
                warn!(
                    "generation call failed ({class:?}), retrying in {:.1}s (attempt {next}/{}): {error}",
                    delay.as_secs_f64(),
                    policy.max_attempts,
                );
                tokio::time::sleep(delay).await;
                attempt = next;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn rate_limit_detected() {
        assert_eq!(classify("generation API HTTP 429: slow down"), ErrorClass::RateLimited);
    }

    #[test]
    fn transient_errors_detected() {
        assert_eq!(classify("generation API HTTP 502: bad gateway"), ErrorClass::Transient);
        assert_eq!(classify("request failed: connection reset"), ErrorClass::Transient);
        assert_eq!(classify("request failed: timed out"), ErrorClass::Transient);
    }

    #[test]
    fn permanent_errors_detected() {
        assert_eq!(classify("generation API HTTP 400: bad request"), ErrorClass::Permanent);
        assert_eq!(classify("generation API HTTP 401: unauthorized"), ErrorClass::Permanent);
        assert_eq!(classify("some novel failure"), ErrorClass::Permanent);
    }

    #[test]
    fn delay_increases_exponentially() {
        let policy = RetryPolicy::with_attempts(5);
        let d0 = policy.delay_for(ErrorClass::Transient, 0).unwrap();
        let d1 = policy.delay_for(ErrorClass::Transient, 1).unwrap();
        let d2 = policy.delay_for(ErrorClass::Transient, 2).unwrap();
        assert!(d1 > d0);
        assert!(d2 > d1);
    }

    #[test]
    fn rate_limit_backs_off_harder() {
        let policy = RetryPolicy::with_attempts(5);
        let transient = policy.delay_for(ErrorClass::Transient, 1).unwrap();
        let limited = policy.delay_for(ErrorClass::RateLimited, 1).unwrap();
        assert!(limited > transient);
    }

    #[test]
    fn delay_capped_at_max() {
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(2),
            ..RetryPolicy::with_attempts(10)
        };
        let d = policy.delay_for(ErrorClass::RateLimited, 10).unwrap();
        assert!(d <= Duration::from_secs(2));
    }

    #[test]
    fn permanent_never_delayed() {
        let policy = RetryPolicy::with_attempts(10);
        assert!(policy.delay_for(ErrorClass::Permanent, 0).is_none());
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            ..RetryPolicy::with_attempts(3)
        };
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("request failed: timed out".to_string())
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_fails_immediately() {
        let policy = RetryPolicy::with_attempts(5);
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("HTTP 400: bad request".to_string()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            ..RetryPolicy::with_attempts(2)
        };
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("request failed: timed out".to_string()) }
        })
        .await;
        assert_eq!(result.unwrap_err(), "request failed: timed out");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_retry_policy_single_attempt() {
        let policy = RetryPolicy::none();
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("HTTP 503: unavailable".to_string()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
