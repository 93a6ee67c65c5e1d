//! Retry logic with exponential backoff for transient source failures.
//!
//! Every outbound call made by a source adapter goes through [`retry_with`].
//! A failed call is classified into a [`FailureType`]; the [`RetryPolicy`]
//! then decides whether to try again and how long to wait.
//!
//! # Example
//!
//! ```
//! use renamer_core::source::{ApiError, FailureType, RetryDecision, RetryPolicy, classify_api_error};
//!
//! let policy = RetryPolicy::default();
//! let error = ApiError::http_status("semantic_scholar", 503);
//!
//! assert_eq!(classify_api_error(&error), FailureType::Transient);
//! assert!(matches!(policy.should_retry(FailureType::Transient, 1), RetryDecision::Retry { .. }));
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument, warn};

use super::ApiError;

/// Default maximum attempts per outbound call.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff (1 second).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (32 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Maximum jitter added to delays (500ms).
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Classification of source failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    ///
    /// Examples: network timeout, 5xx server errors, connection refused.
    Transient,

    /// Permanent failure that won't succeed regardless of retries.
    ///
    /// Examples: 404 Not Found, unparseable body, invalid URL.
    Permanent,

    /// Service requires credentials (401/403). Never retried.
    NeedsAuth,

    /// Server rate limiting (HTTP 429). Retried with backoff.
    RateLimited,
}

/// Decision on whether to retry a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },
    DoNotRetry {
        reason: String,
    },
}

/// Configuration for retry behavior with exponential backoff.
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt-1), max_delay) + jitter
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f32,
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    ///
    /// `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
            jitter: true,
        }
    }

    /// Creates a policy with a custom `max_attempts`, using defaults for other settings.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// A policy with millisecond delays and no jitter, for tests against local mocks.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::NeedsAuth => {
                return RetryDecision::DoNotRetry {
                    reason: "service rejected credentials".to_string(),
                };
            }
            FailureType::Transient | FailureType::RateLimited => {}
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.calculate_delay(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let multiplier = f64::from(self.backoff_multiplier);
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * multiplier.powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_ms as u64) + self.calculate_jitter()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn calculate_jitter(&self) -> Duration {
        if !self.jitter {
            return Duration::ZERO;
        }
        let mut rng = rand::thread_rng();
        Duration::from_millis(rng.gen_range(0..=MAX_JITTER.as_millis() as u64))
    }
}

/// Classifies a source error into a failure type for retry decisions.
#[must_use]
pub fn classify_api_error(error: &ApiError) -> FailureType {
    match error {
        ApiError::HttpStatus { status, .. } => classify_http_status(*status),
        ApiError::Timeout { .. } => FailureType::Transient,
        ApiError::Network { source, .. } => {
            if is_tls_error(source) {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }
        ApiError::Parse { .. } | ApiError::InvalidUrl { .. } | ApiError::Client { .. } => {
            FailureType::Permanent
        }
    }
}

/// Classifies an HTTP status code into a failure type.
#[allow(clippy::match_same_arms)]
#[must_use]
pub fn classify_http_status(status: u16) -> FailureType {
    match status {
        401 | 403 => FailureType::NeedsAuth,
        408 => FailureType::Transient,   // Request Timeout
        429 => FailureType::RateLimited, // Too Many Requests
        status if (400..500).contains(&status) => FailureType::Permanent,
        status if (500..600).contains(&status) => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

fn is_tls_error(error: &reqwest::Error) -> bool {
    let error_string = error.to_string().to_lowercase();
    error_string.contains("certificate")
        || error_string.contains("tls")
        || error_string.contains("ssl")
        || error_string.contains("handshake")
}

/// Runs `operation` until it succeeds or the policy stops retrying.
///
/// Returns the last error when attempts are exhausted or the failure is not
/// retryable.
///
/// # Errors
///
/// Propagates the final [`ApiError`] from `operation`.
pub async fn retry_with<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let failure_type = classify_api_error(&error);
                match policy.should_retry(failure_type, attempt) {
                    RetryDecision::Retry {
                        delay,
                        attempt: next,
                    } => {
                        warn!(
                            service = error.service(),
                            error = %error,
                            attempt,
                            delay_ms = delay.as_millis(),
                            "retrying source request"
                        );
                        tokio::time::sleep(delay).await;
                        attempt = next;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        debug!(service = error.service(), %reason, "giving up on source request");
                        return Err(error);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(32));
        assert!(policy.jitter);
    }

    #[test]
    fn test_retry_policy_max_attempts_minimum_is_one() {
        assert_eq!(RetryPolicy::with_max_attempts(0).max_attempts(), 1);
        assert_eq!(RetryPolicy::immediate(0).max_attempts(), 1);
    }

    #[test]
    fn test_delay_calculation_first_attempt_within_jitter() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(32), 2.0);
        let delay = policy.calculate_delay(1);
        assert!(delay >= Duration::from_secs(1));
        assert!(delay <= Duration::from_millis(1500));
    }

    #[test]
    fn test_delay_calculation_is_capped() {
        let policy = RetryPolicy::new(20, Duration::from_secs(1), Duration::from_secs(4), 2.0);
        let delay = policy.calculate_delay(10);
        assert!(delay <= Duration::from_millis(4500));
    }

    #[test]
    fn test_immediate_policy_has_no_jitter() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.calculate_delay(1), Duration::from_millis(1));
    }

    #[test]
    fn test_should_retry_permanent_never_retries() {
        let policy = RetryPolicy::default();
        assert!(matches!(
            policy.should_retry(FailureType::Permanent, 1),
            RetryDecision::DoNotRetry { .. }
        ));
        assert!(matches!(
            policy.should_retry(FailureType::NeedsAuth, 1),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_should_retry_stops_at_max_attempts() {
        let policy = RetryPolicy::immediate(3);
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 2),
            RetryDecision::Retry { attempt: 3, .. }
        ));
        assert!(matches!(
            policy.should_retry(FailureType::RateLimited, 3),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_classify_http_status_table() {
        assert_eq!(classify_http_status(404), FailureType::Permanent);
        assert_eq!(classify_http_status(401), FailureType::NeedsAuth);
        assert_eq!(classify_http_status(408), FailureType::Transient);
        assert_eq!(classify_http_status(429), FailureType::RateLimited);
        assert_eq!(classify_http_status(503), FailureType::Transient);
        assert_eq!(classify_http_status(302), FailureType::Permanent);
    }

    #[test]
    fn test_classify_api_error_variants() {
        assert_eq!(
            classify_api_error(&ApiError::Timeout { service: "arxiv" }),
            FailureType::Transient
        );
        assert_eq!(
            classify_api_error(&ApiError::parse("arxiv", "bad xml")),
            FailureType::Permanent
        );
    }

    #[tokio::test]
    async fn test_retry_with_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_with(&RetryPolicy::immediate(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ApiError::http_status("arxiv", 503))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_with_does_not_retry_permanent() {
        let calls = AtomicU32::new(0);
        let result: Result<(), ApiError> = retry_with(&RetryPolicy::immediate(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::http_status("arxiv", 400)) }
        })
        .await;

        assert_eq!(result.unwrap_err().status(), Some(400));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_with_returns_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<(), ApiError> = retry_with(&RetryPolicy::immediate(2), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::Timeout { service: "ollama" }) }
        })
        .await;

        assert!(matches!(result, Err(ApiError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
