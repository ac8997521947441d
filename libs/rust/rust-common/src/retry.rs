//! Retry policy implementation with exponential backoff.
//!
//! This module provides a configurable retry mechanism for handling
//! transient failures, and [`RetryingClient`], an [`HttpGet`] wrapper that
//! applies the policy to outbound GETs.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::PlatformError;
use crate::http::{HttpGet, HttpResponse};

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom max retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Create a new retry config with custom initial delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Create a new retry config with custom max delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Create a new retry config without jitter.
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }
}

/// Retry policy for executing operations with automatic retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a new retry policy with the given configuration.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create a retry policy with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Calculate the delay for a given attempt number.
    ///
    /// Uses exponential backoff with optional jitter.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay.as_millis() as f64
            * self.config.multiplier.powi(attempt.min(i32::MAX as u32) as i32);

        let delay_ms = base_delay.min(self.config.max_delay.as_millis() as f64);

        let final_delay = if self.config.jitter {
            // up to 25% jitter
            let jitter_factor = 1.0 + (rand::random::<f64>() * 0.25);
            delay_ms * jitter_factor
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay as u64)
    }

    /// Check if an error should be retried.
    #[must_use]
    pub fn should_retry(&self, error: &PlatformError, attempt: u32) -> bool {
        attempt < self.config.max_retries && error.is_retryable()
    }

    /// Execute an async operation with retries.
    ///
    /// # Errors
    ///
    /// Returns the last error if all retries are exhausted.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, PlatformError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, PlatformError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !self.should_retry(&error, attempt) {
                        return Err(error);
                    }
                    let delay = self.delay_for_attempt(attempt);
                    debug!(attempt, delay_ms = delay.as_millis(), error = %error, "retrying operation");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Get the maximum number of retries.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// [`HttpGet`] wrapper that retries transport failures and 429/5xx answers.
///
/// Once retries are exhausted a retryable status is reported as
/// [`PlatformError::Status`]; other statuses are returned to the caller
/// untouched on the first attempt.
pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: HttpGet> RetryingClient<C> {
    /// Wrap `inner` with the given policy.
    #[must_use]
    pub const fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The policy applied to each GET.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<C: HttpGet> HttpGet for RetryingClient<C> {
    async fn get(&self, url: &str) -> Result<HttpResponse, PlatformError> {
        self.policy
            .execute(|| async move {
                let response = self.inner.get(url).await?;
                if response.status == 429 || response.status >= 500 {
                    return Err(PlatformError::status(response.status, &response.body));
                }
                Ok(response)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_delay_calculation_no_jitter() {
        let config = RetryConfig::default().without_jitter();
        let policy = RetryPolicy::new(config);

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn test_max_delay_cap() {
        let config = RetryConfig::default()
            .without_jitter()
            .with_max_delay(Duration::from_millis(150));
        let policy = RetryPolicy::new(config);

        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(150));
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::with_defaults();

        let throttled = PlatformError::status(429, b"slow down");
        assert!(policy.should_retry(&throttled, 0));
        assert!(policy.should_retry(&throttled, 2));
        assert!(!policy.should_retry(&throttled, 3));
        assert!(!policy.should_retry(&PlatformError::status(404, b""), 0));
    }

    /// Answers with the scripted statuses in order, then 200.
    struct Scripted {
        statuses: Vec<u16>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl HttpGet for Scripted {
        async fn get(&self, _url: &str) -> Result<HttpResponse, PlatformError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            let status = self.statuses.get(n).copied().unwrap_or(200);
            Ok(HttpResponse::new(status, format!("attempt {n}")))
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(
            RetryConfig::default()
                .with_max_retries(max_retries)
                .with_initial_delay(Duration::from_millis(1))
                .without_jitter(),
        )
    }

    #[tokio::test]
    async fn test_retrying_client_recovers_from_server_errors() {
        let client = RetryingClient::new(
            Scripted { statuses: vec![503, 502], calls: AtomicU32::new(0) },
            fast_policy(3),
        );

        let response = client.get("http://jwks.test/keys").await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retrying_client_gives_up_after_max_retries() {
        let client = RetryingClient::new(
            Scripted { statuses: vec![500; 10], calls: AtomicU32::new(0) },
            fast_policy(2),
        );

        let err = client.get("http://jwks.test/keys").await.unwrap_err();
        assert!(matches!(err, PlatformError::Status { status: 500, .. }));
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retrying_client_passes_client_errors_through() {
        let client = RetryingClient::new(
            Scripted { statuses: vec![404], calls: AtomicU32::new(0) },
            fast_policy(3),
        );

        let response = client.get("http://jwks.test/keys").await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 1);
    }
}
