use crate::{CoreError, ErrorExt};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first call
    pub max_attempts: u32,
    /// Delay before the first retry (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    /// Three attempts, waiting 1s then 2s.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }
}

impl RetryConfig {
    /// Platform calls get a little jitter so restarts do not line up.
    pub fn twitter() -> Self {
        Self {
            jitter_factor: 0.1,
            ..Self::default()
        }
    }
}

/// How long to wait before the next attempt. Every error is retried until attempts run out.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry with exponential backoff
    Retry,
    /// Retry after the delay the server asked for
    RetryWithDelay(Duration),
}

pub fn get_retry_strategy(error: &CoreError) -> RetryStrategy {
    match error.retry_after() {
        Some(delay) => RetryStrategy::RetryWithDelay(delay),
        None => RetryStrategy::Retry,
    }
}

/// Delay before retry number `attempt + 1`: base * multiplier^attempt, plus jitter, capped.
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let max_delay = Duration::from_millis(config.max_delay_ms);

    let multiplier = config.backoff_multiplier.powi(attempt as i32);
    let delay_ms = (config.base_delay_ms as f64 * multiplier) as u64;
    let exponential_delay = Duration::from_millis(delay_ms.min(config.max_delay_ms));

    let jitter_range = (exponential_delay.as_millis() as f64 * config.jitter_factor) as u64;
    let jitter = if jitter_range > 0 {
        fastrand::u64(0..=jitter_range)
    } else {
        0
    };

    (exponential_delay + Duration::from_millis(jitter)).min(max_delay)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryMetrics {
    pub total_retries: u64,
    pub successful_retries: u64,
    pub failed_operations: u64,
}

/// Retry executor that wraps operations with retry logic
#[derive(Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
    total_retries: AtomicU64,
    successful_retries: AtomicU64,
    failed_operations: AtomicU64,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            total_retries: AtomicU64::new(0),
            successful_retries: AtomicU64::new(0),
            failed_operations: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `operation` until it succeeds or attempts run out.
    ///
    /// The error of the last attempt is returned unchanged.
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        self.successful_retries.fetch_add(1, Ordering::Relaxed);
                        info!("{} succeeded after {} retries", operation_name, attempt);
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if attempt + 1 >= max_attempts {
                        warn!(
                            "{} failed after {} attempts: {}",
                            operation_name, max_attempts, error
                        );
                        self.failed_operations.fetch_add(1, Ordering::Relaxed);
                        return Err(error);
                    }
                    if !error.is_retryable() {
                        debug!("{} hit a non-transient error, retrying anyway", operation_name);
                    }

                    let delay = match get_retry_strategy(&error) {
                        RetryStrategy::Retry => calculate_delay(attempt, &self.config),
                        RetryStrategy::RetryWithDelay(delay) => {
                            delay.min(Duration::from_millis(self.config.max_delay_ms))
                        }
                    };

                    warn!(
                        "Retrying {}... ({} retries left) in {:?}: {}",
                        operation_name,
                        max_attempts - attempt - 1,
                        delay,
                        error
                    );
                    self.total_retries.fetch_add(1, Ordering::Relaxed);
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    pub fn get_metrics(&self) -> RetryMetrics {
        RetryMetrics {
            total_retries: self.total_retries.load(Ordering::Relaxed),
            successful_retries: self.successful_retries.load(Ordering::Relaxed),
            failed_operations: self.failed_operations.load(Ordering::Relaxed),
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConfigError, LlmError, TwitterApiError};
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;
    use tokio::time::Instant;

    fn unavailable() -> CoreError {
        CoreError::Llm(LlmError::ServiceUnavailable {
            provider: "openai".to_string(),
        })
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 1000);
        assert_eq!(config.jitter_factor, 0.0);
    }

    #[test]
    fn test_exponential_backoff_calculation() {
        let config = RetryConfig {
            max_delay_ms: 10000,
            ..Default::default()
        };

        assert_eq!(calculate_delay(0, &config), Duration::from_millis(1000));
        assert_eq!(calculate_delay(1, &config), Duration::from_millis(2000));
        assert_eq!(calculate_delay(2, &config), Duration::from_millis(4000));
        assert_eq!(calculate_delay(10, &config), Duration::from_millis(10000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let config = RetryConfig {
            jitter_factor: 0.5,
            ..Default::default()
        };

        for _ in 0..20 {
            let delay = calculate_delay(1, &config);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay <= Duration::from_millis(3000));
        }
    }

    #[test]
    fn test_retry_strategy_for_errors() {
        let rate_limited = CoreError::Twitter(TwitterApiError::RateLimitExceeded { retry_after: 7 });
        assert_eq!(
            get_retry_strategy(&rate_limited),
            RetryStrategy::RetryWithDelay(Duration::from_secs(7))
        );

        assert_eq!(get_retry_strategy(&unavailable()), RetryStrategy::Retry);

        let config_error = CoreError::Config(ConfigError::ValidationFailed {
            reason: "bad".to_string(),
        });
        assert_eq!(get_retry_strategy(&config_error), RetryStrategy::Retry);

        let invalid_token = CoreError::Twitter(TwitterApiError::InvalidToken);
        assert_eq!(get_retry_strategy(&invalid_token), RetryStrategy::Retry);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_failures_makes_k_plus_one_calls() {
        for failures in 0..3u32 {
            let executor = RetryExecutor::default();
            let calls = Arc::new(AtomicU32::new(0));

            let result = executor
                .execute("generate", || {
                    let calls = calls.clone();
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        if n < failures {
                            Err(unavailable())
                        } else {
                            Ok("reply")
                        }
                    }
                })
                .await;

            assert_eq!(result.unwrap(), "reply");
            assert_eq!(calls.load(Ordering::SeqCst), failures + 1);
            assert_eq!(executor.get_metrics().total_retries, failures as u64);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_waits_1s_then_2s() {
        let executor = RetryExecutor::default();
        let start = Instant::now();
        let call_times = Arc::new(std::sync::Mutex::new(Vec::new()));

        let result: Result<(), CoreError> = executor
            .execute("generate", || {
                let call_times = call_times.clone();
                async move {
                    call_times.lock().unwrap().push(start.elapsed());
                    Err(unavailable())
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(CoreError::Llm(LlmError::ServiceUnavailable { .. }))
        ));
        let call_times = call_times.lock().unwrap().clone();
        assert_eq!(
            call_times,
            vec![
                Duration::ZERO,
                Duration::from_millis(1000),
                Duration::from_millis(3000),
            ]
        );
        assert_eq!(executor.get_metrics().failed_operations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_still_uses_every_attempt() {
        let executor = RetryExecutor::default();
        let start = Instant::now();
        let call_times = Arc::new(std::sync::Mutex::new(Vec::new()));

        let result: Result<(), CoreError> = executor
            .execute("search", || {
                let call_times = call_times.clone();
                async move {
                    call_times.lock().unwrap().push(start.elapsed());
                    Err(CoreError::Twitter(TwitterApiError::InvalidToken))
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(CoreError::Twitter(TwitterApiError::InvalidToken))
        ));
        assert_eq!(
            *call_times.lock().unwrap(),
            vec![
                Duration::ZERO,
                Duration::from_millis(1000),
                Duration::from_millis(3000),
            ]
        );
        let metrics = executor.get_metrics();
        assert_eq!(metrics.total_retries, 2);
        assert_eq!(metrics.failed_operations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_for_server_delay() {
        let executor = RetryExecutor::default();
        let start = Instant::now();
        let call_times = Arc::new(std::sync::Mutex::new(Vec::new()));

        let result = executor
            .execute("search", || {
                let call_times = call_times.clone();
                async move {
                    let mut times = call_times.lock().unwrap();
                    times.push(start.elapsed());
                    if times.len() == 1 {
                        Err(CoreError::Twitter(TwitterApiError::RateLimitExceeded {
                            retry_after: 5,
                        }))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(
            *call_times.lock().unwrap(),
            vec![Duration::ZERO, Duration::from_secs(5)]
        );
    }
}
