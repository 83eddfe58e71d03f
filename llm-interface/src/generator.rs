use crate::LlmProvider;
use persona_core::{CoreError, ErrorExt, RetryConfig, RetryExecutor, RetryMetrics};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Substituted for a reply when generation fails for good.
pub const GENERATION_FALLBACK: &str = "An error occurred while generating a response.";

/// Generates reply text with retries and a fixed fallback.
pub struct ReplyGenerator {
    provider: Arc<dyn LlmProvider>,
    retry: RetryExecutor,
    call_timeout: Duration,
}

impl ReplyGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            retry: RetryExecutor::new(RetryConfig::default()),
            call_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = RetryExecutor::new(config);
        self
    }

    /// Upper bound for a single completion attempt.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Completes `prompt` under the retry policy. The last attempt's error is returned.
    pub async fn generate_reply(&self, prompt: &str) -> Result<String, CoreError> {
        let timeout = self.call_timeout;
        self.retry
            .execute("generate reply", || async move {
                match tokio::time::timeout(timeout, self.provider.complete(prompt)).await {
                    Ok(result) => result,
                    Err(_) => Err(CoreError::Timeout {
                        seconds: timeout.as_secs(),
                    }),
                }
            })
            .await
    }

    /// Like [`generate_reply`](Self::generate_reply), but never fails.
    pub async fn generate_or_fallback(&self, prompt: &str) -> String {
        match self.generate_reply(prompt).await {
            Ok(text) => text,
            Err(e) => {
                e.log_warn();
                warn!(
                    "Reply generation via {} failed, using fallback text",
                    self.provider.name()
                );
                GENERATION_FALLBACK.to_string()
            }
        }
    }

    pub fn get_metrics(&self) -> RetryMetrics {
        self.retry.get_metrics()
    }
}
