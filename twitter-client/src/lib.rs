pub mod api;
pub mod oauth;
pub mod rate_limiter;
pub mod search;

pub use api::TwitterApiClient;
pub use oauth::OAuthSigner;
pub use rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
pub use search::normalize_search_response;

use async_trait::async_trait;
use persona_core::{AgentState, CandidatePost, CoreError, PostReceipt};

/// Free-form status callback handed to every platform call.
pub type PluginLogger = dyn Fn(&str) + Send + Sync;

fn discard(_: &str) {}

/// A plugin logger that discards everything.
pub fn silent_logger() -> &'static PluginLogger {
    &discard
}

/// Remote operations the bot performs against the social platform.
#[async_trait]
pub trait SocialPlatform: Send + Sync {
    async fn search(&self, query: &str, log: &PluginLogger)
        -> Result<Vec<CandidatePost>, CoreError>;

    async fn reply(
        &self,
        post_id: &str,
        text: &str,
        log: &PluginLogger,
    ) -> Result<PostReceipt, CoreError>;

    async fn post(&self, text: &str, log: &PluginLogger) -> Result<PostReceipt, CoreError>;

    async fn like(&self, post_id: &str, log: &PluginLogger) -> Result<(), CoreError>;

    /// Public metrics of the authenticated account.
    async fn me(&self) -> Result<AgentState, CoreError>;
}
