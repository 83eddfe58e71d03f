use chrono::Utc;
use persona_core::AgentState;
use std::sync::Arc;
use tracing::info;

/// Receives `(owner_name, message)` for every agent and worker event.
pub type AgentLogger = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Logs a timestamped line through `tracing`.
pub fn default_logger() -> AgentLogger {
    Arc::new(|owner: &str, message: &str| {
        info!(
            target: "agent_runtime::log",
            "[{}] [{}] {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            owner,
            message
        );
    })
}

/// One-line rendering of a state snapshot.
pub fn format_state(state: &AgentState) -> String {
    format!(
        "State: @{} | followers: {} | tweets: {}",
        state.username, state.follower_count, state.tweet_count
    )
}
