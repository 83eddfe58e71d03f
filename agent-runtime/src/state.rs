use async_trait::async_trait;
use persona_core::{AgentState, CoreError, ErrorExt};
use std::sync::Arc;
use tracing::debug;
use twitter_client::SocialPlatform;

/// Supplies the account snapshot the planner reasons about.
#[async_trait]
pub trait StateProvider: Send + Sync {
    async fn get_state(&self) -> Result<AgentState, CoreError>;
}

/// Always reports the same snapshot.
#[derive(Debug, Clone)]
pub struct StaticStateProvider {
    state: AgentState,
}

impl StaticStateProvider {
    pub fn new(state: AgentState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl StateProvider for StaticStateProvider {
    async fn get_state(&self) -> Result<AgentState, CoreError> {
        Ok(self.state.clone())
    }
}

/// Reads live public metrics, falling back to a fixed snapshot.
pub struct PlatformStateProvider {
    platform: Arc<dyn SocialPlatform>,
    fallback: AgentState,
}

impl PlatformStateProvider {
    pub fn new(platform: Arc<dyn SocialPlatform>, fallback: AgentState) -> Self {
        Self { platform, fallback }
    }
}

#[async_trait]
impl StateProvider for PlatformStateProvider {
    async fn get_state(&self) -> Result<AgentState, CoreError> {
        match self.platform.me().await {
            Ok(state) => Ok(state),
            Err(e) => {
                debug!("Using fallback agent state: {}", e.user_friendly_message());
                Ok(self.fallback.clone())
            }
        }
    }
}
