pub mod generator;
pub mod openai;

pub use generator::{ReplyGenerator, GENERATION_FALLBACK};
pub use openai::{OpenAiProvider, EMPTY_COMPLETION};

use async_trait::async_trait;
use persona_core::CoreError;

/// A text-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Completes `prompt`. The returned text is already trimmed.
    async fn complete(&self, prompt: &str) -> Result<String, CoreError>;

    fn name(&self) -> &str;
}
