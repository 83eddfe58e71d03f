use async_trait::async_trait;
use persona_core::{AgentError, CoreError};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use twitter_client::{PluginLogger, SocialPlatform};

const FEEDBACK_TEXT_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionArg {
    pub name: String,
    pub description: String,
}

/// A function the planner may call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub args: Vec<FunctionArg>,
}

impl FunctionSpec {
    fn new(name: &str, description: &str, args: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            args: args
                .iter()
                .map(|(name, description)| FunctionArg {
                    name: name.to_string(),
                    description: description.to_string(),
                })
                .collect(),
        }
    }
}

/// A named group of functions backed by one collaborator.
#[async_trait]
pub trait Worker: Send + Sync {
    fn id(&self) -> &str;

    fn functions(&self) -> Vec<FunctionSpec>;

    /// Runs `function` and returns feedback for the next planning step.
    async fn execute(
        &self,
        function: &str,
        args: &Value,
        log: &PluginLogger,
    ) -> Result<String, CoreError>;
}

/// Exposes the platform's post, reply, search and like operations.
pub struct TwitterWorker {
    platform: Arc<dyn SocialPlatform>,
}

impl TwitterWorker {
    pub fn new(platform: Arc<dyn SocialPlatform>) -> Self {
        Self { platform }
    }
}

fn string_arg<'a>(function: &str, args: &'a Value, name: &str) -> Result<&'a str, CoreError> {
    let value = match args.get(name) {
        Some(Value::String(value)) => value.trim(),
        _ => "",
    };
    if value.is_empty() {
        return Err(AgentError::InvalidArguments {
            function: function.to_string(),
            reason: format!("missing string argument `{}`", name),
        }
        .into());
    }
    Ok(value)
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let head: String = text.chars().take(limit).collect();
        format!("{}...", head)
    }
}

#[async_trait]
impl Worker for TwitterWorker {
    fn id(&self) -> &str {
        "twitter_worker"
    }

    fn functions(&self) -> Vec<FunctionSpec> {
        vec![
            FunctionSpec::new(
                "post_tweet",
                "Publish a new tweet",
                &[("text", "Content of the tweet")],
            ),
            FunctionSpec::new(
                "reply_tweet",
                "Reply to an existing tweet",
                &[
                    ("tweet_id", "Id of the tweet to reply to"),
                    ("text", "Content of the reply"),
                ],
            ),
            FunctionSpec::new(
                "search_tweets",
                "Search recent tweets",
                &[("query", "Search query")],
            ),
            FunctionSpec::new(
                "like_tweet",
                "Like a tweet",
                &[("tweet_id", "Id of the tweet to like")],
            ),
        ]
    }

    async fn execute(
        &self,
        function: &str,
        args: &Value,
        log: &PluginLogger,
    ) -> Result<String, CoreError> {
        match function {
            "post_tweet" => {
                let text = string_arg(function, args, "text")?;
                let receipt = self.platform.post(text, log).await?;
                Ok(format!("Posted tweet {}", receipt.id))
            }
            "reply_tweet" => {
                let tweet_id = string_arg(function, args, "tweet_id")?;
                let text = string_arg(function, args, "text")?;
                let receipt = self.platform.reply(tweet_id, text, log).await?;
                Ok(format!("Replied to {} with tweet {}", tweet_id, receipt.id))
            }
            "search_tweets" => {
                let query = string_arg(function, args, "query")?;
                let posts = self.platform.search(query, log).await?;
                if posts.is_empty() {
                    return Ok(format!("No tweets found for {}", query));
                }
                let lines: Vec<String> = posts
                    .iter()
                    .map(|post| {
                        format!(
                            "- {}: {}",
                            post.id,
                            truncate(post.text.as_deref().unwrap_or(""), FEEDBACK_TEXT_LIMIT)
                        )
                    })
                    .collect();
                Ok(format!(
                    "Found {} tweets for {}:\n{}",
                    posts.len(),
                    query,
                    lines.join("\n")
                ))
            }
            "like_tweet" => {
                let tweet_id = string_arg(function, args, "tweet_id")?;
                self.platform.like(tweet_id, log).await?;
                Ok(format!("Liked tweet {}", tweet_id))
            }
            other => Err(AgentError::UnknownFunction {
                function: other.to_string(),
            }
            .into()),
        }
    }
}
