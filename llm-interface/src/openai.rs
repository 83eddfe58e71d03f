use crate::LlmProvider;
use async_trait::async_trait;
use persona_core::{CoreError, LlmError, LlmSettings};
use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

/// Returned when the model answers with nothing.
pub const EMPTY_COMPLETION: &str = "No response generated.";

const PROVIDER: &str = "openai";
const DEFAULT_MAX_TOKENS: u32 = 100;
const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponseMessage {
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Trimmed text of the first choice, or [`EMPTY_COMPLETION`].
    pub fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| EMPTY_COMPLETION.to_string())
    }
}

/// OpenAI-compatible chat completions client.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    http_client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiProvider {
    pub fn new(settings: &LlmSettings) -> Result<Self, CoreError> {
        let http_client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            http_client,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn map_status(status: StatusCode, headers: &HeaderMap, body: &str, model: &str) -> LlmError {
        match status {
            StatusCode::UNAUTHORIZED => LlmError::InvalidApiKey {
                provider: PROVIDER.to_string(),
            },
            StatusCode::FORBIDDEN => LlmError::AuthenticationFailed {
                provider: PROVIDER.to_string(),
            },
            StatusCode::NOT_FOUND => LlmError::ModelNotAvailable {
                model: model.to_string(),
            },
            StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimitExceeded {
                provider: PROVIDER.to_string(),
                retry_after: headers
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.trim().parse::<u64>().ok())
                    .unwrap_or(1),
            },
            StatusCode::BAD_REQUEST if body.contains("content_filter") => {
                LlmError::ContentFiltered {
                    reason: body.to_string(),
                }
            }
            StatusCode::BAD_REQUEST => LlmError::InvalidPrompt {
                reason: body.to_string(),
            },
            _ => LlmError::ServiceUnavailable {
                provider: PROVIDER.to_string(),
            },
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, prompt: &str) -> Result<String, CoreError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!("Requesting completion from {} with model {}", url, self.model);

        let response = self
            .http_client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::Llm(LlmError::RequestTimeout {
                        provider: PROVIDER.to_string(),
                    })
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            error!("Completion request failed with status {}: {}", status, body);
            return Err(Self::map_status(status, &headers, &body, &self.model).into());
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse completion response: {}", e);
            CoreError::Llm(LlmError::InvalidResponseFormat {
                provider: PROVIDER.to_string(),
            })
        })?;

        let text = completion.into_text();
        info!("Received completion ({} chars)", text.chars().count());
        Ok(text)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    fn settings() -> LlmSettings {
        LlmSettings {
            api_key: "sk-test".to_string(),
            model: "o1-mini-2024-09-12".to_string(),
            base_url: "https://api.openai.com/v1/".to_string(),
        }
    }

    #[test]
    fn test_provider_defaults() {
        let provider = OpenAiProvider::new(&settings()).unwrap();
        assert_eq!(provider.model(), "o1-mini-2024-09-12");
        assert_eq!(provider.base_url, "https://api.openai.com/v1");
        assert_eq!(provider.max_tokens, 100);
        assert_eq!(provider.temperature, 0.7);
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn test_request_body_shape() {
        let request = ChatCompletionRequest {
            model: "o1-mini-2024-09-12",
            messages: vec![ChatMessage {
                role: "user",
                content: "hello",
            }],
            max_tokens: 100,
            temperature: 0.7,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hello");
        assert_eq!(value["max_tokens"], 100);
    }

    #[test]
    fn test_completion_is_trimmed() {
        let response: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "role": "assistant", "content": "  Huzzah, knight!\n" } }]
        }))
        .unwrap();
        assert_eq!(response.into_text(), "Huzzah, knight!");
    }

    #[test]
    fn test_empty_completion_maps_to_placeholder() {
        for body in [
            json!({ "choices": [] }),
            json!({}),
            json!({ "choices": [{ "message": { "content": null } }] }),
            json!({ "choices": [{ "message": { "content": "   " } }] }),
        ] {
            let response: ChatCompletionResponse = serde_json::from_value(body).unwrap();
            assert_eq!(response.into_text(), EMPTY_COMPLETION);
        }
    }

    #[test]
    fn test_status_mapping() {
        let mut headers = HeaderMap::new();
        let model = "o1-mini-2024-09-12";

        assert!(matches!(
            OpenAiProvider::map_status(StatusCode::UNAUTHORIZED, &headers, "", model),
            LlmError::InvalidApiKey { .. }
        ));
        assert!(matches!(
            OpenAiProvider::map_status(StatusCode::NOT_FOUND, &headers, "", model),
            LlmError::ModelNotAvailable { .. }
        ));
        assert!(matches!(
            OpenAiProvider::map_status(StatusCode::BAD_GATEWAY, &headers, "", model),
            LlmError::ServiceUnavailable { .. }
        ));
        assert!(matches!(
            OpenAiProvider::map_status(StatusCode::BAD_REQUEST, &headers, "code: content_filter", model),
            LlmError::ContentFiltered { .. }
        ));

        headers.insert("retry-after", HeaderValue::from_static("20"));
        assert!(matches!(
            OpenAiProvider::map_status(StatusCode::TOO_MANY_REQUESTS, &headers, "", model),
            LlmError::RateLimitExceeded { retry_after: 20, .. }
        ));
    }
}
