use crate::oauth::OAuthSigner;
use crate::rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
use crate::search::normalize_search_response;
use crate::{PluginLogger, SocialPlatform};
use async_trait::async_trait;
use persona_core::{
    AgentState, CandidatePost, CoreError, PlatformOperation, PostReceipt, TwitterApiError,
    TwitterCredentials,
};
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};
use url::Url;

const X_API_BASE: &str = "https://api.twitter.com/2";
const DEFAULT_MAX_RESULTS: u8 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<XApiError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XApiError {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl XApiError {
    fn describe(&self) -> String {
        self.detail
            .clone()
            .or_else(|| self.message.clone())
            .or_else(|| self.title.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetData {
    pub id: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeData {
    pub liked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub tweet_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserData {
    pub id: String,
    pub username: String,
    pub public_metrics: Option<PublicMetrics>,
}

impl From<UserData> for AgentState {
    fn from(user: UserData) -> Self {
        let metrics = user.public_metrics.unwrap_or(PublicMetrics {
            followers_count: 0,
            tweet_count: 0,
        });
        Self {
            username: user.username,
            follower_count: metrics.followers_count,
            tweet_count: metrics.tweet_count,
        }
    }
}

#[derive(Debug)]
pub struct TwitterApiClient {
    http_client: Client,
    signer: OAuthSigner,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
    max_results: u8,
    user_id: OnceCell<String>,
}

impl TwitterApiClient {
    pub fn new(credentials: TwitterCredentials) -> Result<Self, CoreError> {
        Self::with_base_url(credentials, X_API_BASE)
    }

    pub fn with_base_url(credentials: TwitterCredentials, base_url: &str) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(concat!("sercryptic/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            signer: OAuthSigner::new(credentials),
            rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::x_api())),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            user_id: OnceCell::new(),
        })
    }

    /// Search page size; the X API accepts 10 to 100.
    pub fn with_max_results(mut self, max_results: u8) -> Self {
        self.max_results = max_results.clamp(10, 100);
        self
    }

    fn endpoint_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, CoreError> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path)).map_err(|e| {
            CoreError::InvalidInput {
                message: format!("Invalid X API url for {path}: {e}"),
            }
        })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    pub async fn make_request(
        &self,
        operation: PlatformOperation,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, CoreError> {
        let url = self.endpoint_url(path, query)?;

        self.rate_limiter.acquire().await;
        debug!("Acquired rate limit permit for {} {}", method, path);

        let auth_header = self.signer.authorization_header(method.as_str(), &url, &[])?;
        let mut request_builder = self
            .http_client
            .request(method.clone(), url)
            .header(AUTHORIZATION, auth_header);
        if let Some(body) = body {
            request_builder = request_builder.json(body);
        }

        info!("Making X API request: {} {}", method, path);
        let response = request_builder.send().await.map_err(|e| {
            error!("Network error for {} {}: {}", method, path, e);
            if e.is_timeout() {
                CoreError::Twitter(TwitterApiError::RequestTimeout)
            } else {
                CoreError::Network(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_secs(response.headers());
            let body = response.text().await.unwrap_or_default();
            error!("Request failed with status: {} for {}: {}", status, path, body);

            let error = match status {
                StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = retry_after.unwrap_or(60);
                    self.rate_limiter
                        .back_off(Duration::from_secs(retry_after))
                        .await;
                    TwitterApiError::RateLimitExceeded { retry_after }
                }
                StatusCode::UNAUTHORIZED => TwitterApiError::InvalidToken,
                StatusCode::FORBIDDEN => TwitterApiError::Forbidden {
                    resource: path.to_string(),
                },
                StatusCode::NOT_FOUND => TwitterApiError::TweetNotFound {
                    tweet_id: path.to_string(),
                },
                s if s.is_server_error() => TwitterApiError::ServerError {
                    status_code: s.as_u16(),
                },
                s => TwitterApiError::OperationFailed {
                    operation,
                    message: format!("HTTP {}: {}", s.as_u16(), body),
                },
            };
            return Err(error.into());
        }

        response.json::<Value>().await.map_err(|e| {
            error!("Failed to parse {} response: {}", operation, e);
            CoreError::Twitter(TwitterApiError::InvalidResponse {
                details: format!("Failed to parse {} response", operation),
            })
        })
    }

    fn parse_data<T>(operation: PlatformOperation, value: Value) -> Result<T, CoreError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response: XResponse<T> = serde_json::from_value(value).map_err(|e| {
            CoreError::Twitter(TwitterApiError::InvalidResponse {
                details: format!("Unexpected {} payload: {}", operation, e),
            })
        })?;

        match response.data {
            Some(data) => Ok(data),
            None => {
                let message = response
                    .errors
                    .iter()
                    .map(XApiError::describe)
                    .collect::<Vec<_>>()
                    .join("; ");
                Err(TwitterApiError::OperationFailed { operation, message }.into())
            }
        }
    }

    async fn authenticated_user(&self) -> Result<UserData, CoreError> {
        let value = self
            .make_request(
                PlatformOperation::Me,
                Method::GET,
                "users/me",
                &[("user.fields", "public_metrics")],
                None,
            )
            .await?;
        Self::parse_data(PlatformOperation::Me, value)
    }

    async fn user_id(&self) -> Result<&str, CoreError> {
        let id = self
            .user_id
            .get_or_try_init(|| async { self.authenticated_user().await.map(|user| user.id) })
            .await?;
        Ok(id.as_str())
    }

    async fn create_tweet(
        &self,
        operation: PlatformOperation,
        body: Value,
    ) -> Result<PostReceipt, CoreError> {
        let value = self
            .make_request(operation, Method::POST, "tweets", &[], Some(&body))
            .await?;
        let tweet: TweetData = Self::parse_data(operation, value)?;
        Ok(PostReceipt {
            id: tweet.id,
            text: tweet.text,
        })
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        self.rate_limiter.get_rate_limit_status().await
    }
}

#[async_trait]
impl SocialPlatform for TwitterApiClient {
    async fn search(
        &self,
        query: &str,
        log: &PluginLogger,
    ) -> Result<Vec<CandidatePost>, CoreError> {
        log(&format!("Searching for tweets with query: {}", query));
        let max_results = self.max_results.to_string();
        let value = self
            .make_request(
                PlatformOperation::Search,
                Method::GET,
                "tweets/search/recent",
                &[("query", query), ("max_results", max_results.as_str())],
                None,
            )
            .await?;

        let posts = normalize_search_response(&value);
        log(&format!("Found {} tweets", posts.len()));
        Ok(posts)
    }

    async fn reply(
        &self,
        post_id: &str,
        text: &str,
        log: &PluginLogger,
    ) -> Result<PostReceipt, CoreError> {
        log(&format!("Replying to tweet {}", post_id));
        let body = json!({
            "text": text,
            "reply": { "in_reply_to_tweet_id": post_id },
        });
        let receipt = self.create_tweet(PlatformOperation::Reply, body).await?;
        log(&format!("Successfully replied to tweet {} with {}", post_id, receipt.id));
        Ok(receipt)
    }

    async fn post(&self, text: &str, log: &PluginLogger) -> Result<PostReceipt, CoreError> {
        log("Posting tweet");
        let receipt = self
            .create_tweet(PlatformOperation::Post, json!({ "text": text }))
            .await?;
        log(&format!("Successfully posted tweet {}", receipt.id));
        Ok(receipt)
    }

    async fn like(&self, post_id: &str, log: &PluginLogger) -> Result<(), CoreError> {
        log(&format!("Liking tweet {}", post_id));
        let user_id = self.user_id().await?;
        let path = format!("users/{}/likes", user_id);
        let value = self
            .make_request(
                PlatformOperation::Like,
                Method::POST,
                &path,
                &[],
                Some(&json!({ "tweet_id": post_id })),
            )
            .await?;

        let like: LikeData = Self::parse_data(PlatformOperation::Like, value)?;
        if !like.liked {
            warn!("X API accepted like for {} but reported liked=false", post_id);
        }
        log(&format!("Successfully liked tweet {}", post_id));
        Ok(())
    }

    async fn me(&self) -> Result<AgentState, CoreError> {
        let user = self.authenticated_user().await?;
        let _ = self.user_id.set(user.id.clone());
        Ok(user.into())
    }
}

/// Seconds to wait from `retry-after`, or from the `x-rate-limit-reset` epoch.
fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
    };

    if let Some(seconds) = header("retry-after") {
        return Some(seconds);
    }

    let reset_at = header("x-rate-limit-reset")?;
    let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
    Some(reset_at.saturating_sub(now).max(1))
}
