use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Twitter API error: {0}")]
    Twitter(#[from] TwitterApiError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Operation timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Which platform operation an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformOperation {
    Search,
    Reply,
    Post,
    Like,
    Me,
}

impl PlatformOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformOperation::Search => "search",
            PlatformOperation::Reply => "reply",
            PlatformOperation::Post => "post",
            PlatformOperation::Like => "like",
            PlatformOperation::Me => "me",
        }
    }
}

impl std::fmt::Display for PlatformOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone)]
pub enum TwitterApiError {
    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Tweet not found: {tweet_id}")]
    TweetNotFound { tweet_id: String },

    #[error("Invalid OAuth token")]
    InvalidToken,

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },

    #[error("{operation} failed: {message}")]
    OperationFailed {
        operation: PlatformOperation,
        message: String,
    },
}

impl TwitterApiError {
    /// Search failure after retries were exhausted.
    pub fn search(message: impl Into<String>) -> Self {
        TwitterApiError::OperationFailed {
            operation: PlatformOperation::Search,
            message: message.into(),
        }
    }

    /// Reply submission failure.
    pub fn reply(message: impl Into<String>) -> Self {
        TwitterApiError::OperationFailed {
            operation: PlatformOperation::Reply,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("Provider authentication failed: {provider}")]
    AuthenticationFailed { provider: String },

    #[error("API key invalid or missing for {provider}")]
    InvalidApiKey { provider: String },

    #[error("Rate limit exceeded for {provider}. Retry after {retry_after} seconds")]
    RateLimitExceeded { provider: String, retry_after: u64 },

    #[error("Model not available: {model}")]
    ModelNotAvailable { model: String },

    #[error("Invalid prompt: {reason}")]
    InvalidPrompt { reason: String },

    #[error("Content filtered by provider: {reason}")]
    ContentFiltered { reason: String },

    #[error("Provider service unavailable: {provider}")]
    ServiceUnavailable { provider: String },

    #[error("Request timeout for {provider}")]
    RequestTimeout { provider: String },

    #[error("Invalid response format from {provider}")]
    InvalidResponseFormat { provider: String },
}

#[derive(Error, Debug, Clone)]
pub enum AgentError {
    #[error("Agent {agent} has not been initialized")]
    NotInitialized { agent: String },

    #[error("Agent {agent} has no worker functions")]
    NoFunctions { agent: String },

    #[error("Unknown function requested by planner: {function}")]
    UnknownFunction { function: String },

    #[error("Invalid arguments for {function}: {reason}")]
    InvalidArguments { function: String, reason: String },

    #[error("Planner failed: {reason}")]
    PlanningFailed { reason: String },

    #[error("Agent run loop stopped after {failures} consecutive failures: {last_error}")]
    RunLoop { failures: u32, last_error: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Missing required environment variables: {}", .var_names.join(", "))]
    MissingEnvironmentVariables { var_names: Vec<String> },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
