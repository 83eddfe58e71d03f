//! Startup configuration, read once from the environment.

use crate::{ConfigError, Persona};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const OPENAI_KEY_PLACEHOLDER: &str = "YOUR_OPENAI_API_KEY";

const REQUIRED_VARS: [&str; 5] = [
    "AGENT_API_KEY",
    "TWITTER_API_KEY",
    "TWITTER_API_SECRET_KEY",
    "TWITTER_ACCESS_TOKEN",
    "TWITTER_ACCESS_TOKEN_SECRET",
];

const DEFAULT_SEARCH_QUERY: &str = "blockchain OR crypto OR $GODL";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
const DEFAULT_AGENT_STEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_RESTART_COOLDOWN_SECS: u64 = 60;
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DEDUP_CAPACITY: usize = 500;
const DEFAULT_OPENAI_MODEL: &str = "o1-mini-2024-09-12";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// How reply text is produced for each candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    /// Ask the language model, then strip hashtags.
    Generated,
    /// Uniformly random pick from the persona's templates.
    Random,
    /// Always the first persona template.
    Static,
}

impl FromStr for ReplyMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "generated" | "llm" | "ai" => Ok(Self::Generated),
            "random" | "templates" => Ok(Self::Random),
            "static" | "fixed" => Ok(Self::Static),
            _ => Err(ConfigError::InvalidValue {
                field: "REPLY_MODE".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct TwitterCredentials {
    pub api_key: String,
    pub api_secret_key: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl std::fmt::Debug for TwitterCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitterCredentials")
            .field("api_key", &"[redacted]")
            .field("api_secret_key", &"[redacted]")
            .field("access_token", &"[redacted]")
            .field("access_token_secret", &"[redacted]")
            .finish()
    }
}

/// Endpoint settings for an OpenAI-compatible chat completions API.
#[derive(Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl LlmSettings {
    pub fn has_real_key(&self) -> bool {
        !self.api_key.is_empty() && self.api_key != OPENAI_KEY_PLACEHOLDER
    }
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("api_key", &"[redacted]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub twitter: TwitterCredentials,
    /// Reply generation.
    pub llm: LlmSettings,
    /// Agent planning, authenticated with `AGENT_API_KEY`.
    pub planner: LlmSettings,
    pub search_query: String,
    pub poll_interval: Duration,
    pub agent_step_interval_secs: u64,
    pub restart_cooldown: Duration,
    pub call_timeout: Duration,
    pub reply_mode: ReplyMode,
    /// 0 disables reply de-duplication.
    pub dedup_capacity: usize,
    pub verbose: bool,
    pub persona: Persona,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let missing: Vec<String> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|key| get(key).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingEnvironmentVariables { var_names: missing });
        }
        let required = |key: &str| get(key).unwrap_or_default();

        let twitter = TwitterCredentials {
            api_key: required("TWITTER_API_KEY"),
            api_secret_key: required("TWITTER_API_SECRET_KEY"),
            access_token: required("TWITTER_ACCESS_TOKEN"),
            access_token_secret: required("TWITTER_ACCESS_TOKEN_SECRET"),
        };

        let llm = LlmSettings {
            api_key: get("OPENAI_API_KEY").unwrap_or_else(|| OPENAI_KEY_PLACEHOLDER.to_string()),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
        };

        let planner = LlmSettings {
            api_key: required("AGENT_API_KEY"),
            model: get("AGENT_PLANNER_MODEL").unwrap_or_else(|| llm.model.clone()),
            base_url: get("AGENT_PLANNER_BASE_URL").unwrap_or_else(|| llm.base_url.clone()),
        };

        let poll_interval_secs =
            parse_positive(&get, "POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let agent_step_interval_secs = parse_positive(
            &get,
            "AGENT_STEP_INTERVAL_SECS",
            DEFAULT_AGENT_STEP_INTERVAL_SECS,
        )?;
        let restart_cooldown_secs = parse_positive(
            &get,
            "AGENT_RESTART_COOLDOWN_SECS",
            DEFAULT_RESTART_COOLDOWN_SECS,
        )?;
        let call_timeout_secs =
            parse_positive(&get, "CALL_TIMEOUT_SECS", DEFAULT_CALL_TIMEOUT_SECS)?;

        let dedup_capacity = match get("REPLY_DEDUP_CAPACITY") {
            Some(value) => value
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue {
                    field: "REPLY_DEDUP_CAPACITY".to_string(),
                    value,
                })?,
            None => DEFAULT_DEDUP_CAPACITY,
        };

        let reply_mode = match get("REPLY_MODE") {
            Some(value) => value.parse::<ReplyMode>()?,
            None => ReplyMode::Generated,
        };

        let verbose = match get("AGENT_VERBOSE") {
            Some(value) => parse_bool(&value).ok_or(ConfigError::InvalidValue {
                field: "AGENT_VERBOSE".to_string(),
                value,
            })?,
            None => true,
        };

        let persona = match get("PERSONA_CONFIG") {
            Some(path) => Persona::from_file(Path::new(&path))?,
            None => Persona::default(),
        };

        Ok(Self {
            twitter,
            llm,
            planner,
            search_query: get("SEARCH_QUERY").unwrap_or_else(|| DEFAULT_SEARCH_QUERY.to_string()),
            poll_interval: Duration::from_secs(poll_interval_secs),
            agent_step_interval_secs,
            restart_cooldown: Duration::from_secs(restart_cooldown_secs),
            call_timeout: Duration::from_secs(call_timeout_secs),
            reply_mode,
            dedup_capacity,
            verbose,
            persona,
        })
    }
}

fn parse_positive<G>(get: &G, field: &str, default: u64) -> Result<u64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(field) {
        Some(value) => match value.parse::<u64>() {
            Ok(parsed) if parsed > 0 => Ok(parsed),
            _ => Err(ConfigError::InvalidValue {
                field: field.to_string(),
                value,
            }),
        },
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
