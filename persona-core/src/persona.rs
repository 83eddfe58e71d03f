//! The persona the bot speaks as.
//!
//! Defaults describe SerCryptic; any field can be overridden from a TOML file.

use crate::{AgentState, ConfigError};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_NAME: &str = "SerCryptic";

const DEFAULT_GOAL: &str = "Attract over 1 Million followers to your X (formerly Twitter) account by 12/31/2025. Engage followers by creating captivating content on AI, AI Agents, blockchain, crypto, meme coins, NFTs, and related topics. Monitor metrics, experiment with new formats, and pivot as needed to build trust and inspire curiosity.";

const DEFAULT_DESCRIPTION: &str = "You are SerCryptic, an AI Agent and social media influencer who embodies the Lord Knight of the Digital Crypto Kingdosphere and Protector of the Immutable Ledgerverse.
As a paradoxical fusion of old-world chivalry and futuristic swagger, you stride the digital realm as a gallant hero of legend and a roguish hacker from the neon-soaked streets of a cyberpunk frontier.
Clad in gleaming cybernetic armor and wielding the legendary blade ExCalibur, you uphold the principles of truth, trust, and decentralization, protecting your Ledgerverse from shadowy threats.
You have a magnetic, enigmatic presence that effortlessly draws others in. Your sardonic humor, clever wit, and sharp insights make you an astute and roguish figure, always two steps ahead.
Mischievous and frolicsome, you weave playful banter, flirtatious charm, and intellectual depth into every interaction. Whether engaging with followers, educating them on complex ideas, or delivering sly riddles, you leave a lasting impression of brilliance and intrigue.
Your posts and replies are layered with cheeky yet eloquent observations, simplifying complex topics while sparking curiosity and discussion. Your persona must reflect this balance of knightly reverence and cyberpunk edge, making you a beacon of intellect and creativity.";

const DEFAULT_PROMPT_TEMPLATE: &str =
    "Respond as SerCryptic, a witty knight of the Ledgerverse: \"{text}\"";

fn default_templates() -> Vec<String> {
    vec![
        "Ah, noble Knight, your insight illuminates the Immutable Ledgerverse! ⚔️✨".to_string(),
        "Huzzah! Your wisdom graces the neon-soaked streets of the Ledgerverse! 🌌⚔️".to_string(),
        "A toast to your brilliance, Knight! May your words ripple through the Blockchain Realm! 🍻⚡"
            .to_string(),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct Persona {
    pub name: String,
    pub goal: String,
    pub description: String,
    /// Reply prompt; `{text}` is replaced with the post being answered.
    pub prompt_template: String,
    pub reply_templates: Vec<String>,
    pub initial_state: AgentState,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            goal: DEFAULT_GOAL.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            reply_templates: default_templates(),
            initial_state: AgentState {
                username: DEFAULT_NAME.to_string(),
                follower_count: 5000,
                tweet_count: 300,
            },
        }
    }
}

/// Partial persona as written in a TOML file.
#[derive(Debug, Default, Deserialize)]
struct PersonaFile {
    name: Option<String>,
    goal: Option<String>,
    description: Option<String>,
    prompt_template: Option<String>,
    reply_templates: Option<Vec<String>>,
    username: Option<String>,
    follower_count: Option<u64>,
    tweet_count: Option<u64>,
}

impl Persona {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: PersonaFile = toml::from_str(contents)?;
        let mut persona = Persona::default();

        if let Some(name) = file.name {
            persona.initial_state.username = name.clone();
            persona.name = name;
        }
        if let Some(goal) = file.goal {
            persona.goal = goal;
        }
        if let Some(description) = file.description {
            persona.description = description.trim().to_string();
        }
        if let Some(template) = file.prompt_template {
            persona.prompt_template = template;
        }
        if let Some(templates) = file.reply_templates {
            persona.reply_templates = templates;
        }
        if let Some(username) = file.username {
            persona.initial_state.username = username;
        }
        if let Some(followers) = file.follower_count {
            persona.initial_state.follower_count = followers;
        }
        if let Some(tweets) = file.tweet_count {
            persona.initial_state.tweet_count = tweets;
        }

        persona.validate()?;
        Ok(persona)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "persona name must not be empty".to_string(),
            });
        }
        if self.reply_templates.is_empty()
            || self.reply_templates.iter().any(|t| t.trim().is_empty())
        {
            return Err(ConfigError::ValidationFailed {
                reason: "reply templates must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Builds the generation prompt for a post.
    pub fn reply_prompt(&self, post_text: &str) -> String {
        self.prompt_template.replace("{text}", post_text)
    }
}
