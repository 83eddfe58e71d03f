use serde::{Deserialize, Serialize};

/// Shortest post text worth replying to.
pub const MIN_CANDIDATE_TEXT_LEN: usize = 5;

/// A post returned by a search, eligible for a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePost {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl CandidatePost {
    pub fn new(id: impl Into<String>, text: Option<&str>) -> Self {
        Self {
            id: id.into(),
            text: text.map(str::to_string),
        }
    }

    /// The text to reply to, if it is long enough to be worth it.
    pub fn reply_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .filter(|text| text.chars().count() >= MIN_CANDIDATE_TEXT_LEN)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyDraft {
    pub post_id: String,
    pub text: String,
}

/// Outcome of one tick of the poll-reply loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub candidates_seen: usize,
    pub skipped: usize,
    pub replies_sent: usize,
    pub replies_failed: usize,
    pub search_failed: bool,
}

/// Snapshot of the account the persona posts from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentState {
    pub username: String,
    pub follower_count: u64,
    pub tweet_count: u64,
}

/// Result of a single platform call, as reported to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostReceipt {
    pub id: String,
    pub text: String,
}
