use crate::{AgentDefinition, FunctionSpec};
use async_trait::async_trait;
use llm_interface::LlmProvider;
use persona_core::{AgentError, AgentState, CoreError};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Everything the planner sees for one step.
#[derive(Debug, Clone)]
pub struct PlanningContext<'a> {
    pub definition: &'a AgentDefinition,
    pub state: &'a AgentState,
    pub functions: &'a [FunctionSpec],
    /// Feedback from the previous step, if any.
    pub last_feedback: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedAction {
    pub function: String,
    pub args: Value,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Act(PlannedAction),
    Wait { reason: String },
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, context: &PlanningContext<'_>) -> Result<Plan, CoreError>;
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    action: String,
    #[serde(default)]
    args: Value,
    #[serde(default)]
    reasoning: String,
}

/// Asks a language model for the next action as JSON.
pub struct LlmPlanner {
    provider: Arc<dyn LlmProvider>,
}

impl LlmPlanner {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    pub fn build_prompt(context: &PlanningContext<'_>) -> String {
        let mut prompt = format!(
            "{}\n\nGoal: {}\n\nCurrent state: @{} has {} followers and {} tweets.\n\n",
            context.definition.description,
            context.definition.goal,
            context.state.username,
            context.state.follower_count,
            context.state.tweet_count,
        );

        if let Some(feedback) = context.last_feedback {
            prompt.push_str(&format!("Result of your last action:\n{}\n\n", feedback));
        }

        prompt.push_str("Available functions:\n");
        for function in context.functions {
            let args: Vec<String> = function
                .args
                .iter()
                .map(|arg| format!("{} ({})", arg.name, arg.description))
                .collect();
            prompt.push_str(&format!(
                "- {}: {}. Args: {}\n",
                function.name,
                function.description,
                args.join(", ")
            ));
        }

        prompt.push_str(
            "\nChoose the single next action. Respond with only a JSON object like \
             {\"action\": \"<function name or wait>\", \"args\": {...}, \"reasoning\": \"...\"}",
        );
        prompt
    }
}

/// Parses a planner response, tolerating prose around the JSON object.
pub fn parse_plan(response: &str) -> Result<Plan, CoreError> {
    let trimmed = response.trim();

    let raw = serde_json::from_str::<RawPlan>(trimmed).ok().or_else(|| {
        let start = trimmed.find('{')?;
        let end = trimmed.rfind('}')?;
        if end < start {
            return None;
        }
        serde_json::from_str::<RawPlan>(&trimmed[start..=end]).ok()
    });

    let raw = raw.ok_or_else(|| AgentError::PlanningFailed {
        reason: format!("no action in planner response: {}", trimmed),
    })?;

    let action = raw.action.trim();
    if action.is_empty() || action.eq_ignore_ascii_case("wait") {
        return Ok(Plan::Wait {
            reason: raw.reasoning,
        });
    }

    Ok(Plan::Act(PlannedAction {
        function: action.to_string(),
        args: if raw.args.is_null() {
            Value::Object(Default::default())
        } else {
            raw.args
        },
        reasoning: raw.reasoning,
    }))
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, context: &PlanningContext<'_>) -> Result<Plan, CoreError> {
        let prompt = Self::build_prompt(context);
        let response = self.provider.complete(&prompt).await?;
        debug!("Planner response: {}", response);
        parse_plan(&response)
    }
}
