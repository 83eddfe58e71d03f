//! A small autonomous agent: plan a function call from the persona's goal and
//! current account state, run it against the platform, repeat.

pub mod agent;
pub mod definition;
pub mod logger;
pub mod planner;
pub mod state;
pub mod worker;

pub use agent::{AgentRuntime, PersonaAgent, RunOptions, DEFAULT_MAX_CONSECUTIVE_FAILURES};
pub use definition::AgentDefinition;
pub use logger::{default_logger, format_state, AgentLogger};
pub use planner::{LlmPlanner, Plan, PlannedAction, Planner, PlanningContext};
pub use state::{PlatformStateProvider, StateProvider, StaticStateProvider};
pub use worker::{FunctionArg, FunctionSpec, TwitterWorker, Worker};
