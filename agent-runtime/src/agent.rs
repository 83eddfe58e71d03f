use crate::logger::{default_logger, format_state, AgentLogger};
use crate::planner::{Plan, Planner, PlanningContext};
use crate::state::StateProvider;
use crate::worker::{FunctionSpec, Worker};
use crate::AgentDefinition;
use async_trait::async_trait;
use persona_core::{AgentError, CoreError, ErrorExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Log the state snapshot on every step.
    pub verbose: bool,
}

/// Lifecycle the supervisor drives.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    fn name(&self) -> &str;

    /// Runs until the loop gives up. Only returns with an error.
    async fn run(&self, poll_interval_secs: u64, options: RunOptions) -> Result<(), CoreError>;
}

pub struct PersonaAgent {
    definition: AgentDefinition,
    workers: Vec<Arc<dyn Worker>>,
    planner: Arc<dyn Planner>,
    state_provider: Arc<dyn StateProvider>,
    logger: AgentLogger,
    max_consecutive_failures: u32,
    initialized: AtomicBool,
    last_feedback: Mutex<Option<String>>,
}

impl PersonaAgent {
    pub fn new(
        definition: AgentDefinition,
        planner: Arc<dyn Planner>,
        state_provider: Arc<dyn StateProvider>,
    ) -> Self {
        Self {
            definition,
            workers: Vec::new(),
            planner,
            state_provider,
            logger: default_logger(),
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            initialized: AtomicBool::new(false),
            last_feedback: Mutex::new(None),
        }
    }

    pub fn with_worker(mut self, worker: Arc<dyn Worker>) -> Self {
        self.workers.push(worker);
        self
    }

    pub fn with_logger(mut self, logger: AgentLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max.max(1);
        self
    }

    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn log(&self, message: &str) {
        (self.logger)(&self.definition.name, message);
    }

    fn functions(&self) -> Vec<FunctionSpec> {
        self.workers
            .iter()
            .flat_map(|worker| worker.functions())
            .collect()
    }

    fn set_feedback(&self, feedback: String) {
        if let Ok(mut last) = self.last_feedback.lock() {
            *last = Some(feedback);
        }
    }

    fn feedback(&self) -> Option<String> {
        self.last_feedback.lock().ok().and_then(|last| last.clone())
    }

    /// Checks the worker set and takes a first state snapshot.
    pub async fn init(&self) -> Result<(), CoreError> {
        if self.functions().is_empty() {
            return Err(AgentError::NoFunctions {
                agent: self.definition.name.clone(),
            }
            .into());
        }

        let state = self.state_provider.get_state().await?;
        self.log(&format_state(&state));

        self.initialized.store(true, Ordering::SeqCst);
        self.log("Agent initialized");
        info!(
            "Agent {} initialized with {} workers",
            self.definition.name,
            self.workers.len()
        );
        Ok(())
    }

    /// Plans and runs one action.
    pub async fn step(&self, options: RunOptions) -> Result<(), CoreError> {
        let state = self.state_provider.get_state().await?;
        if options.verbose {
            self.log(&format_state(&state));
        }

        let functions = self.functions();
        let feedback = self.feedback();
        let context = PlanningContext {
            definition: &self.definition,
            state: &state,
            functions: &functions,
            last_feedback: feedback.as_deref(),
        };

        let action = match self.planner.plan(&context).await? {
            Plan::Wait { reason } => {
                self.log(&format!("Waiting: {}", reason));
                return Ok(());
            }
            Plan::Act(action) => action,
        };

        let worker = self
            .workers
            .iter()
            .find(|worker| {
                worker
                    .functions()
                    .iter()
                    .any(|function| function.name == action.function)
            })
            .ok_or_else(|| AgentError::UnknownFunction {
                function: action.function.clone(),
            })?;

        if options.verbose && !action.reasoning.is_empty() {
            self.log(&format!("Reasoning: {}", action.reasoning));
        }
        self.log(&format!("Executing {}", action.function));

        let worker_id = worker.id().to_string();
        let logger = self.logger.clone();
        let plugin_log = move |message: &str| logger(&worker_id, message);
        let feedback = worker
            .execute(&action.function, &action.args, &plugin_log)
            .await?;

        self.log(&feedback);
        self.set_feedback(feedback);
        Ok(())
    }
}

#[async_trait]
impl AgentRuntime for PersonaAgent {
    fn name(&self) -> &str {
        &self.definition.name
    }

    async fn run(&self, poll_interval_secs: u64, options: RunOptions) -> Result<(), CoreError> {
        if !self.is_initialized() {
            return Err(AgentError::NotInitialized {
                agent: self.definition.name.clone(),
            }
            .into());
        }
        if poll_interval_secs == 0 {
            return Err(CoreError::InvalidInput {
                message: "agent poll interval must be positive".to_string(),
            });
        }

        let interval = Duration::from_secs(poll_interval_secs);
        let mut failures = 0u32;

        loop {
            match self.step(options).await {
                Ok(()) => failures = 0,
                Err(e) => {
                    failures += 1;
                    e.log_warn();
                    self.log(&format!(
                        "Step failed ({}/{}): {}",
                        failures,
                        self.max_consecutive_failures,
                        e.user_friendly_message()
                    ));
                    self.set_feedback(format!("Last action failed: {}", e));

                    if failures >= self.max_consecutive_failures {
                        warn!(
                            "Agent {} stopping after {} consecutive failures",
                            self.definition.name, failures
                        );
                        return Err(AgentError::RunLoop {
                            failures,
                            last_error: e.to_string(),
                        }
                        .into());
                    }
                }
            }

            tokio::time::sleep(interval).await;
        }
    }
}
