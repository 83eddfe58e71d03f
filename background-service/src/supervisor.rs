use agent_runtime::{AgentRuntime, RunOptions};
use persona_core::ErrorExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Keeps the agent running, restarting it after a cooldown whenever its run loop gives up.
pub struct AgentSupervisor {
    agent: Arc<dyn AgentRuntime>,
    poll_interval_secs: u64,
    options: RunOptions,
    cooldown: Duration,
    restarts: AtomicU64,
}

impl AgentSupervisor {
    pub fn new(agent: Arc<dyn AgentRuntime>, poll_interval_secs: u64, options: RunOptions) -> Self {
        Self {
            agent,
            poll_interval_secs,
            options,
            cooldown: Duration::from_secs(60),
            restarts: AtomicU64::new(0),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::SeqCst)
    }

    /// Returns only when `shutdown` flips to true or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let name = self.agent.name().to_string();

        loop {
            if *shutdown.borrow() {
                break;
            }

            info!("Starting agent {}", name);
            tokio::select! {
                result = self.agent.run(self.poll_interval_secs, self.options) => {
                    match result {
                        Ok(()) => warn!("Agent {} run loop returned unexpectedly", name),
                        Err(e) => {
                            e.log_error();
                            error!("Agent {} run loop failed: {}", name, e);
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let restart = self.restarts.fetch_add(1, Ordering::SeqCst) + 1;
            info!(
                "Restarting agent {} in {:?} (restart #{})",
                name, self.cooldown, restart
            );

            tokio::select! {
                _ = tokio::time::sleep(self.cooldown) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Agent supervisor for {} stopped", name);
    }
}
