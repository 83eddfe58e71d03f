use agent_runtime::{
    AgentDefinition, LlmPlanner, PersonaAgent, PlatformStateProvider, RunOptions, TwitterWorker,
};
use anyhow::Context;
use background_service::{AgentSupervisor, PollReplyLoop};
use llm_interface::{OpenAiProvider, ReplyGenerator};
use persona_core::{AppConfig, ErrorExt, ReplyMode};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use twitter_client::{SocialPlatform, TwitterApiClient};

const DEFAULT_LOG_FILTER: &str = "sercryptic=info,background_service=info,agent_runtime=info,twitter_client=info,llm_interface=info,persona_core=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    info!("Starting SerCryptic persona bot");

    let config = AppConfig::from_env().map_err(|e| {
        e.log_error();
        error!("{}", e.user_friendly_message());
        e
    })?;
    info!(
        "Loaded configuration for {} (query {:?}, every {:?})",
        config.persona.name, config.search_query, config.poll_interval
    );

    let platform: Arc<dyn SocialPlatform> = Arc::new(
        TwitterApiClient::new(config.twitter.clone()).context("failed to build X API client")?,
    );

    let planner_provider =
        OpenAiProvider::new(&config.planner).context("failed to build planner client")?;
    let agent = Arc::new(
        PersonaAgent::new(
            AgentDefinition::from(&config.persona),
            Arc::new(LlmPlanner::new(Arc::new(planner_provider))),
            Arc::new(PlatformStateProvider::new(
                platform.clone(),
                config.persona.initial_state.clone(),
            )),
        )
        .with_worker(Arc::new(TwitterWorker::new(platform.clone()))),
    );
    agent.init().await.context("agent failed to initialize")?;

    let poll_loop = PollReplyLoop::new(platform.clone(), config.persona.clone(), &config.search_query)
        .with_call_timeout(config.call_timeout)
        .with_dedup_capacity(config.dedup_capacity);
    let poll_loop = match config.reply_mode {
        ReplyMode::Generated if config.llm.has_real_key() => {
            let provider =
                OpenAiProvider::new(&config.llm).context("failed to build reply generator")?;
            let generator =
                ReplyGenerator::new(Arc::new(provider)).with_call_timeout(config.call_timeout);
            poll_loop.with_generator(Arc::new(generator))
        }
        ReplyMode::Generated => {
            warn!("OPENAI_API_KEY is not set, replying with persona templates instead");
            poll_loop.with_reply_mode(ReplyMode::Random)
        }
        mode => poll_loop.with_reply_mode(mode),
    };
    let poll_loop = Arc::new(poll_loop);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let supervisor = AgentSupervisor::new(
        agent,
        config.agent_step_interval_secs,
        RunOptions {
            verbose: config.verbose,
        },
    )
    .with_cooldown(config.restart_cooldown);
    let supervisor_rx = shutdown_rx.clone();
    let supervisor_task = tokio::spawn(async move { supervisor.run(supervisor_rx).await });

    let loop_task = poll_loop.start(config.poll_interval, shutdown_rx)?;
    info!("SerCryptic is running; press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Shutdown requested");
    shutdown_tx.send(true).ok();

    if let Err(e) = loop_task.await {
        error!("Poll-reply loop task failed: {}", e);
    }
    if let Err(e) = supervisor_task.await {
        error!("Agent supervisor task failed: {}", e);
    }

    info!("SerCryptic stopped");
    Ok(())
}
