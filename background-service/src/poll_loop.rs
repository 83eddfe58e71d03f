use crate::dedup::RecentlySeen;
use llm_interface::ReplyGenerator;
use persona_core::{
    remove_hashtags, CandidatePost, CoreError, ErrorExt, Persona, ReplyDraft, ReplyMode,
    RetryConfig, RetryExecutor, RunSummary, TwitterApiError,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, info_span, warn, Instrument};
use twitter_client::SocialPlatform;
use uuid::Uuid;

/// Clears the in-flight flag when a tick ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Searches for persona-relevant posts and replies to each one.
pub struct PollReplyLoop {
    platform: Arc<dyn SocialPlatform>,
    generator: Option<Arc<ReplyGenerator>>,
    persona: Persona,
    reply_mode: ReplyMode,
    search_query: String,
    search_retry: RetryExecutor,
    call_timeout: Duration,
    in_flight: AtomicBool,
    skipped_ticks: AtomicU64,
    recently_seen: Mutex<RecentlySeen>,
}

impl PollReplyLoop {
    pub fn new(platform: Arc<dyn SocialPlatform>, persona: Persona, search_query: &str) -> Self {
        Self {
            platform,
            generator: None,
            persona,
            reply_mode: ReplyMode::Random,
            search_query: search_query.to_string(),
            search_retry: RetryExecutor::new(RetryConfig::twitter()),
            call_timeout: Duration::from_secs(30),
            in_flight: AtomicBool::new(false),
            skipped_ticks: AtomicU64::new(0),
            recently_seen: Mutex::new(RecentlySeen::new(0)),
        }
    }

    /// Generates replies with `generator` and switches to [`ReplyMode::Generated`].
    pub fn with_generator(mut self, generator: Arc<ReplyGenerator>) -> Self {
        self.generator = Some(generator);
        self.reply_mode = ReplyMode::Generated;
        self
    }

    pub fn with_reply_mode(mut self, reply_mode: ReplyMode) -> Self {
        self.reply_mode = reply_mode;
        self
    }

    pub fn with_search_retry(mut self, config: RetryConfig) -> Self {
        self.search_retry = RetryExecutor::new(config);
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Remember up to `capacity` replied-to posts so they are not answered twice.
    pub fn with_dedup_capacity(mut self, capacity: usize) -> Self {
        self.recently_seen = Mutex::new(RecentlySeen::new(capacity));
        self
    }

    pub fn reply_mode(&self) -> ReplyMode {
        self.reply_mode
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks.load(Ordering::SeqCst)
    }

    async fn with_timeout<T, F>(&self, call: F) -> Result<T, CoreError>
    where
        F: Future<Output = Result<T, CoreError>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::Timeout {
                seconds: self.call_timeout.as_secs(),
            }),
        }
    }

    fn already_replied(&self, post_id: &str) -> bool {
        self.recently_seen
            .lock()
            .map(|seen| seen.contains(post_id))
            .unwrap_or(false)
    }

    fn remember_reply(&self, post_id: &str) {
        if let Ok(mut seen) = self.recently_seen.lock() {
            seen.insert(post_id);
        }
    }

    fn random_template(&self) -> String {
        let templates = &self.persona.reply_templates;
        if templates.is_empty() {
            return String::new();
        }
        templates[fastrand::usize(..templates.len())].clone()
    }

    /// Reply text for `post_text`, or `None` if nothing usable is left.
    async fn compose_reply(&self, post_text: &str) -> Option<String> {
        let text = match (self.reply_mode, &self.generator) {
            (ReplyMode::Static, _) => self.persona.reply_templates.first().cloned()?,
            (ReplyMode::Random, _) => self.random_template(),
            (ReplyMode::Generated, Some(generator)) => {
                let prompt = self.persona.reply_prompt(post_text);
                let generated = generator.generate_or_fallback(&prompt).await;
                remove_hashtags(&generated)
            }
            (ReplyMode::Generated, None) => {
                warn!("No reply generator configured, using a template");
                self.random_template()
            }
        };

        let text = text.trim().to_string();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<CandidatePost>, CoreError> {
        let log = |message: &str| debug!(target: "twitter_client::plugin", "{}", message);
        self.search_retry
            .execute("search", || {
                self.with_timeout(self.platform.search(query, &log))
            })
            .await
    }

    /// Runs one poll-reply pass. Never fails; problems end up in the summary and the log.
    pub async fn run_once(&self, query: &str) -> RunSummary {
        let mut summary = RunSummary::default();

        info!("Searching for posts matching {:?}", query);
        let candidates = match self.search(query).await {
            Ok(candidates) => candidates,
            Err(e) => {
                let search_error = TwitterApiError::search(e.user_friendly_message());
                error!(code = %e.error_code(), "{}: {}", search_error, e);
                summary.search_failed = true;
                return summary;
            }
        };

        summary.candidates_seen = candidates.len();
        if candidates.is_empty() {
            info!("No matches for {:?}", query);
            return summary;
        }
        info!("Found {} candidate posts", candidates.len());

        for candidate in &candidates {
            let Some(post_text) = candidate.reply_text() else {
                debug!("Skipping post {}: text missing or too short", candidate.id);
                summary.skipped += 1;
                continue;
            };

            if self.already_replied(&candidate.id) {
                debug!("Skipping post {}: already replied", candidate.id);
                summary.skipped += 1;
                continue;
            }

            let Some(text) = self.compose_reply(post_text).await else {
                warn!("Skipping post {}: reply text empty after sanitizing", candidate.id);
                summary.skipped += 1;
                continue;
            };
            let draft = ReplyDraft {
                post_id: candidate.id.clone(),
                text,
            };

            let log = |message: &str| info!(target: "twitter_client::plugin", "{}", message);
            let result = self
                .with_timeout(self.platform.reply(&draft.post_id, &draft.text, &log))
                .await;

            match result {
                Ok(receipt) => {
                    info!("Replied to post {} with {}", draft.post_id, receipt.id);
                    self.remember_reply(&draft.post_id);
                    summary.replies_sent += 1;
                }
                Err(e) => {
                    let reply_error = TwitterApiError::reply(e.user_friendly_message());
                    error!(
                        code = %e.error_code(),
                        "Post {}: {}: {}",
                        draft.post_id,
                        reply_error,
                        e
                    );
                    summary.replies_failed += 1;
                }
            }
        }

        info!(
            "Tick finished: {} seen, {} skipped, {} sent, {} failed",
            summary.candidates_seen, summary.skipped, summary.replies_sent, summary.replies_failed
        );
        summary
    }

    /// Runs a pass unless the previous one is still in flight.
    pub async fn tick(&self) -> Option<RunSummary> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.skipped_ticks.fetch_add(1, Ordering::SeqCst);
            warn!("Previous tick still running, skipping this one");
            return None;
        }
        let _guard = InFlightGuard(&self.in_flight);

        let span = info_span!("tick", id = %Uuid::new_v4());
        Some(self.run_once(&self.search_query).instrument(span).await)
    }

    /// Fires [`tick`](Self::tick) every `interval` on its own task until `shutdown` flips.
    ///
    /// The returned task ends only after any tick still in flight has finished.
    pub fn start(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<JoinHandle<()>, CoreError> {
        if interval.is_zero() {
            return Err(CoreError::InvalidInput {
                message: "poll interval must be positive".to_string(),
            });
        }

        let this = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("Poll-reply loop started, every {:?}", interval);
            let mut ticks: Vec<JoinHandle<()>> = Vec::new();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        ticks.retain(|handle| !handle.is_finished());
                        let tick_loop = Arc::clone(&this);
                        ticks.push(tokio::spawn(async move {
                            tick_loop.tick().await;
                        }));
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Poll-reply loop stopping");
                            break;
                        }
                    }
                }
            }

            if this.is_busy() {
                info!("Waiting for the current tick to finish");
            }
            for handle in ticks {
                if let Err(e) = handle.await {
                    error!("Tick task failed: {}", e);
                }
            }
            info!("Poll-reply loop stopped");
        }))
    }
}
