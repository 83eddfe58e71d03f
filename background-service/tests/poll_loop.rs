use async_trait::async_trait;
use background_service::PollReplyLoop;
use llm_interface::{LlmProvider, ReplyGenerator, GENERATION_FALLBACK};
use persona_core::{
    contains_hashtag, AgentState, CandidatePost, CoreError, LlmError, Persona, PostReceipt,
    ReplyMode, RunSummary, TwitterApiError,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use twitter_client::{PluginLogger, SocialPlatform};

const QUERY: &str = "blockchain OR crypto OR $GODL";

/// Records every call; search results and reply failures are scripted.
#[derive(Default)]
struct FakePlatform {
    posts: Vec<CandidatePost>,
    search_failures: u32,
    search_error: Option<TwitterApiError>,
    search_delay: Option<Duration>,
    failing_replies: HashSet<String>,
    searches: AtomicU32,
    replies: Mutex<Vec<(String, String)>>,
}

impl FakePlatform {
    fn with_posts(posts: Vec<CandidatePost>) -> Self {
        Self {
            posts,
            ..Default::default()
        }
    }

    fn replies(&self) -> Vec<(String, String)> {
        self.replies.lock().unwrap().clone()
    }
}

#[async_trait]
impl SocialPlatform for FakePlatform {
    async fn search(
        &self,
        _query: &str,
        log: &PluginLogger,
    ) -> Result<Vec<CandidatePost>, CoreError> {
        let n = self.searches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.search_delay {
            tokio::time::sleep(delay).await;
        }
        if n < self.search_failures {
            let error = self
                .search_error
                .clone()
                .unwrap_or(TwitterApiError::ServerError { status_code: 503 });
            return Err(error.into());
        }
        log("search done");
        Ok(self.posts.clone())
    }

    async fn reply(
        &self,
        post_id: &str,
        text: &str,
        _log: &PluginLogger,
    ) -> Result<PostReceipt, CoreError> {
        self.replies
            .lock()
            .unwrap()
            .push((post_id.to_string(), text.to_string()));
        if self.failing_replies.contains(post_id) {
            return Err(TwitterApiError::Forbidden {
                resource: format!("tweets/{}", post_id),
            }
            .into());
        }
        Ok(PostReceipt {
            id: format!("reply-{}", post_id),
            text: text.to_string(),
        })
    }

    async fn post(&self, text: &str, _log: &PluginLogger) -> Result<PostReceipt, CoreError> {
        Ok(PostReceipt {
            id: "post".to_string(),
            text: text.to_string(),
        })
    }

    async fn like(&self, _post_id: &str, _log: &PluginLogger) -> Result<(), CoreError> {
        Ok(())
    }

    async fn me(&self) -> Result<AgentState, CoreError> {
        Ok(Persona::default().initial_state)
    }
}

struct FixedProvider {
    reply: Result<String, LlmError>,
    calls: AtomicU32,
}

impl FixedProvider {
    fn answering(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            reply: Err(LlmError::ServiceUnavailable {
                provider: "fixed".to_string(),
            }),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl LlmProvider for FixedProvider {
    async fn complete(&self, _prompt: &str) -> Result<String, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(CoreError::from)
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

fn generated_loop(platform: Arc<FakePlatform>, provider: Arc<FixedProvider>) -> PollReplyLoop {
    PollReplyLoop::new(platform, Persona::default(), QUERY)
        .with_generator(Arc::new(ReplyGenerator::new(provider)))
        .with_dedup_capacity(500)
}

#[tokio::test]
async fn test_zero_candidates_sends_nothing() {
    let platform = Arc::new(FakePlatform::default());
    let poll_loop = PollReplyLoop::new(platform.clone(), Persona::default(), QUERY);

    let summary = poll_loop.run_once(QUERY).await;

    assert_eq!(summary, RunSummary::default());
    assert!(platform.replies().is_empty());
}

#[tokio::test]
async fn test_short_or_missing_text_is_never_replied_to() {
    let platform = Arc::new(FakePlatform::with_posts(vec![
        CandidatePost::new("1", None),
        CandidatePost::new("2", Some("gm")),
        CandidatePost::new("3", Some("abcd")),
        CandidatePost::new("4", Some("abcde")),
    ]));
    let poll_loop = PollReplyLoop::new(platform.clone(), Persona::default(), QUERY)
        .with_reply_mode(ReplyMode::Static);

    let summary = poll_loop.run_once(QUERY).await;

    assert_eq!(summary.candidates_seen, 4);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.replies_sent, 1);
    let replies = platform.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].0, "4");
    assert_eq!(replies[0].1, Persona::default().reply_templates[0]);
}

#[tokio::test]
async fn test_partial_failure_is_isolated() {
    let mut platform = FakePlatform::with_posts(vec![
        CandidatePost::new("1", Some("first post")),
        CandidatePost::new("2", Some("second post")),
        CandidatePost::new("3", Some("third post")),
    ]);
    platform.failing_replies.insert("2".to_string());
    let platform = Arc::new(platform);
    let poll_loop = PollReplyLoop::new(platform.clone(), Persona::default(), QUERY);

    let summary = poll_loop.run_once(QUERY).await;

    assert_eq!(summary.replies_sent, 2);
    assert_eq!(summary.replies_failed, 1);
    let ids: Vec<String> = platform.replies().into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_random_mode_uses_persona_templates() {
    let platform = Arc::new(FakePlatform::with_posts(vec![CandidatePost::new(
        "1",
        Some("GM knights!"),
    )]));
    let poll_loop = PollReplyLoop::new(platform.clone(), Persona::default(), QUERY);
    assert_eq!(poll_loop.reply_mode(), ReplyMode::Random);

    poll_loop.run_once(QUERY).await;

    let replies = platform.replies();
    assert!(Persona::default().reply_templates.contains(&replies[0].1));
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_generated_reply_has_no_hashtags() {
    let platform = Arc::new(FakePlatform::with_posts(vec![
        CandidatePost::new("1", Some("GM knights!")),
        CandidatePost::new("2", Some("hi")),
    ]));
    let provider = Arc::new(FixedProvider::answering(
        "  Huzzah, noble knight! #crypto #GODL the Ledgerverse salutes you #web3 ",
    ));
    let poll_loop = generated_loop(platform.clone(), provider.clone());

    let summary = poll_loop.run_once(QUERY).await;

    assert_eq!(summary.replies_sent, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    let replies = platform.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].0, "1");
    assert!(!contains_hashtag(&replies[0].1));
    assert!(!replies[0].1.contains('#'));
    assert!(replies[0].1.starts_with("Huzzah, noble knight!"));
}

#[tokio::test(start_paused = true)]
async fn test_generation_failure_replies_with_fallback() {
    let platform = Arc::new(FakePlatform::with_posts(vec![CandidatePost::new(
        "1",
        Some("GM knights!"),
    )]));
    let provider = Arc::new(FixedProvider::failing());
    let poll_loop = generated_loop(platform.clone(), provider.clone());

    let summary = poll_loop.run_once(QUERY).await;

    assert_eq!(summary.replies_sent, 1);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    assert_eq!(platform.replies()[0].1, GENERATION_FALLBACK);
}

#[tokio::test(start_paused = true)]
async fn test_hashtag_only_completion_is_skipped() {
    let platform = Arc::new(FakePlatform::with_posts(vec![CandidatePost::new(
        "1",
        Some("GM knights!"),
    )]));
    let provider = Arc::new(FixedProvider::answering("#crypto #GODL"));
    let poll_loop = generated_loop(platform.clone(), provider);

    let summary = poll_loop.run_once(QUERY).await;

    assert_eq!(summary.skipped, 1);
    assert!(platform.replies().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_search_failure_is_retried_then_recovered() {
    let mut platform = FakePlatform::with_posts(vec![CandidatePost::new("1", Some("GM knights!"))]);
    platform.search_failures = 2;
    let platform = Arc::new(platform);
    let poll_loop = PollReplyLoop::new(platform.clone(), Persona::default(), QUERY);

    let summary = poll_loop.run_once(QUERY).await;

    assert!(!summary.search_failed);
    assert_eq!(platform.searches.load(Ordering::SeqCst), 3);
    assert_eq!(summary.replies_sent, 1);
}

#[tokio::test(start_paused = true)]
async fn test_search_failure_ends_tick_quietly() {
    let mut platform = FakePlatform::with_posts(vec![CandidatePost::new("1", Some("GM knights!"))]);
    platform.search_failures = u32::MAX;
    let platform = Arc::new(platform);
    let poll_loop = PollReplyLoop::new(platform.clone(), Persona::default(), QUERY);

    let summary = poll_loop.run_once(QUERY).await;

    assert!(summary.search_failed);
    assert_eq!(summary.candidates_seen, 0);
    assert_eq!(platform.searches.load(Ordering::SeqCst), 3);
    assert!(platform.replies().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_forbidden_search_is_retried_before_giving_up() {
    let mut platform = FakePlatform::with_posts(vec![CandidatePost::new("1", Some("GM knights!"))]);
    platform.search_failures = u32::MAX;
    platform.search_error = Some(TwitterApiError::Forbidden {
        resource: "tweets/search/recent".to_string(),
    });
    let platform = Arc::new(platform);
    let poll_loop = PollReplyLoop::new(platform.clone(), Persona::default(), QUERY);

    let summary = poll_loop.run_once(QUERY).await;

    assert!(summary.search_failed);
    assert_eq!(platform.searches.load(Ordering::SeqCst), 3);
    assert!(platform.replies().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stuck_search_times_out() {
    let mut platform = FakePlatform::with_posts(vec![CandidatePost::new("1", Some("GM knights!"))]);
    platform.search_delay = Some(Duration::from_secs(3600));
    let platform = Arc::new(platform);
    let poll_loop = PollReplyLoop::new(platform.clone(), Persona::default(), QUERY)
        .with_call_timeout(Duration::from_secs(30));

    let start = tokio::time::Instant::now();
    let summary = poll_loop.run_once(QUERY).await;

    assert!(summary.search_failed);
    assert!(start.elapsed() < Duration::from_secs(3600));
    assert!(platform.replies().is_empty());
}

#[tokio::test]
async fn test_replied_posts_are_not_answered_twice() {
    let platform = Arc::new(FakePlatform::with_posts(vec![CandidatePost::new(
        "1",
        Some("GM knights!"),
    )]));
    let poll_loop = PollReplyLoop::new(platform.clone(), Persona::default(), QUERY)
        .with_dedup_capacity(10);

    let first = poll_loop.run_once(QUERY).await;
    let second = poll_loop.run_once(QUERY).await;

    assert_eq!(first.replies_sent, 1);
    assert_eq!(second.replies_sent, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(platform.replies().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_tick_is_skipped() {
    let mut platform = FakePlatform::with_posts(vec![CandidatePost::new("1", Some("GM knights!"))]);
    platform.search_delay = Some(Duration::from_secs(10));
    let platform = Arc::new(platform);
    let poll_loop = PollReplyLoop::new(platform.clone(), Persona::default(), QUERY);

    let (first, second) = tokio::join!(poll_loop.tick(), poll_loop.tick());

    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(platform.searches.load(Ordering::SeqCst), 1);
    assert_eq!(platform.replies().len(), 1);
    assert_eq!(poll_loop.skipped_ticks(), 1);
    assert!(!poll_loop.is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_skips_ticks_while_busy() {
    let mut platform = FakePlatform::with_posts(vec![CandidatePost::new("1", Some("GM knights!"))]);
    platform.search_delay = Some(Duration::from_secs(25));
    let platform = Arc::new(platform);
    let poll_loop = Arc::new(
        PollReplyLoop::new(platform.clone(), Persona::default(), QUERY)
            .with_call_timeout(Duration::from_secs(60)),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = poll_loop
        .start(Duration::from_secs(10), shutdown_rx)
        .unwrap();

    // Ticks at 0s and 30s run; those at 10s and 20s find the first still searching.
    tokio::time::sleep(Duration::from_secs(35)).await;

    assert_eq!(platform.searches.load(Ordering::SeqCst), 2);
    assert_eq!(poll_loop.skipped_ticks(), 2);
    assert_eq!(platform.replies().len(), 1);

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_lets_in_flight_tick_finish() {
    let mut platform = FakePlatform::with_posts(vec![CandidatePost::new("1", Some("GM knights!"))]);
    platform.search_delay = Some(Duration::from_secs(20));
    let platform = Arc::new(platform);
    let poll_loop = Arc::new(
        PollReplyLoop::new(platform.clone(), Persona::default(), QUERY)
            .with_call_timeout(Duration::from_secs(60)),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let start = tokio::time::Instant::now();

    let handle = poll_loop
        .start(Duration::from_secs(300), shutdown_rx)
        .unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(poll_loop.is_busy());
    assert!(platform.replies().is_empty());

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();

    assert!(start.elapsed() >= Duration::from_secs(20));
    assert!(!poll_loop.is_busy());
    assert_eq!(platform.searches.load(Ordering::SeqCst), 1);
    assert_eq!(platform.replies().len(), 1);
}

#[tokio::test]
async fn test_start_rejects_zero_interval() {
    let poll_loop = Arc::new(PollReplyLoop::new(
        Arc::new(FakePlatform::default()),
        Persona::default(),
        QUERY,
    ));
    let (_tx, rx) = watch::channel(false);

    let err = poll_loop.start(Duration::ZERO, rx).unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput { .. }));
}
