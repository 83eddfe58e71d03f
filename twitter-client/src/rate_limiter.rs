use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
    pub burst_allowance: u32,
}

impl RateLimitConfig {
    pub fn x_api() -> Self {
        Self {
            max_requests: 50, // Conservative per-user budget for the v2 write endpoints
            time_window: Duration::from_secs(15 * 60), // X rate limits use 15 minute windows
            burst_allowance: 5,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
    /// Set when the server told us to back off.
    blocked_until: Option<Instant>,
}

#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_rate: f64, // tokens per second
}

impl TokenBucket {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = config.burst_allowance.max(1) as f64;
        let refill_rate = config.max_requests as f64 / config.time_window.as_secs_f64();

        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
                blocked_until: None,
            }),
            capacity,
            refill_rate,
        }
    }

    /// Takes a token, or reports how long to wait for one.
    pub async fn try_acquire(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut state = self.state.lock().await;

        if let Some(until) = state.blocked_until {
            if until > now {
                return Err(until - now);
            }
            state.blocked_until = None;
        }

        let elapsed = now.duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - state.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_rate))
        }
    }

    pub async fn block_for(&self, duration: Duration) {
        let mut state = self.state.lock().await;
        state.blocked_until = Some(Instant::now() + duration);
        state.tokens = 0.0;
    }

    pub async fn available_tokens(&self) -> f64 {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let elapsed = now.duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_refill = now;
        state.tokens
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitStatus {
    pub available_tokens: f64,
    pub max_tokens: u32,
    pub requests_per_window: u32,
    pub time_window: Duration,
}

#[derive(Debug)]
pub struct RateLimiter {
    token_bucket: TokenBucket,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            token_bucket: TokenBucket::new(&config),
            config,
        }
    }

    /// Waits until a request may be sent.
    pub async fn acquire(&self) {
        loop {
            match self.token_bucket.try_acquire().await {
                Ok(()) => return,
                Err(wait_time) => {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    sleep(wait_time).await;
                }
            }
        }
    }

    /// Honors a server-side 429 for every caller sharing this limiter.
    pub async fn back_off(&self, duration: Duration) {
        tracing::warn!("Backing off X API requests for {:?}", duration);
        self.token_bucket.block_for(duration).await;
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        RateLimitStatus {
            available_tokens: self.token_bucket.available_tokens().await,
            max_tokens: self.config.burst_allowance,
            requests_per_window: self.config.max_requests,
            time_window: self.config.time_window,
        }
    }
}
