//! Token bucket limiter implementation.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::backend::RateLimiter;
use super::rate::Limit;
use crate::context::WaitContext;
use crate::error::{GateError, Result};

/// Shortest suspension between retries, so a rounding shortfall never spins.
const MIN_SLEEP: Duration = Duration::from_nanos(1);

/// Mutable bucket state, always read and updated as a unit.
#[derive(Debug)]
struct BucketState {
    /// Tokens currently in the bucket
    tokens: f64,
    /// When tokens were last added
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, now: Instant, limit: Limit, burst: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + limit.tokens_for(elapsed)).min(burst);
        self.last_refill = now;
    }
}

/// A limiter admitting events at a sustained rate with a bounded burst.
///
/// The bucket starts full unless the limit is zero. This struct is
/// thread-safe and is meant to be shared behind an `Arc` by every caller
/// subject to the same quota.
#[derive(Debug)]
pub struct TokenBucket {
    limit: Limit,
    burst: u32,
    /// Name used in log fields
    name: Option<String>,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a new token bucket.
    pub fn new(limit: Limit, burst: u32) -> Result<Self> {
        if burst == 0 {
            return Err(GateError::InvalidConfiguration(
                "burst must be at least 1".to_string(),
            ));
        }
        // A closed limiter never holds a token, not even initially.
        let tokens = if limit.is_zero() { 0.0 } else { burst as f64 };
        Ok(Self {
            limit,
            burst,
            name: None,
            state: Mutex::new(BucketState {
                tokens,
                last_refill: Instant::now(),
            }),
        })
    }

    /// Attach a name for logging.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("bucket")
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Current token count after refilling to now.
    pub fn tokens(&self) -> f64 {
        let mut state = self.state.lock();
        state.refill(Instant::now(), self.limit, self.burst as f64);
        state.tokens
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.reserve().is_ok()
    }

    /// Refill, then consume a token if one exists.
    ///
    /// On shortfall returns the time until the next token, or `None` if the
    /// bucket never refills.
    fn reserve(&self) -> std::result::Result<(), Option<Duration>> {
        if self.limit.is_infinite() {
            return Ok(());
        }

        let mut state = self.state.lock();
        state.refill(Instant::now(), self.limit, self.burst as f64);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return Ok(());
        }
        Err(self.limit.duration_for(1.0 - state.tokens))
    }
}

#[async_trait]
impl RateLimiter for TokenBucket {
    async fn wait(&self, ctx: &WaitContext) -> Result<()> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        loop {
            let delay = match self.reserve() {
                Ok(()) => {
                    trace!(limiter = %self.name(), "Admitted");
                    return Ok(());
                }
                Err(delay) => delay,
            };

            match delay {
                Some(delay) => {
                    let delay = delay.max(MIN_SLEEP);
                    debug!(
                        limiter = %self.name(),
                        delay_ms = delay.as_secs_f64() * 1000.0,
                        "Waiting for token"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        err = ctx.done() => {
                            debug!(limiter = %self.name(), error = %err, "Wait aborted");
                            return Err(err);
                        }
                    }
                }
                None => {
                    debug!(limiter = %self.name(), "Closed limiter, waiting for context");
                    return Err(ctx.done().await);
                }
            }
        }
    }

    fn limit(&self) -> Limit {
        self.limit
    }
}
