//! Rate limiter trait shared by single buckets and aggregates.

use async_trait::async_trait;

use super::rate::Limit;
use crate::context::WaitContext;
use crate::error::Result;

/// Trait for rate limiter implementations.
///
/// This trait abstracts over a single `TokenBucket` and a composed
/// `MultiLimiter`, so an aggregate can hold either as a member.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait until the limiter admits one event.
    ///
    /// Fails with `Cancelled` or `DeadlineExceeded` when `ctx` is done first.
    async fn wait(&self, ctx: &WaitContext) -> Result<()>;

    /// The steady-state rate this limiter enforces.
    fn limit(&self) -> Limit;
}
