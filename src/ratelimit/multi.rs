//! Aggregate limiter enforcing several constraints at once.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use super::backend::RateLimiter;
use super::rate::Limit;
use crate::context::WaitContext;
use crate::error::{GateError, Result};

/// A limiter that admits an event only once every member has admitted it.
///
/// Members are kept sorted ascending by `limit()`, so the scarcest constraint
/// is waited on first and looser members are not drained while it blocks.
/// Tokens already taken from earlier members are not returned when a later
/// member fails.
pub struct MultiLimiter {
    members: Vec<Arc<dyn RateLimiter>>,
}

impl MultiLimiter {
    /// Create an aggregate over `limiters`, in any order.
    pub fn new(mut limiters: Vec<Arc<dyn RateLimiter>>) -> Result<Self> {
        if limiters.is_empty() {
            return Err(GateError::InvalidConfiguration(
                "a multi-limiter needs at least one member".to_string(),
            ));
        }
        limiters.sort_by_key(|l| l.limit());
        Ok(Self { members: limiters })
    }

    /// Member limits in evaluation order.
    pub fn limits(&self) -> Vec<Limit> {
        self.members.iter().map(|m| m.limit()).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl std::fmt::Debug for MultiLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiLimiter")
            .field("limits", &self.limits())
            .finish()
    }
}

#[async_trait]
impl RateLimiter for MultiLimiter {
    async fn wait(&self, ctx: &WaitContext) -> Result<()> {
        for (index, member) in self.members.iter().enumerate() {
            member.wait(ctx).await?;
            trace!(member = index, limit = %member.limit(), "Member admitted");
        }
        Ok(())
    }

    fn limit(&self) -> Limit {
        self.members[0].limit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::TokenBucket;
    use std::time::Duration;
    use tokio::time::Instant;

    fn bucket(rate: f64, burst: u32) -> Arc<TokenBucket> {
        Arc::new(TokenBucket::new(Limit::new(rate).unwrap(), burst).unwrap())
    }

    fn cancel_after(ctx: &WaitContext, after: Duration) {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            ctx.cancel();
        });
    }

    #[test]
    fn test_empty_rejected() {
        let result = MultiLimiter::new(Vec::new());
        assert!(matches!(result, Err(GateError::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn test_limit_is_minimum_in_any_order() {
        let a = bucket(5.0, 1);
        let b = bucket(0.5, 1);
        let c = bucket(2.0, 1);

        let orders: Vec<Vec<Arc<dyn RateLimiter>>> = vec![
            vec![a.clone() as Arc<dyn RateLimiter>, b.clone(), c.clone()],
            vec![c.clone() as Arc<dyn RateLimiter>, a.clone(), b.clone()],
            vec![b.clone() as Arc<dyn RateLimiter>, c.clone(), a.clone()],
        ];

        for members in orders {
            let multi = MultiLimiter::new(members).unwrap();
            assert_eq!(multi.limit(), Limit::new(0.5).unwrap());
            assert_eq!(
                multi.limits(),
                vec![
                    Limit::new(0.5).unwrap(),
                    Limit::new(2.0).unwrap(),
                    Limit::new(5.0).unwrap(),
                ]
            );
        }
    }

    #[tokio::test]
    async fn test_nested_limit_reflects_bottleneck() {
        let inner = MultiLimiter::new(vec![
            bucket(2.0, 2) as Arc<dyn RateLimiter>,
            bucket(10.0 / 60.0, 10),
        ])
        .unwrap();
        let inner: Arc<dyn RateLimiter> = Arc::new(inner);

        let outer = MultiLimiter::new(vec![
            bucket(1.0, 1) as Arc<dyn RateLimiter>,
            inner,
        ])
        .unwrap();
        assert_eq!(outer.limit(), Limit::new(10.0 / 60.0).unwrap());
        assert_eq!(outer.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_members_consumed_on_success() {
        let fast = bucket(10.0, 3);
        let slow = bucket(1.0, 2);
        let multi = MultiLimiter::new(vec![
            fast.clone() as Arc<dyn RateLimiter>,
            slow.clone(),
        ])
        .unwrap();

        multi.wait(&WaitContext::new()).await.unwrap();

        assert_eq!(fast.tokens(), 2.0);
        assert_eq!(slow.tokens(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_strict_member_blocking_leaves_loose_untouched() {
        let strict = bucket(0.5, 1);
        let loose = bucket(10.0, 5);
        let multi = MultiLimiter::new(vec![
            loose.clone() as Arc<dyn RateLimiter>,
            strict.clone(),
        ])
        .unwrap();
        assert!(strict.try_acquire());

        let ctx = WaitContext::new();
        cancel_after(&ctx, Duration::from_millis(100));

        let result = multi.wait(&ctx).await;
        assert!(matches!(result, Err(GateError::Cancelled)));
        assert_eq!(loose.tokens(), 5.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_on_slow_member_keeps_first_call_consumption() {
        let fast = bucket(1.0, 1);
        let slow = bucket(0.01, 1);
        let multi = MultiLimiter::new(vec![
            fast.clone() as Arc<dyn RateLimiter>,
            slow.clone(),
        ])
        .unwrap();

        let start = Instant::now();
        multi.wait(&WaitContext::new()).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);

        let ctx = WaitContext::new();
        cancel_after(&ctx, Duration::from_millis(10));
        let result = multi.wait(&ctx).await;

        assert!(matches!(result, Err(GateError::Cancelled)));
        // Only refill since the first call, no token handed back
        assert!(fast.tokens() < 0.5);
        assert!(slow.tokens() < 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_rollback_when_later_member_fails() {
        let strict = bucket(1.0, 1);
        let loose = bucket(2.0, 1);
        let multi = MultiLimiter::new(vec![
            loose.clone() as Arc<dyn RateLimiter>,
            strict.clone(),
        ])
        .unwrap();
        assert!(loose.try_acquire());

        let ctx = WaitContext::new();
        cancel_after(&ctx, Duration::from_millis(10));
        let result = multi.wait(&ctx).await;

        assert!(matches!(result, Err(GateError::Cancelled)));
        // Strict member admitted before the loose one blocked
        assert!(strict.tokens() < 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_aggregate_of_three() {
        let first = bucket(0.1, 1);
        let second = bucket(0.5, 1);
        let third = bucket(10.0, 3);
        let multi = MultiLimiter::new(vec![
            third.clone() as Arc<dyn RateLimiter>,
            first.clone(),
            second.clone(),
        ])
        .unwrap();
        assert_eq!(
            multi.limits(),
            vec![first.limit(), second.limit(), third.limit()]
        );
        assert!(second.try_acquire());

        let ctx = WaitContext::new();
        cancel_after(&ctx, Duration::from_millis(10));
        let result = multi.wait(&ctx).await;

        assert!(matches!(result, Err(GateError::Cancelled)));
        // First member's token stays spent, third member never reached
        assert!(first.tokens() < 0.5);
        assert!(second.tokens() < 0.5);
        assert_eq!(third.tokens(), 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_propagates_unchanged() {
        let multi = MultiLimiter::new(vec![
            bucket(1.0, 1) as Arc<dyn RateLimiter>,
            bucket(0.1, 1),
        ])
        .unwrap();
        multi.wait(&WaitContext::new()).await.unwrap();

        let ctx = WaitContext::new().with_timeout(Duration::from_millis(50));
        let result = multi.wait(&ctx).await;
        assert!(matches!(result, Err(GateError::DeadlineExceeded)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_bottleneck_rate() {
        let multi = MultiLimiter::new(vec![
            bucket(100.0, 1) as Arc<dyn RateLimiter>,
            bucket(2.0, 1),
        ])
        .unwrap();
        let ctx = WaitContext::new();

        let start = Instant::now();
        for _ in 0..3 {
            multi.wait(&ctx).await.unwrap();
        }
        // First call uses the full buckets, the next two wait 1/2s each
        assert!(start.elapsed() >= Duration::from_millis(999));
    }
}
