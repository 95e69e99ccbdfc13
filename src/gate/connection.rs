//! Resource gate binding named operations to composed limiters.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::rules::{GateConfig, READ_FILE, RESOLVE_ADDRESS};
use crate::context::WaitContext;
use crate::error::{GateError, Result};
use crate::ratelimit::{MultiLimiter, RateLimiter};

/// A facade enforcing every applicable quota for each operation.
///
/// Category limiters are built once and shared between operations, so a
/// quota drawn on by several operations is a single bucket. The gate holds
/// no other state and can be shared across tasks behind an `Arc`.
pub struct ResourceGate {
    /// Category limiters indexed by name
    categories: BTreeMap<String, Arc<dyn RateLimiter>>,
    /// Per-operation aggregates over shared category limiters
    operations: HashMap<String, MultiLimiter>,
}

impl ResourceGate {
    /// Build the category limiters and operation aggregates from `config`.
    pub fn open(config: &GateConfig) -> Result<Self> {
        config.validate()?;

        let mut categories: BTreeMap<String, Arc<dyn RateLimiter>> = BTreeMap::new();
        for (name, category) in &config.categories {
            let mut buckets: Vec<Arc<dyn RateLimiter>> = Vec::with_capacity(category.limits.len());
            for rule in &category.limits {
                buckets.push(Arc::new(rule.build(name)?));
            }

            let limiter: Arc<dyn RateLimiter> = if buckets.len() == 1 {
                buckets.remove(0)
            } else {
                Arc::new(MultiLimiter::new(buckets)?)
            };
            debug!(category = %name, limit = %limiter.limit(), "Category limiter created");
            categories.insert(name.clone(), limiter);
        }

        let mut operations = HashMap::with_capacity(config.operations.len());
        for (operation, names) in &config.operations {
            let members = names
                .iter()
                .filter_map(|name| categories.get(name).cloned())
                .collect();
            let limiter = MultiLimiter::new(members)?;
            debug!(
                operation = %operation,
                limit = %limiter.limit(),
                "Operation limiter assembled"
            );
            operations.insert(operation.clone(), limiter);
        }

        info!(
            categories = categories.len(),
            operations = operations.len(),
            "Resource gate opened"
        );
        Ok(Self {
            categories,
            operations,
        })
    }

    /// Wait until `operation` is admitted by every quota it draws from.
    #[instrument(skip(self, ctx))]
    pub async fn wait(&self, operation: &str, ctx: &WaitContext) -> Result<()> {
        let limiter = self
            .operations
            .get(operation)
            .ok_or_else(|| GateError::UnknownOperation(operation.to_string()))?;
        limiter.wait(ctx).await
    }

    /// Run `work` once `operation` has been admitted.
    ///
    /// On a failed wait the error is returned and `work` never runs.
    pub async fn perform<F, Fut, T>(
        &self,
        operation: &str,
        ctx: &WaitContext,
        work: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.wait(operation, ctx).await?;
        Ok(work().await)
    }

    /// Admit one file read.
    pub async fn read_file(&self, ctx: &WaitContext) -> Result<()> {
        self.perform(READ_FILE, ctx, || async {}).await
    }

    /// Admit one address resolution.
    pub async fn resolve_address(&self, ctx: &WaitContext) -> Result<()> {
        self.perform(RESOLVE_ADDRESS, ctx, || async {}).await
    }

    /// The shared limiter for a quota category.
    pub fn category(&self, name: &str) -> Option<Arc<dyn RateLimiter>> {
        self.categories.get(name).cloned()
    }

    /// The composed limiter for an operation.
    pub fn operation(&self, name: &str) -> Option<&MultiLimiter> {
        self.operations.get(name)
    }

    pub fn operation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ResourceGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGate")
            .field("categories", &self.categories.keys().collect::<Vec<_>>())
            .field("operations", &self.operations)
            .finish()
    }
}
