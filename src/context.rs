//! Cancellation and deadline context for limiter waits.
//!
//! Every wait takes a [`WaitContext`]. A context is done once it (or any of
//! its ancestors) is cancelled, or once its deadline passes. Child contexts
//! inherit the parent's cancellation and the earlier of the two deadlines;
//! cancelling a child leaves the parent untouched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::select_all;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::GateError;

#[derive(Debug, Default)]
struct Signal {
    cancelled: AtomicBool,
    notify: Notify,
}

impl Signal {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A cancellation handle plus an optional deadline.
///
/// Clones share the same cancellation state.
#[derive(Debug, Clone)]
pub struct WaitContext {
    /// Ancestor signals first, own signal last
    signals: Vec<Arc<Signal>>,
    deadline: Option<Instant>,
}

impl WaitContext {
    /// Create a root context with no deadline.
    pub fn new() -> Self {
        Self {
            signals: vec![Arc::new(Signal::default())],
            deadline: None,
        }
    }

    /// Create a child context that can be cancelled independently.
    pub fn child(&self) -> Self {
        let mut signals = self.signals.clone();
        signals.push(Arc::new(Signal::default()));
        Self {
            signals,
            deadline: self.deadline,
        }
    }

    /// Create a child context that is done at `deadline` at the latest.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut child = self.child();
        child.deadline = Some(match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        });
        child
    }

    /// Create a child context that is done after `timeout` at the latest.
    ///
    /// A timeout too far out to represent adds no deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.child(),
        }
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        if let Some(own) = self.signals.last() {
            own.cancel();
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.signals.iter().any(|s| s.is_cancelled())
    }

    /// The reason this context is done, or `None` while it is still live.
    ///
    /// Cancellation wins over an elapsed deadline.
    pub fn err(&self) -> Option<GateError> {
        if self.is_cancelled() {
            return Some(GateError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(GateError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolve once the context is done, yielding the reason.
    pub async fn done(&self) -> GateError {
        let mut waiters: Vec<_> = self
            .signals
            .iter()
            .map(|s| Box::pin(s.notify.notified()))
            .collect();
        // Register before checking the flags so a concurrent cancel is not missed.
        for waiter in waiters.iter_mut() {
            waiter.as_mut().enable();
        }
        if let Some(err) = self.err() {
            return err;
        }

        let cancelled = select_all(waiters);
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = cancelled => GateError::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => {
                        self.err().unwrap_or(GateError::DeadlineExceeded)
                    }
                }
            }
            None => {
                cancelled.await;
                GateError::Cancelled
            }
        }
    }
}

impl Default for WaitContext {
    fn default() -> Self {
        Self::new()
    }
}
