//! Rate values and time units.

use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

/// A steady-state event rate, in events per second.
///
/// `Limit::ZERO` admits nothing and `Limit::INFINITE` admits everything.
/// Limits are totally ordered, so aggregates can sort their members by them.
#[derive(Debug, Clone, Copy)]
pub struct Limit(f64);

impl Limit {
    /// A limit that never produces tokens.
    pub const ZERO: Limit = Limit(0.0);
    /// A limit that is never reached.
    pub const INFINITE: Limit = Limit(f64::INFINITY);

    /// Create a limit from events per second.
    pub fn new(events_per_second: f64) -> Result<Self> {
        if events_per_second.is_nan() || events_per_second < 0.0 {
            return Err(GateError::InvalidConfiguration(format!(
                "rate must be a non-negative number, got {}",
                events_per_second
            )));
        }
        Ok(Self(events_per_second.abs()))
    }

    /// Convert a minimum interval between events into a limit.
    pub fn every(interval: Duration) -> Self {
        if interval.is_zero() {
            return Self::INFINITE;
        }
        Self(1.0 / interval.as_secs_f64())
    }

    /// `event_count` events spread evenly over `duration`.
    pub fn per(event_count: u32, duration: Duration) -> Self {
        if event_count == 0 {
            return Self::ZERO;
        }
        Self::every(duration / event_count)
    }

    /// Events per second.
    pub fn as_f64(&self) -> f64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }

    pub fn is_infinite(&self) -> bool {
        self.0.is_infinite()
    }

    /// Time needed to accumulate `tokens` at this rate.
    ///
    /// Returns `None` for a zero limit, since the tokens never arrive. Waits
    /// too long to represent saturate at `Duration::MAX`.
    pub fn duration_for(&self, tokens: f64) -> Option<Duration> {
        if self.is_zero() {
            return None;
        }
        if self.is_infinite() || tokens <= 0.0 {
            return Some(Duration::ZERO);
        }
        Some(Duration::try_from_secs_f64(tokens / self.0).unwrap_or(Duration::MAX))
    }

    /// Tokens accumulated over `elapsed` at this rate.
    pub fn tokens_for(&self, elapsed: Duration) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        if self.is_infinite() {
            return f64::INFINITY;
        }
        elapsed.as_secs_f64() * self.0
    }
}

impl PartialEq for Limit {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Limit {}

impl PartialOrd for Limit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Limit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            write!(f, "unlimited")
        } else {
            write!(f, "{}/s", self.0)
        }
    }
}

/// Time unit for configured limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    /// Get the duration of this time unit.
    pub fn duration(&self) -> Duration {
        match self {
            TimeUnit::Second => Duration::from_secs(1),
            TimeUnit::Minute => Duration::from_secs(60),
            TimeUnit::Hour => Duration::from_secs(3600),
            TimeUnit::Day => Duration::from_secs(86400),
        }
    }
}
