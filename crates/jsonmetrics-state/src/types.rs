//! Values held and returned by the state engine.

use chrono::{DateTime, Utc};

/// The published reading of one metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of [`MetricState::update`](crate::MetricState::update).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The sample replaced the published one.
    Published,
    /// The timestamp was not newer than the published one; nothing was
    /// published (debounce bookkeeping may still have run).
    Stale,
}

/// A held-back value change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DebounceWindow {
    /// Value reported while the window is open.
    pub value: String,
    /// The window is open while `now < until`.
    pub until: DateTime<Utc>,
    /// When the change that opened the window was observed.
    pub sampled_at: DateTime<Utc>,
}

impl DebounceWindow {
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        now < self.until
    }

    pub fn as_sample(&self) -> Sample {
        Sample {
            value: self.value.clone(),
            timestamp: self.sampled_at,
        }
    }
}
