//! MetricState — latest sample per metric, with ordering and debounce.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::types::{DebounceWindow, Sample, UpdateOutcome};

#[derive(Debug, Default)]
struct Inner {
    /// Published samples: metric name → latest accepted sample.
    samples: HashMap<String, Sample>,
    /// Pending suppressions: metric name → debounce window.
    windows: HashMap<String, DebounceWindow>,
}

/// Thread-safe metric state shared by the ingestion task and scrape handlers.
#[derive(Debug, Clone)]
pub struct MetricState {
    inner: Arc<RwLock<Inner>>,
    clock: Arc<dyn Clock>,
}

impl Default for MetricState {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricState {
    /// Create an empty state on the wall clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Create an empty state reading "now" from `clock`.
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            clock: Arc::new(clock),
        }
    }

    /// Record a reading for `name`.
    ///
    /// A missing `timestamp` means "now". When `debounce` is set and the
    /// value differs from the published one (or nothing is published yet),
    /// a new window opens unless one is still running at `timestamp`.
    /// Independently, the reading is published only if `timestamp` is
    /// strictly after the published timestamp.
    pub fn update(
        &self,
        name: &str,
        value: &str,
        debounce: Option<Duration>,
        timestamp: Option<DateTime<Utc>>,
    ) -> UpdateOutcome {
        let timestamp = timestamp.unwrap_or_else(|| self.clock.now());

        let mut inner = self.inner.write().expect("state lock");
        let Inner { samples, windows } = &mut *inner;
        let published = samples.get(name);

        if let Some(debounce) = debounce {
            let changed = published.is_none_or(|sample| sample.value != value);
            let window_free = windows
                .get(name)
                .is_none_or(|window| window.until < timestamp);
            if changed && window_free {
                let until = expiry(timestamp, debounce);
                debug!(metric = name, value, %until, "debounce window opened");
                windows.insert(
                    name.to_string(),
                    DebounceWindow {
                        value: value.to_string(),
                        until,
                        sampled_at: timestamp,
                    },
                );
            }
        }

        if published.is_none_or(|sample| timestamp > sample.timestamp) {
            samples.insert(
                name.to_string(),
                Sample {
                    value: value.to_string(),
                    timestamp,
                },
            );
            debug!(metric = name, value, %timestamp, "updated");
            UpdateOutcome::Published
        } else {
            trace!(metric = name, value, %timestamp, "stale update dropped");
            UpdateOutcome::Stale
        }
    }

    /// Current reading for `name`, or `None` if it was never updated.
    ///
    /// While a debounce window is open the window's value is returned,
    /// stamped with the time the window opened. Published state is not
    /// touched.
    pub fn get(&self, name: &str) -> Option<Sample> {
        let now = self.clock.now();
        let inner = self.inner.read().expect("state lock");
        if let Some(window) = inner.windows.get(name).filter(|w| w.is_open_at(now)) {
            trace!(metric = name, value = %window.value, until = %window.until, "debouncing");
            return Some(window.as_sample());
        }
        inner.samples.get(name).cloned()
    }

    /// Number of metrics with a published sample.
    pub fn len(&self) -> usize {
        self.inner.read().expect("state lock").samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `start + debounce`, saturating at the largest representable instant.
fn expiry(start: DateTime<Utc>, debounce: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(debounce)
        .ok()
        .and_then(|delta| start.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
