//! Ingestion loop — newline-delimited JSON in, state updates out.
//!
//! Every line is decoded once and offered to every metric definition.
//! A bad line or a failed extraction only skips that line or that
//! metric; nothing here is retried or fatal.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error, info, warn};

use jsonmetrics_core::{ExtractError, MetricsConfig};
use jsonmetrics_state::{MetricState, UpdateOutcome};

/// Ingestion switches supplied by the process entry point.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    /// Log every input line at info level.
    pub log_input: bool,
}

/// Counters for one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Non-blank lines read.
    pub lines: u64,
    /// Lines that were not valid UTF-8 JSON.
    pub malformed: u64,
    /// Metric extractions that failed.
    pub failures: u64,
    /// Updates that replaced the published sample.
    pub published: u64,
    /// Updates dropped as stale.
    pub stale: u64,
}

/// Feeds decoded records through the metric definitions into the state.
pub struct Ingestor {
    config: Arc<MetricsConfig>,
    state: MetricState,
    options: IngestOptions,
}

impl Ingestor {
    pub fn new(config: Arc<MetricsConfig>, state: MetricState, options: IngestOptions) -> Self {
        Self {
            config,
            state,
            options,
        }
    }

    /// Read lines until EOF or a read error, then return the counters.
    pub async fn run<R>(&self, mut reader: R) -> IngestStats
    where
        R: AsyncBufRead + Unpin,
    {
        let mut stats = IngestStats::default();
        let mut buf = Vec::new();
        info!("reading input");

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => match std::str::from_utf8(&buf) {
                    Ok(line) => self.process_line(line, &mut stats),
                    Err(e) => {
                        stats.lines += 1;
                        stats.malformed += 1;
                        warn!(error = %e, "input line is not valid UTF-8");
                    }
                },
                Err(e) => {
                    error!(error = %e, "reading input failed");
                    break;
                }
            }
        }

        info!(
            lines = stats.lines,
            malformed = stats.malformed,
            failures = stats.failures,
            published = stats.published,
            stale = stats.stale,
            "input closed"
        );
        stats
    }

    /// Decode one line and process it. Blank lines are ignored.
    pub fn process_line(&self, line: &str, stats: &mut IngestStats) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        stats.lines += 1;
        if self.options.log_input {
            info!(line, "input");
        }

        let record: Value = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                stats.malformed += 1;
                warn!(error = %e, "cannot decode JSON");
                return;
            }
        };
        self.process_record(&record, stats);
    }

    /// Offer a decoded record to every metric definition.
    pub fn process_record(&self, record: &Value, stats: &mut IngestStats) {
        for def in self.config.definitions() {
            let extraction = match def.extract(record) {
                Ok(Some(extraction)) => extraction,
                Ok(None) => continue,
                // Records of other kinds routinely lack the source field.
                Err(e @ ExtractError::Source(_)) => {
                    stats.failures += 1;
                    debug!(metric = def.name(), error = %e, "skipping metric");
                    continue;
                }
                Err(e) => {
                    stats.failures += 1;
                    warn!(metric = def.name(), error = %e, "skipping metric");
                    continue;
                }
            };

            let outcome = self.state.update(
                def.render_name(),
                &extraction.value,
                def.debounce(),
                extraction.timestamp,
            );
            match outcome {
                UpdateOutcome::Published => stats.published += 1,
                UpdateOutcome::Stale => stats.stale += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use jsonmetrics_state::ManualClock;
    use std::time::Duration;

    const CONFIG: &str = r#"
[metric.svc]
source = "health"
sourcepath = ".kind"
valuepath = ".status"
timestamppath = ".at"
timestampformat = "unix_ms"
rendername = "service_up"

[metric.latency]
source = "health"
sourcepath = ".kind"
valuepath = ".latency_ms"

[metric.disk]
source = "disk"
sourcepath = ".kind"
valuepath = ".free"
debounce = "10s"
"#;

    fn ingestor() -> (Ingestor, MetricState, ManualClock) {
        let config: MetricsConfig = CONFIG.parse().unwrap();
        let clock = ManualClock::new(DateTime::from_timestamp_millis(5_000).unwrap());
        let state = MetricState::with_clock(clock.clone());
        let ingestor = Ingestor::new(Arc::new(config), state.clone(), IngestOptions::default());
        (ingestor, state, clock)
    }

    fn value(state: &MetricState, name: &str) -> Option<String> {
        state.get(name).map(|s| s.value)
    }

    #[test]
    fn updates_every_matching_metric() {
        let (ingestor, state, _) = ingestor();
        let mut stats = IngestStats::default();
        ingestor.process_line(
            r#"{"kind": "health", "status": 1, "at": 1000, "latency_ms": 12.5}"#,
            &mut stats,
        );

        let svc = state.get("service_up").unwrap();
        assert_eq!(svc.value, "1");
        assert_eq!(svc.timestamp.timestamp_millis(), 1_000);
        assert_eq!(value(&state, "latency").as_deref(), Some("12.5"));
        assert_eq!(value(&state, "disk"), None);
        assert_eq!(stats.published, 2);
    }

    #[test]
    fn state_is_keyed_by_render_name() {
        let (ingestor, state, _) = ingestor();
        let mut stats = IngestStats::default();
        ingestor.process_line(r#"{"kind": "health", "status": 1, "at": 1000}"#, &mut stats);
        assert!(state.get("service_up").is_some());
        assert!(state.get("svc").is_none());
    }

    #[test]
    fn failed_extraction_does_not_block_other_metrics() {
        let (ingestor, state, _) = ingestor();
        let mut stats = IngestStats::default();
        // `svc` has a bad timestamp, `latency` is fine.
        ingestor.process_line(
            r#"{"kind": "health", "status": 1, "at": "later", "latency_ms": 7}"#,
            &mut stats,
        );

        assert_eq!(value(&state, "service_up"), None);
        assert_eq!(value(&state, "latency").as_deref(), Some("7"));
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.published, 1);
    }

    #[test]
    fn malformed_line_is_skipped() {
        let (ingestor, state, _) = ingestor();
        let mut stats = IngestStats::default();
        ingestor.process_line("{not json", &mut stats);
        ingestor.process_line(r#"{"kind": "disk", "free": 42}"#, &mut stats);

        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.lines, 2);
        assert_eq!(value(&state, "disk").as_deref(), Some("42"));
    }

    #[test]
    fn other_sources_are_ignored() {
        let (ingestor, state, _) = ingestor();
        let mut stats = IngestStats::default();
        ingestor.process_line(r#"{"kind": "network", "status": 1, "free": 3}"#, &mut stats);
        assert!(state.is_empty());
        assert_eq!(stats.failures, 0);
    }

    #[test]
    fn record_without_source_counts_as_failure() {
        let (ingestor, state, _) = ingestor();
        let mut stats = IngestStats::default();
        ingestor.process_line(r#"{"status": 1}"#, &mut stats);
        assert!(state.is_empty());
        assert_eq!(stats.failures, 3);
    }

    #[test]
    fn stale_record_timestamps_are_dropped() {
        let (ingestor, state, _) = ingestor();
        let mut stats = IngestStats::default();
        ingestor.process_line(r#"{"kind": "health", "status": 1, "at": 2000}"#, &mut stats);
        ingestor.process_line(r#"{"kind": "health", "status": 0, "at": 1000}"#, &mut stats);

        assert_eq!(value(&state, "service_up").as_deref(), Some("1"));
        assert_eq!(stats.stale, 1);
    }

    #[test]
    fn debounce_comes_from_definition() {
        let (ingestor, state, clock) = ingestor();
        let mut stats = IngestStats::default();
        // No timestamp path: samples are stamped with the clock.
        ingestor.process_line(r#"{"kind": "disk", "free": 10}"#, &mut stats);
        clock.advance(Duration::from_secs(1));
        ingestor.process_record(&serde_json::json!({"kind": "disk", "free": 0}), &mut stats);
        assert_eq!(stats.published, 2);

        // Inside the 10s window the first reading is still shown.
        let held = state.get("disk").unwrap();
        assert_eq!(held.value, "10");
        assert_eq!(held.timestamp.timestamp_millis(), 5_000);

        clock.advance(Duration::from_secs(10));
        assert_eq!(value(&state, "disk").as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn run_reads_until_eof() {
        let (ingestor, state, _) = ingestor();
        let input: &[u8] = b"{\"kind\": \"disk\", \"free\": 1}\n\
            \n\
            garbage\n\
            \xff\xfe\n\
            {\"kind\": \"health\", \"status\": 1, \"at\": 3000, \"latency_ms\": 4}\r\n\
            {\"kind\": \"disk\", \"free\": 2}";

        let stats = ingestor.run(input).await;
        assert_eq!(
            stats,
            IngestStats {
                lines: 5,
                malformed: 2,
                failures: 0,
                published: 3,
                stale: 1,
            }
        );
        assert_eq!(value(&state, "latency").as_deref(), Some("4"));
        assert_eq!(value(&state, "disk").as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn log_input_does_not_change_processing() {
        let config: MetricsConfig = CONFIG.parse().unwrap();
        let state = MetricState::new();
        let ingestor = Ingestor::new(
            Arc::new(config),
            state.clone(),
            IngestOptions { log_input: true },
        );
        let stats = ingestor.run(&b"{\"kind\": \"disk\", \"free\": 9}\n"[..]).await;
        assert_eq!(stats.published, 1);
        assert_eq!(value(&state, "disk").as_deref(), Some("9"));
    }
}
