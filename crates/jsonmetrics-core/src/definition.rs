//! Metric definitions and per-record extraction.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::ExtractError;
use crate::path::PathExpr;
use crate::timestamp::TimestampFormat;

/// Exposition type of a metric, used for `# TYPE` annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
    Untyped,
}

impl MetricKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "gauge" => Some(Self::Gauge),
            "counter" => Some(Self::Counter),
            "untyped" => Some(Self::Untyped),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
            Self::Untyped => "untyped",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
struct TimestampSpec {
    path: Arc<dyn PathExpr>,
    format: TimestampFormat,
}

/// One metric: where it comes from and how it is shown.
///
/// Immutable once built. The timestamp path and its format are set
/// together, so a path without a format cannot be expressed.
#[derive(Debug, Clone)]
pub struct MetricDefinition {
    name: String,
    render_name: Option<String>,
    source: String,
    source_path: Arc<dyn PathExpr>,
    value_path: Arc<dyn PathExpr>,
    timestamp: Option<TimestampSpec>,
    value_map: BTreeMap<String, String>,
    debounce: Option<Duration>,
    help: Option<String>,
    kind: Option<MetricKind>,
}

/// What one record yielded for one metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub source: String,
    pub value: String,
    /// `None` when the metric has no timestamp path; the state engine
    /// then stamps the sample with the ingestion time.
    pub timestamp: Option<DateTime<Utc>>,
}

impl MetricDefinition {
    /// A definition matching records whose `source_path` evaluates to `source`.
    ///
    /// `name` must not be empty; configuration loading rejects empty names.
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        source_path: impl PathExpr + 'static,
        value_path: impl PathExpr + 'static,
    ) -> Self {
        let name = name.into();
        debug_assert!(!name.is_empty(), "metric name must not be empty");
        Self {
            name,
            render_name: None,
            source: source.into(),
            source_path: Arc::new(source_path),
            value_path: Arc::new(value_path),
            timestamp: None,
            value_map: BTreeMap::new(),
            debounce: None,
            help: None,
            kind: None,
        }
    }

    pub fn with_render_name(mut self, render_name: impl Into<String>) -> Self {
        self.render_name = Some(render_name.into());
        self
    }

    pub fn with_timestamp(mut self, path: impl PathExpr + 'static, format: TimestampFormat) -> Self {
        self.timestamp = Some(TimestampSpec {
            path: Arc::new(path),
            format,
        });
        self
    }

    pub fn with_value_map(mut self, value_map: BTreeMap<String, String>) -> Self {
        self.value_map = value_map;
        self
    }

    pub fn with_mapping(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.value_map.insert(from.into(), to.into());
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = Some(debounce);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_kind(mut self, kind: MetricKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name used in the exposition and as the state key.
    pub fn render_name(&self) -> &str {
        self.render_name.as_deref().unwrap_or(&self.name)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn debounce(&self) -> Option<Duration> {
        self.debounce
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn kind(&self) -> Option<MetricKind> {
        self.kind
    }

    pub fn timestamp_format(&self) -> Option<&TimestampFormat> {
        self.timestamp.as_ref().map(|spec| &spec.format)
    }

    pub fn value_map(&self) -> &BTreeMap<String, String> {
        &self.value_map
    }

    /// Apply the value map for display. Unmapped values pass through.
    pub fn display_value<'a>(&'a self, value: &'a str) -> &'a str {
        self.value_map.get(value).map(String::as_str).unwrap_or(value)
    }

    pub fn parse_source(&self, record: &Value) -> Result<String, ExtractError> {
        self.source_path.evaluate(record).map_err(ExtractError::Source)
    }

    pub fn parse_value(&self, record: &Value) -> Result<String, ExtractError> {
        self.value_path.evaluate(record).map_err(ExtractError::Value)
    }

    /// `Ok(None)` when the definition carries no timestamp path.
    pub fn parse_timestamp(&self, record: &Value) -> Result<Option<DateTime<Utc>>, ExtractError> {
        let Some(spec) = &self.timestamp else {
            return Ok(None);
        };
        let raw = spec
            .path
            .evaluate(record)
            .map_err(ExtractError::TimestampPath)?;
        spec.format
            .parse_timestamp(&raw)
            .map(Some)
            .map_err(ExtractError::Timestamp)
    }

    /// Extract this metric from a record.
    ///
    /// Returns `Ok(None)` when the record belongs to a different source.
    pub fn extract(&self, record: &Value) -> Result<Option<Extraction>, ExtractError> {
        let source = self.parse_source(record)?;
        if source != self.source {
            return Ok(None);
        }
        let value = self.parse_value(record)?;
        let timestamp = self.parse_timestamp(record)?;
        Ok(Some(Extraction {
            source,
            value,
            timestamp,
        }))
    }
}
