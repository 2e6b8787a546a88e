//! Error types for metric definitions, extraction, and configuration.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors from compiling or evaluating a field path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("empty path expression")]
    Empty,

    #[error("invalid path {expr:?}: {reason}")]
    Syntax { expr: String, reason: String },

    #[error("{path}: no such element {segment}")]
    NotFound { path: String, segment: String },

    #[error("{path}: cannot apply {segment} to {found}")]
    TypeMismatch {
        path: String,
        segment: String,
        found: &'static str,
    },

    #[error("{path}: value is null")]
    Null { path: String },
}

/// Errors from timestamp format validation and parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("invalid timestamp format {0:?}")]
    InvalidFormat(String),

    #[error("cannot parse {raw:?} as {format}: {reason}")]
    Parse {
        raw: String,
        format: String,
        reason: String,
    },
}

/// Why a metric could not be extracted from a record.
///
/// An extraction failure only skips the affected metric for the
/// affected record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("bad source: {0}")]
    Source(#[source] PathError),

    #[error("bad value: {0}")]
    Value(#[source] PathError),

    #[error("bad timestamp: {0}")]
    TimestampPath(#[source] PathError),

    #[error("bad timestamp: {0}")]
    Timestamp(#[source] TimestampError),
}

/// A single configuration problem.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Syntax(#[from] toml::de::Error),

    #[error("unrecognized section {0:?}")]
    UnknownSection(String),

    #[error("section {0:?} must be a table")]
    NotATable(String),

    #[error("metric name must not be empty")]
    EmptyName,

    #[error("metric {metric:?}: unrecognized key {key:?}")]
    UnknownKey { metric: String, key: String },

    #[error("metric {metric:?}: key {key:?} must be {expected}")]
    WrongType {
        metric: String,
        key: String,
        expected: &'static str,
    },

    #[error("metric {metric:?}: missing required key {key:?}")]
    MissingKey { metric: String, key: &'static str },

    #[error("metric {metric:?}: bad {key}: {source}")]
    BadPath {
        metric: String,
        key: &'static str,
        #[source]
        source: PathError,
    },

    #[error("metric {metric:?}: bad debounce {value:?}: {reason}")]
    BadDebounce {
        metric: String,
        value: String,
        reason: String,
    },

    #[error("metric {metric:?}: {source}")]
    BadTimestampFormat {
        metric: String,
        #[source]
        source: TimestampError,
    },

    #[error("metric {metric:?}: {present} requires {missing}")]
    Incomplete {
        metric: String,
        present: &'static str,
        missing: &'static str,
    },

    #[error("metric {metric:?}: unknown metric type {value:?} (expected gauge, counter or untyped)")]
    BadMetricType { metric: String, value: String },

    #[error("metrics {first:?} and {second:?} both render as {render_name:?}")]
    DuplicateRenderName {
        render_name: String,
        first: String,
        second: String,
    },
}

/// Every problem found in a configuration file.
///
/// Never empty when returned as an error.
#[derive(Debug)]
pub struct ConfigErrors(pub Vec<ConfigError>);

impl ConfigErrors {
    pub fn single(error: ConfigError) -> Self {
        Self(vec![error])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} configuration error(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigErrors {}

impl From<ConfigError> for ConfigErrors {
    fn from(error: ConfigError) -> Self {
        Self::single(error)
    }
}
