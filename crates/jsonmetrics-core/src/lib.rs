//! jsonmetrics-core — metric definitions and record extraction.
//!
//! A [`MetricDefinition`] describes how one metric is pulled out of a
//! decoded JSON record: which records it applies to (source
//! discriminator), where its value and optional timestamp live
//! ([`PathExpr`]), how the value is remapped for display, and whether
//! updates are debounced.
//!
//! Definitions are built once at startup from a TOML file by
//! [`MetricsConfig`], which reports every problem in the file at once
//! rather than stopping at the first.

pub mod config;
pub mod definition;
pub mod error;
pub mod path;
pub mod timestamp;

pub use config::MetricsConfig;
pub use definition::{Extraction, MetricDefinition, MetricKind};
pub use error::{ConfigError, ConfigErrors, ExtractError, PathError, TimestampError};
pub use path::{FieldPath, PathExpr};
pub use timestamp::TimestampFormat;
