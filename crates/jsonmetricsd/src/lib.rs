//! jsonmetricsd — JSON stream to metrics exporter.
//!
//! ```text
//! stdin (JSON lines) ─→ Ingestor ─→ MetricState ←─ GET /metrics
//! ```
//!
//! The binary wires an [`ingest::Ingestor`] reading standard input to
//! the scrape router from `jsonmetrics-api`. When the input ends the
//! HTTP server shuts down.

pub mod ingest;

pub use ingest::{IngestOptions, IngestStats, Ingestor};
