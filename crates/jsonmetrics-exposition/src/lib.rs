//! jsonmetrics-exposition — text exposition for scrapes.
//!
//! ```text
//! MetricsConfig ─┐
//!                ├─ render_exposition() → "name value timestamp_ms\n" ...
//! MetricState ───┘
//! ```

pub mod text;

pub use text::{RenderOptions, render_exposition};
