//! jsonmetrics-api — HTTP surface for jsonmetrics.
//!
//! A single scrape route (default `GET /metrics`) that renders the
//! current metric state as text exposition, with optional per-request
//! logging.

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::get;
use jsonmetrics_core::MetricsConfig;
use jsonmetrics_exposition::RenderOptions;
use jsonmetrics_state::MetricState;

pub use handlers::CONTENT_TYPE;

/// Default scrape route.
pub const DEFAULT_ENDPOINT: &str = "/metrics";

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<MetricsConfig>,
    pub metrics: MetricState,
    pub render: RenderOptions,
}

/// Router options supplied by the process entry point.
#[derive(Debug, Clone)]
pub struct ApiOptions {
    /// Route serving the exposition. Must start with `/`.
    pub endpoint: String,
    /// Log every request at info level.
    pub log_requests: bool,
    /// Emit `# HELP` / `# TYPE` lines.
    pub annotations: bool,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            log_requests: false,
            annotations: false,
        }
    }
}

/// Build the scrape router.
pub fn build_router(config: Arc<MetricsConfig>, metrics: MetricState, options: &ApiOptions) -> Router {
    let state = ApiState {
        config,
        metrics,
        render: RenderOptions {
            annotations: options.annotations,
        },
    };

    let router = Router::new()
        .route(&options.endpoint, get(handlers::metrics))
        .with_state(state);

    if options.log_requests {
        router.layer(middleware::from_fn(handlers::log_requests))
    } else {
        router
    }
}
