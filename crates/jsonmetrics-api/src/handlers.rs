//! Scrape handler and request logging.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::info;

use jsonmetrics_exposition::render_exposition;

use crate::ApiState;

/// Content type of the exposition.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// GET /metrics
pub async fn metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = render_exposition(state.config.definitions(), &state.metrics, state.render);
    (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}

/// Log remote address, `x-forwarded-for`, method and URI of each request.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());
    let forwarded_for = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or("-")
        .to_string();

    info!(
        %remote,
        %forwarded_for,
        method = %request.method(),
        uri = %request.uri(),
        "request"
    );
    next.run(request).await
}
