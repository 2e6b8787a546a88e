//! jsonmetricsd — serve metrics extracted from a JSON line stream.
//!
//! # Usage
//!
//! ```text
//! tail -F events.log | jsonmetricsd --config metrics.toml --listen 0.0.0.0:19100
//! ```
//!
//! Reads standard input until EOF, then stops the HTTP server and exits
//! with status 0. Configuration problems and listener failures exit
//! non-zero.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use jsonmetrics_api::{ApiOptions, DEFAULT_ENDPOINT, build_router};
use jsonmetrics_core::MetricsConfig;
use jsonmetrics_state::MetricState;
use jsonmetricsd::{IngestOptions, Ingestor};

#[derive(Parser)]
#[command(
    name = "jsonmetricsd",
    about = "Expose metrics extracted from newline-delimited JSON on stdin",
    version
)]
struct Cli {
    /// Path to the metric configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Listening address for the HTTP server.
    #[arg(short, long, default_value = "localhost:19100")]
    listen: String,

    /// Route serving the metrics.
    #[arg(long, default_value = DEFAULT_ENDPOINT, value_parser = parse_endpoint)]
    endpoint: String,

    /// Log HTTP requests.
    #[arg(long)]
    log_requests: bool,

    /// Log every input line.
    #[arg(long)]
    log_input: bool,

    /// Emit `# HELP` and `# TYPE` lines for metrics that define them.
    #[arg(long)]
    annotate: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("cannot start async runtime")?;
    let result = runtime.block_on(run(cli));
    // A pending stdin read would otherwise hold up runtime shutdown.
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = MetricsConfig::from_file(&cli.config)
        .with_context(|| format!("invalid configuration {}", cli.config.display()))?;
    let config = Arc::new(config);
    info!(metrics = config.len(), path = ?cli.config, "configuration loaded");

    let state = MetricState::new();

    // ── HTTP server ────────────────────────────────────────────

    let options = ApiOptions {
        endpoint: cli.endpoint,
        log_requests: cli.log_requests,
        annotations: cli.annotate,
    };
    let router = build_router(config.clone(), state.clone(), &options);

    let listener = TcpListener::bind(&cli.listen)
        .await
        .with_context(|| format!("cannot listen on {}", cli.listen))?;
    let addr = listener.local_addr()?;
    info!(%addr, endpoint = %options.endpoint, "HTTP server listening");

    // ── Ingestion ──────────────────────────────────────────────

    let (input_closed_tx, mut input_closed_rx) = watch::channel(false);
    let ingestor = Ingestor::new(
        config,
        state,
        IngestOptions {
            log_input: cli.log_input,
        },
    );
    tokio::spawn(async move {
        ingestor.run(BufReader::new(tokio::io::stdin())).await;
        let _ = input_closed_tx.send(true);
    });

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        tokio::select! {
            _ = input_closed_rx.changed() => info!("input closed, stopping HTTP server"),
            _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
        }
    })
    .await
    .context("HTTP server failed")?;

    info!("jsonmetricsd stopped");
    Ok(())
}

fn parse_endpoint(s: &str) -> Result<String, String> {
    if s.starts_with('/') {
        Ok(s.to_string())
    } else {
        Err(format!("endpoint {s:?} must start with '/'"))
    }
}
