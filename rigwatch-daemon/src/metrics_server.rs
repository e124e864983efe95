//! Prometheus recorder and scrape endpoint.
//!
//! Each `GET <endpoint>` collects samples from every registered
//! [`MetricSource`](rigwatch_core::MetricSource), writes them into the
//! recorder, then renders the exposition text.

use std::net::SocketAddr;

use anyhow::Result;
use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use rigwatch_core::config::MetricsConfig;
use rigwatch_core::metrics as m;
use rigwatch_log_monitor::MetricsCollector;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Install the global Prometheus recorder and register metric descriptions.
///
/// Can succeed once per process.
pub fn install_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(m::MINER_BLOCK_LATENCY_MS.to_owned()),
            &m::BLOCK_LATENCY_BUCKETS_MS,
        )
        .map_err(|e| anyhow::anyhow!("invalid histogram buckets: {}", e))?
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    m::describe_all();
    Ok(handle)
}

/// Bind the scrape listener. Failure here is fatal at startup.
pub async fn bind(config: &MetricsConfig) -> Result<TcpListener> {
    let addr: SocketAddr = format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces"
        );
    }

    TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind metrics endpoint {}: {}", addr, e))
}

#[derive(Clone)]
struct ScrapeState {
    collector: MetricsCollector,
    handle: PrometheusHandle,
}

/// Router serving the exposition text on `endpoint`.
pub fn router(endpoint: &str, collector: MetricsCollector, handle: PrometheusHandle) -> Router {
    Router::new()
        .route(endpoint, get(scrape))
        .with_state(ScrapeState { collector, handle })
}

async fn scrape(State(state): State<ScrapeState>) -> impl IntoResponse {
    let recorded = state.collector.collect_and_record().await;
    tracing::debug!(samples = recorded, "metrics scraped");
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], state.handle.render())
}

/// Serve `router` on `listener` in a background task.
pub fn spawn_server(listener: TcpListener, router: Router) -> JoinHandle<()> {
    let local = listener.local_addr().ok();
    tokio::spawn(async move {
        tracing::info!(listen_addr = ?local, "metrics endpoint active");
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "metrics endpoint stopped");
        }
    })
}
