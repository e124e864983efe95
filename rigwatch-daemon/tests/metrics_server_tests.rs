//! Scrape endpoint tests against the global Prometheus recorder.

use std::sync::{Arc, OnceLock};

use metrics_exporter_prometheus::PrometheusHandle;
use rigwatch_core::config::{HostConfig, MetricsConfig};
use rigwatch_core::{BoxFuture, MetricSample, MetricSource};
use rigwatch_daemon::host::StaticHostSource;
use rigwatch_daemon::metrics_server;
use rigwatch_log_monitor::MetricsCollector;
use serial_test::serial;

fn handle() -> PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| metrics_server::install_recorder().expect("recorder installs once"))
        .clone()
}

struct Counting;

impl MetricSource for Counting {
    fn name(&self) -> &str {
        "counting"
    }

    fn collect(&self) -> BoxFuture<'_, Vec<MetricSample>> {
        Box::pin(async {
            vec![
                MetricSample::counter("rigwatch_analyzer_lines_total", 42)
                    .with_label("role", "plotter")
                    .with_label("source", "plot.log"),
                MetricSample::histogram("rigwatch_miner_block_latency_ms", vec![1250.0])
                    .with_label("host", "http://127.0.0.1:1234"),
            ]
        })
    }
}

fn local_config(endpoint: &str) -> MetricsConfig {
    MetricsConfig {
        enabled: true,
        listen_addr: "127.0.0.1".to_owned(),
        port: 0,
        endpoint: endpoint.to_owned(),
    }
}

#[tokio::test]
#[serial]
async fn scrape_renders_collected_samples() {
    // Given: a collector with host descriptors and a fixed source
    let mut collector = MetricsCollector::new();
    collector.register(Arc::new(StaticHostSource::new(&HostConfig {
        hostname: "rig-09".to_owned(),
        ..HostConfig::default()
    })));
    collector.register(Arc::new(Counting));

    let listener = metrics_server::bind(&local_config("/metrics")).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = metrics_server::router("/metrics", collector, handle());
    let server = metrics_server::spawn_server(listener, router);

    // When
    let response = reqwest::get(format!("http://{addr}/metrics")).await.unwrap();

    // Then
    assert_eq!(response.status(), 200);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    assert!(content_type.starts_with("text/plain"));
    let body = response.text().await.unwrap();
    let lines = body
        .lines()
        .find(|l| l.starts_with("rigwatch_analyzer_lines_total{"))
        .unwrap();
    assert!(lines.contains("role=\"plotter\""));
    assert!(lines.ends_with(" 42"));
    assert!(body.contains("rigwatch_host_info{"));
    assert!(body.contains("hostname=\"rig-09\""));
    assert!(body.contains("rigwatch_miner_block_latency_ms_bucket"));

    server.abort();
}

#[tokio::test]
#[serial]
async fn custom_endpoint_path_is_served() {
    let listener = metrics_server::bind(&local_config("/rig/metrics")).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = metrics_server::router("/rig/metrics", MetricsCollector::new(), handle());
    let server = metrics_server::spawn_server(listener, router);

    let ok = reqwest::get(format!("http://{addr}/rig/metrics")).await.unwrap();
    assert_eq!(ok.status(), 200);
    let missing = reqwest::get(format!("http://{addr}/metrics")).await.unwrap();
    assert_eq!(missing.status(), 404);

    server.abort();
}

#[tokio::test]
async fn invalid_listen_address_is_rejected() {
    let config = MetricsConfig {
        listen_addr: "999.999.999.999".to_owned(),
        ..local_config("/metrics")
    };
    assert!(metrics_server::bind(&config).await.is_err());
}
