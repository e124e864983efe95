//! Daemon assembly and lifecycle.
//!
//! The [`Orchestrator`] wires the log monitor, the scrape endpoint and the
//! control plane reporter together.
//!
//! # Startup order
//!
//! 1. Delivery worker, then `register` and `starting` events
//! 2. Log monitor (tailers, analyzers, classifiers)
//! 3. Scrape endpoint
//! 4. `running` event
//!
//! # Shutdown
//!
//! No drain: a `stopping` event is queued without waiting, the worker gets a
//! short grace period to send it, then every task is aborted.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;

use rigwatch_core::config::RigwatchConfig;
use rigwatch_log_monitor::{
    FileCheckpointStore, HttpChainLookup, LogMonitor, LogMonitorBuilder, LogMonitorConfig,
    MetricsCollector,
};
use rigwatch_reporter::{
    DeliveryConfig, HostInfo, HttpTransport, MachineState, Reporter, ReporterHandle,
};

use crate::host::StaticHostSource;
use crate::metrics_server;

/// Time the delivery worker gets to flush the `stopping` event.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

type Monitor = LogMonitor<HttpChainLookup, FileCheckpointStore>;

/// The main daemon orchestrator.
pub struct Orchestrator {
    config: RigwatchConfig,
    monitor: Monitor,
    collector: MetricsCollector,
    metrics_handle: Option<PrometheusHandle>,
    reporter: Option<Reporter<HttpTransport>>,
    reporter_handle: Option<ReporterHandle>,
    reporter_task: Option<JoinHandle<()>>,
    server_task: Option<JoinHandle<()>>,
}

impl Orchestrator {
    /// Load `rigwatch.toml` (with env overrides) and build.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = RigwatchConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    ///
    /// Installs the global Prometheus recorder when `metrics.enabled`.
    pub async fn build_from_config(config: RigwatchConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        let metrics_handle = if config.metrics.enabled {
            Some(metrics_server::install_recorder()?)
        } else {
            None
        };

        let monitor_config = LogMonitorConfig::from_core(&config.monitor, &config.miner);
        let lookup = Arc::new(
            HttpChainLookup::new(
                monitor_config.lookup_timeout,
                monitor_config.chain_api_token.clone(),
            )
            .map_err(|e| anyhow::anyhow!("failed to build chain lookup: {}", e))?,
        );
        let store = Arc::new(FileCheckpointStore::new(monitor_config.checkpoint_dir.clone()));

        let monitor = LogMonitorBuilder::new()
            .config(monitor_config)
            .chain_lookup(lookup)
            .checkpoint_store(store)
            .build()
            .await
            .map_err(|e| anyhow::anyhow!("failed to build log monitor: {}", e))?;

        let mut collector = MetricsCollector::new();
        collector.register(Arc::new(StaticHostSource::new(&config.host)));
        monitor.register_metrics(&mut collector);

        let (reporter, reporter_handle) = if config.reporter.enabled {
            let delivery = DeliveryConfig::from_core(&config.reporter);
            delivery
                .validate()
                .map_err(|e| anyhow::anyhow!("invalid reporter config: {}", e))?;
            let transport = Arc::new(
                HttpTransport::new(delivery.base_url.clone(), delivery.request_timeout)
                    .map_err(|e| anyhow::anyhow!("failed to build reporter transport: {}", e))?,
            );
            let (reporter, handle) =
                Reporter::new(delivery, transport, HostInfo::from_core(&config.host));
            (Some(reporter), Some(handle))
        } else {
            (None, None)
        };

        tracing::info!(
            sources = config.monitor.sources.len(),
            metric_sources = collector.len(),
            reporter = config.reporter.enabled,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            monitor,
            collector,
            metrics_handle,
            reporter,
            reporter_handle,
            reporter_task: None,
            server_task: None,
        })
    }

    /// Start every component in order.
    pub async fn start(&mut self) -> Result<()> {
        if let Some(reporter) = self.reporter.take() {
            self.reporter_task = Some(tokio::spawn(reporter.run()));
        }

        if let Some(handle) = &self.reporter_handle {
            handle
                .register_machine(handle.host())
                .await
                .map_err(|e| anyhow::anyhow!("failed to queue registration: {}", e))?;
            handle
                .report_state(MachineState::Starting, "starting log monitor")
                .await
                .map_err(|e| anyhow::anyhow!("failed to queue state change: {}", e))?;
        }

        self.monitor
            .start()
            .map_err(|e| anyhow::anyhow!("failed to start log monitor: {}", e))?;

        if let Some(handle) = self.metrics_handle.clone() {
            let listener = metrics_server::bind(&self.config.metrics).await?;
            let router = metrics_server::router(
                &self.config.metrics.endpoint,
                self.collector.clone(),
                handle,
            );
            self.server_task = Some(metrics_server::spawn_server(listener, router));
        }

        if let Some(handle) = &self.reporter_handle {
            let detail = format!("monitoring {} sources", self.config.monitor.sources.len());
            handle
                .report_state(MachineState::Running, &detail)
                .await
                .map_err(|e| anyhow::anyhow!("failed to queue state change: {}", e))?;
        }

        tracing::info!(tasks = self.monitor.task_count(), "rigwatch-daemon running");
        Ok(())
    }

    /// Start, wait for SIGTERM or SIGINT, then shut down.
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;
        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal = signal, "shutdown signal received");
        self.shutdown(signal).await;
        Ok(())
    }

    /// Best-effort `stopping` event, then abort everything.
    pub async fn shutdown(&mut self, reason: &str) {
        if let Some(handle) = self.reporter_handle.take() {
            if let Err(e) = handle.try_report_state(MachineState::Stopping, reason) {
                tracing::warn!(error = %e, "could not queue stopping event");
            }
            drop(handle);
        }

        if let Err(e) = self.monitor.stop().await {
            tracing::debug!(error = %e, "log monitor was not running");
        }

        if let Some(mut task) = self.reporter_task.take()
            && tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err()
        {
            tracing::warn!("delivery worker still has pending events, aborting");
            task.abort();
        }

        if let Some(task) = self.server_task.take() {
            task.abort();
        }

        tracing::info!("rigwatch-daemon shut down");
    }

    /// Scrape-time collector (host descriptors + every analyzer).
    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }

    /// Producer handle for control plane events, when the reporter is enabled.
    pub fn reporter(&self) -> Option<&ReporterHandle> {
        self.reporter_handle.as_ref()
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn config(&self) -> &RigwatchConfig {
        &self.config
    }
}

/// Wait for SIGTERM or SIGINT and return the signal name.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
