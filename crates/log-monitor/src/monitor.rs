//! 로그 모니터 -- 테일러/분석기/분류 태스크 조립
//!
//! [`LogMonitor`]는 감시 소스마다 테일러 하나와 분석기 하나를 묶고,
//! 채굴 분석기에는 분류 태스크를 붙입니다.
//!
//! ```text
//! sources ─┬─ Tailer(miner.log)  ──handoff──► Analyzer(miner) ◄── classifier ── ChainLookup
//!          ├─ Tailer(miner.log)  ──handoff──► Analyzer(generic_error)
//!          └─ Tailer(plot.log)   ──handoff──► Analyzer(plotter)
//! ```
//!
//! 분석기는 모니터가 재시작되어도 유지되므로 누적 카운터가 초기화되지 않습니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use rigwatch_core::config::SourceConfig;
use rigwatch_core::error::{PipelineError, RigwatchError};
use rigwatch_core::{MetricSource, Role};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::analyzer::Analyzer;
use crate::chain::ChainLookup;
use crate::checkpoint::CheckpointStore;
use crate::config::LogMonitorConfig;
use crate::error::LogMonitorError;
use crate::handoff;
use crate::rule::loader::RoleRules;
use crate::rule::{RuleLoader, RuleTable};
use crate::scrape::MetricsCollector;
use crate::tailer::{Tailer, TailerConfig};

/// 모니터 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorState {
    Initialized,
    Running,
    Stopped,
}

/// 감시 소스와 분석기의 결합
struct SourceBinding {
    source: SourceConfig,
    analyzer: Arc<Analyzer>,
}

/// 로그 모니터
///
/// # 사용 예시
/// ```ignore
/// use rigwatch_log_monitor::{FileCheckpointStore, HttpChainLookup, LogMonitorBuilder};
///
/// let mut monitor = LogMonitorBuilder::new()
///     .config(config)
///     .checkpoint_store(Arc::new(FileCheckpointStore::new("/var/lib/rigwatch/checkpoints")))
///     .chain_lookup(Arc::new(HttpChainLookup::new(timeout, None)?))
///     .build()
///     .await?;
///
/// monitor.register_metrics(&mut collector);
/// monitor.start()?;
/// ```
pub struct LogMonitor<L: ChainLookup, S: CheckpointStore> {
    config: LogMonitorConfig,
    state: MonitorState,
    lookup: Arc<L>,
    store: Arc<S>,
    bindings: Vec<SourceBinding>,
    tasks: Vec<JoinHandle<()>>,
}

impl<L: ChainLookup, S: CheckpointStore> LogMonitor<L, S> {
    /// 모든 태스크를 시작합니다.
    ///
    /// # Errors
    /// 이미 실행 중이면 `PipelineError::AlreadyRunning`
    pub fn start(&mut self) -> Result<(), RigwatchError> {
        if self.state == MonitorState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        info!(sources = self.bindings.len(), "starting log monitor");

        for binding in &self.bindings {
            let (tx, rx) = handoff::channel();
            let tailer_config = TailerConfig::from_source(
                &binding.source,
                self.config.poll_interval,
                self.config.max_line_length,
            );
            let tailer = Tailer::new(tailer_config, Arc::clone(&self.store), tx);
            let path = binding.source.path.clone();

            self.tasks.push(tokio::spawn(async move {
                if let Err(e) = tailer.run().await {
                    warn!(path = %path, error = %e, "tailer stopped");
                }
            }));
            self.tasks
                .push(tokio::spawn(Arc::clone(&binding.analyzer).run(rx)));

            if binding.analyzer.role() == Role::Miner {
                self.tasks.push(tokio::spawn(
                    Arc::clone(&binding.analyzer)
                        .run_classifier(Arc::clone(&self.lookup), self.config.classify_interval),
                ));
            }
        }

        self.state = MonitorState::Running;
        info!(tasks = self.tasks.len(), "log monitor started");
        Ok(())
    }

    /// 모든 태스크를 중단합니다.
    ///
    /// # Errors
    /// 실행 중이 아니면 `PipelineError::NotRunning`
    pub async fn stop(&mut self) -> Result<(), RigwatchError> {
        if self.state != MonitorState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping log monitor");
        for task in self.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }

        self.state = MonitorState::Stopped;
        info!("log monitor stopped");
        Ok(())
    }

    /// 현재 상태명
    pub fn state_name(&self) -> &str {
        match self.state {
            MonitorState::Initialized => "initialized",
            MonitorState::Running => "running",
            MonitorState::Stopped => "stopped",
        }
    }

    /// 감시 소스 순서대로 분석기 목록을 반환합니다.
    pub fn analyzers(&self) -> Vec<Arc<Analyzer>> {
        self.bindings
            .iter()
            .map(|b| Arc::clone(&b.analyzer))
            .collect()
    }

    /// 경로와 역할로 분석기를 찾습니다.
    pub fn analyzer(&self, path: &str, role: Role) -> Option<Arc<Analyzer>> {
        self.bindings
            .iter()
            .find(|b| b.source.path == path && b.source.role == role)
            .map(|b| Arc::clone(&b.analyzer))
    }

    /// 모든 분석기를 메트릭 소스로 등록합니다.
    pub fn register_metrics(&self, collector: &mut MetricsCollector) {
        for binding in &self.bindings {
            collector.register(Arc::clone(&binding.analyzer) as Arc<dyn MetricSource>);
        }
    }

    /// 실행 중인 태스크 수
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

/// 로그 모니터 빌더
pub struct LogMonitorBuilder<L: ChainLookup, S: CheckpointStore> {
    config: LogMonitorConfig,
    lookup: Option<Arc<L>>,
    store: Option<Arc<S>>,
    extra_rules: RoleRules,
}

impl<L: ChainLookup, S: CheckpointStore> LogMonitorBuilder<L, S> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: LogMonitorConfig::default(),
            lookup: None,
            store: None,
            extra_rules: BTreeMap::new(),
        }
    }

    /// 모니터 설정을 지정합니다.
    pub fn config(mut self, config: LogMonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// 체인 조회기를 지정합니다.
    pub fn chain_lookup(mut self, lookup: Arc<L>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// 체크포인트 저장소를 지정합니다.
    pub fn checkpoint_store(mut self, store: Arc<S>) -> Self {
        self.store = Some(store);
        self
    }

    /// 규칙 파일 외에 코드로 추가할 규칙을 지정합니다.
    pub fn extra_rules(mut self, rules: RoleRules) -> Self {
        for (role, specs) in rules {
            self.extra_rules.entry(role).or_default().extend(specs);
        }
        self
    }

    /// 모니터를 빌드합니다.
    ///
    /// 설정에 규칙 파일이 있으면 여기서 읽습니다.
    ///
    /// # Errors
    /// - 설정 검증 실패
    /// - 체크포인트 저장소 또는 체인 조회기 미지정
    /// - 규칙 파일 로딩/검증 실패
    pub async fn build(self) -> Result<LogMonitor<L, S>, LogMonitorError> {
        self.config.validate()?;

        let store = self.store.ok_or_else(|| LogMonitorError::Config {
            field: "checkpoint_store".to_owned(),
            reason: "checkpoint store is required".to_owned(),
        })?;
        let lookup = self.lookup.ok_or_else(|| LogMonitorError::Config {
            field: "chain_lookup".to_owned(),
            reason: "chain lookup is required".to_owned(),
        })?;

        let mut extra = self.extra_rules;
        if let Some(path) = &self.config.rules_file {
            for (role, specs) in RuleLoader::load_file(path).await? {
                extra.entry(role).or_default().extend(specs);
            }
        }

        let mut bindings = Vec::with_capacity(self.config.sources.len());
        for source in &self.config.sources {
            let mut table = RuleTable::builtin(source.role);
            if let Some(specs) = extra.get(&source.role) {
                table.extend(specs.clone())?;
            }

            let analyzer = Arc::new(Analyzer::new(
                table,
                source.base_name(),
                self.config.max_pending_blocks,
            ));
            if source.role == Role::Miner
                && let Some(url) = &self.config.chain_api_url
            {
                analyzer.set_target(url.clone()).await;
            }

            bindings.push(SourceBinding {
                source: source.clone(),
                analyzer,
            });
        }

        info!(
            sources = bindings.len(),
            extra_rules = extra.values().map(Vec::len).sum::<usize>(),
            "log monitor built"
        );

        Ok(LogMonitor {
            config: self.config,
            state: MonitorState::Initialized,
            lookup,
            store,
            bindings,
            tasks: Vec::new(),
        })
    }
}

impl<L: ChainLookup, S: CheckpointStore> Default for LogMonitorBuilder<L, S> {
    fn default() -> Self {
        Self::new()
    }
}
