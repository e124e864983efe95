//! 역할별 분석기
//!
//! [`Analyzer`]는 테일러 하나가 넘겨주는 라인을 소비하며 주입된 [`RuleTable`]로
//! 카운터를 갱신합니다. 역할에 따른 차이는 규칙 테이블과 노출 샘플뿐입니다.
//!
//! # 채굴 블록 분류
//! `mined_block` 규칙에 매칭된 라인의 블록 레코드는 대기열에 쌓이고,
//! [`Analyzer::run_classifier`]가 주기적으로 체인 조회 결과와 비교합니다.
//!
//! - 조회 성공 + cid 포함: 정상 블록, 소요 시간을 지연 목록에 추가
//! - 조회 성공 + cid 없음: fork, 누적 카운터 증가
//! - 조회 실패: 대기열에 남겨 다음 주기에 재시도
//!
//! 대상 호스트가 설정되지 않은 동안에는 분류하지 않고 대기열만 쌓입니다.
//! 락은 네트워크 호출 동안 잡지 않습니다.

pub mod state;

pub use state::{AnalyzerState, PushOutcome, TimingStats};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use rigwatch_core::metrics as m;
use rigwatch_core::{BoxFuture, LogLine, MetricSample, MetricSource, Role};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chain::ChainLookup;
use crate::handoff::LineReceiver;
use crate::parser::CandidateBlock;
use crate::rule::{RuleAction, RuleTable};

/// 소비한 라인 수 카운터
pub const LINES_COUNTER: &str = "lines";

/// fork로 분류된 블록 수 카운터
pub const FORKED_BLOCKS_COUNTER: &str = "forked_blocks";

/// 한 번의 분류 패스 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifyOutcome {
    /// 정상 블록으로 확정된 수
    pub canonical: usize,
    /// fork로 확정된 수
    pub forked: usize,
    /// 조회 실패로 대기열에 남은 수
    pub retried: usize,
}

impl ClassifyOutcome {
    fn is_empty(&self) -> bool {
        self.canonical == 0 && self.forked == 0 && self.retried == 0
    }
}

enum Verdict {
    Canonical,
    Forked,
}

/// 역할별 분석기
pub struct Analyzer {
    name: String,
    source: String,
    rules: RuleTable,
    max_pending: usize,
    state: Mutex<AnalyzerState>,
    target: Mutex<Option<String>>,
}

impl Analyzer {
    /// 새 분석기를 생성합니다.
    ///
    /// `source`는 메트릭 레이블로 쓰이는 로그 파일 이름입니다.
    pub fn new(rules: RuleTable, source: impl Into<String>, max_pending: usize) -> Self {
        let source = source.into();
        Self {
            name: format!("{}:{}", rules.role(), source),
            source,
            rules,
            max_pending: max_pending.max(1),
            state: Mutex::new(AnalyzerState::default()),
            target: Mutex::new(None),
        }
    }

    pub fn role(&self) -> Role {
        self.rules.role()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// 라인 하나를 처리합니다.
    pub async fn process(&self, line: &LogLine) {
        let hits: Vec<_> = self.rules.evaluate(line).collect();
        let mut candidate = if hits.iter().any(|h| h.action == RuleAction::MinedBlock) {
            CandidateBlock::from_line(line)
        } else {
            None
        };

        let mut state = self.state.lock().await;
        state.increment(LINES_COUNTER);

        for hit in hits {
            match hit.action {
                RuleAction::Count => state.increment(hit.counter),
                RuleAction::Timing => {
                    if let Some(secs) = hit.value {
                        state.record_timing(hit.counter, secs);
                    }
                }
                RuleAction::MinedBlock => {
                    state.increment(hit.counter);
                    let Some(block) = candidate.take() else {
                        continue;
                    };
                    let (cid, height) = (block.cid.clone(), block.height);
                    match state.push_candidate(block, self.max_pending) {
                        PushOutcome::Queued => {
                            debug!(cid = %cid, height, "queued mined block for classification");
                        }
                        PushOutcome::Duplicate => {
                            debug!(cid = %cid, "mined block already pending");
                        }
                        PushOutcome::Evicted(old) => {
                            warn!(
                                source = %self.source,
                                dropped_cid = %old.cid,
                                dropped_height = old.height,
                                max_pending = self.max_pending,
                                "pending block queue full, dropping oldest candidate"
                            );
                        }
                    }
                }
            }
        }
    }

    /// 핸드오프 채널이 닫힐 때까지 라인을 소비합니다.
    ///
    /// 라인마다 처리가 끝난 뒤에 ack를 보냅니다.
    pub async fn run(self: Arc<Self>, mut rx: LineReceiver) {
        while let Some(handoff) = rx.recv().await {
            self.process(handoff.line()).await;
            handoff.complete();
        }
        debug!(analyzer = %self.name, "line channel closed, analyzer stopping");
    }

    /// 체인 조회 대상 호스트를 설정합니다.
    pub async fn set_target(&self, host: impl Into<String>) {
        let host = host.into();
        info!(analyzer = %self.name, host = %host, "chain lookup target set");
        *self.target.lock().await = Some(host);
    }

    /// 현재 체인 조회 대상 호스트
    pub async fn target(&self) -> Option<String> {
        self.target.lock().await.clone()
    }

    /// 누적 카운터 스냅샷
    pub async fn cumulative(&self) -> BTreeMap<String, u64> {
        self.state.lock().await.cumulative.clone()
    }

    /// 누적 카운터 하나 (없으면 0)
    pub async fn counter(&self, name: &str) -> u64 {
        self.state.lock().await.counter(name)
    }

    /// 지연 목록을 비우고 반환합니다.
    pub async fn drain_latencies(&self) -> Vec<u64> {
        self.state.lock().await.drain_latencies()
    }

    /// 소요 시간 통계
    pub async fn timing(&self, name: &str) -> Option<TimingStats> {
        self.state.lock().await.timing.get(name).copied()
    }

    /// 분류 대기 중인 블록 (오래된 순)
    pub async fn pending_blocks(&self) -> Vec<CandidateBlock> {
        self.state.lock().await.pending.iter().cloned().collect()
    }

    /// 대기 중인 블록을 한 번 분류합니다.
    pub async fn classify_pending<L: ChainLookup>(&self, lookup: &L) -> ClassifyOutcome {
        let Some(host) = self.target().await else {
            return ClassifyOutcome::default();
        };

        let snapshot = self.pending_blocks().await;
        if snapshot.is_empty() {
            return ClassifyOutcome::default();
        }

        // 같은 높이는 한 번만 조회
        let mut tipsets: HashMap<u64, Option<HashSet<String>>> = HashMap::new();
        let mut verdicts = Vec::new();
        let mut outcome = ClassifyOutcome::default();

        for block in &snapshot {
            if !tipsets.contains_key(&block.height) {
                let result = match lookup.canonical_blocks(&host, block.height).await {
                    Ok(cids) => Some(cids),
                    Err(e) => {
                        metrics::counter!(m::MINER_LOOKUP_FAILURES_TOTAL, m::LABEL_SOURCE => self.source.clone())
                            .increment(1);
                        warn!(
                            host = %host,
                            height = block.height,
                            error = %e,
                            "chain lookup failed, will retry"
                        );
                        None
                    }
                };
                tipsets.insert(block.height, result);
            }

            match tipsets.get(&block.height) {
                Some(Some(cids)) if cids.contains(&block.cid) => {
                    verdicts.push((block.cid.clone(), Verdict::Canonical));
                }
                Some(Some(_)) => verdicts.push((block.cid.clone(), Verdict::Forked)),
                _ => outcome.retried += 1,
            }
        }

        let mut state = self.state.lock().await;
        for (cid, verdict) in verdicts {
            // 분류 중에 대기열 초과로 밀려난 후보는 건너뜀
            let Some(block) = state.take_candidate(&cid) else {
                continue;
            };
            match verdict {
                Verdict::Canonical => {
                    state.record_latency(block.took_ms);
                    outcome.canonical += 1;
                }
                Verdict::Forked => {
                    state.increment(FORKED_BLOCKS_COUNTER);
                    outcome.forked += 1;
                    info!(
                        cid = %block.cid,
                        height = block.height,
                        "mined block not in canonical tipset, counted as fork"
                    );
                }
            }
        }

        outcome
    }

    /// 주기적으로 분류 패스를 실행합니다. 반환하지 않습니다.
    pub async fn run_classifier<L: ChainLookup>(self: Arc<Self>, lookup: Arc<L>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // 첫 tick은 즉시 완료됨
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let outcome = self.classify_pending(lookup.as_ref()).await;
            if !outcome.is_empty() {
                debug!(
                    analyzer = %self.name,
                    canonical = outcome.canonical,
                    forked = outcome.forked,
                    retried = outcome.retried,
                    "classification pass finished"
                );
            }
        }
    }

    async fn samples(&self) -> Vec<MetricSample> {
        let target = self.target().await;
        let role = self.role().as_str();
        let labeled = |sample: MetricSample| {
            sample
                .with_label(m::LABEL_ROLE, role)
                .with_label(m::LABEL_SOURCE, self.source.as_str())
        };

        let mut state = self.state.lock().await;
        let mut samples = vec![labeled(MetricSample::counter(
            m::ANALYZER_LINES_TOTAL,
            state.counter(LINES_COUNTER),
        ))];

        for (event, value) in &state.cumulative {
            if event == LINES_COUNTER || event == FORKED_BLOCKS_COUNTER {
                continue;
            }
            samples.push(
                labeled(MetricSample::counter(m::ANALYZER_EVENTS_TOTAL, *value))
                    .with_label(m::LABEL_EVENT, event.as_str()),
            );
        }

        for (event, stats) in &state.timing {
            let with_event = |s: MetricSample| labeled(s).with_label(m::LABEL_EVENT, event.as_str());
            samples.push(with_event(MetricSample::counter(
                m::PLOTS_COMPLETED_TOTAL,
                stats.count,
            )));
            samples.push(with_event(MetricSample::gauge(
                m::PLOT_DURATION_SECONDS_MIN,
                stats.min,
            )));
            samples.push(with_event(MetricSample::gauge(
                m::PLOT_DURATION_SECONDS_MAX,
                stats.max,
            )));
            samples.push(with_event(MetricSample::gauge(
                m::PLOT_DURATION_SECONDS_AVG,
                stats.average().unwrap_or(0.0),
            )));
            samples.push(with_event(MetricSample::gauge(
                m::PLOT_DURATION_SECONDS_SUM,
                stats.total,
            )));
        }

        if self.role() == Role::Miner
            && let Some(host) = target
        {
            let with_host = |s: MetricSample| labeled(s).with_label(m::LABEL_HOST, host.as_str());
            samples.push(with_host(MetricSample::counter(
                m::MINER_FORKED_BLOCKS_TOTAL,
                state.counter(FORKED_BLOCKS_COUNTER),
            )));
            let latencies = state.drain_latencies();
            if !latencies.is_empty() {
                samples.push(with_host(MetricSample::histogram(
                    m::MINER_BLOCK_LATENCY_MS,
                    latencies.into_iter().map(|ms| ms as f64).collect(),
                )));
            }
            samples.push(with_host(MetricSample::gauge(
                m::MINER_PENDING_BLOCKS,
                state.pending.len() as f64,
            )));
        }

        samples
    }
}

impl MetricSource for Analyzer {
    fn name(&self) -> &str {
        &self.name
    }

    fn collect(&self) -> BoxFuture<'_, Vec<MetricSample>> {
        Box::pin(self.samples())
    }
}
