//! 전송 워커와 생산자 핸들
//!
//! [`Reporter`]는 bounded 큐의 유일한 소비자입니다. 한 태스크 안에서
//! 큐 수신, 재시도 due 대기, 주기적 flush 타이머를 `select!`로 함께 처리합니다.
//!
//! # 백프레셔
//!
//! 재시도 버퍼가 가득 차면 큐 수신 분기를 끕니다. 큐가 차면 생산자는
//! [`ReporterHandle::enqueue`]에서 대기하고, [`ReporterHandle::try_enqueue`]는
//! [`ReporterError::QueueFull`]을 돌려줍니다. 어떤 메시지도 버리지 않습니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use rigwatch_core::metrics as m;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::DeliveryConfig;
use crate::error::ReporterError;
use crate::message::{HostInfo, MachineState, OutboundMessage};
use crate::retry::RetryBuffer;
use crate::transport::Transport;

/// 워커 통계
#[derive(Debug, Default)]
pub struct ReporterStats {
    delivered: AtomicU64,
    failed_attempts: AtomicU64,
    pending_retries: AtomicUsize,
}

impl ReporterStats {
    /// 전달 성공 수
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// 실패한 전송 시도 수
    pub fn failed_attempts(&self) -> u64 {
        self.failed_attempts.load(Ordering::Relaxed)
    }

    /// 재시도 대기 중인 메시지 수
    pub fn pending_retries(&self) -> usize {
        self.pending_retries.load(Ordering::Relaxed)
    }
}

/// 생산자 핸들
///
/// 복제해서 여러 구성 요소가 함께 사용할 수 있습니다.
/// 모든 핸들이 drop되면 워커는 남은 재시도를 비운 뒤 종료합니다.
#[derive(Debug, Clone)]
pub struct ReporterHandle {
    tx: mpsc::Sender<OutboundMessage>,
    host: Arc<HostInfo>,
    stats: Arc<ReporterStats>,
}

impl ReporterHandle {
    /// 메시지를 큐에 넣습니다. 큐가 가득 차면 자리가 날 때까지 대기합니다.
    pub async fn enqueue(
        &self,
        route: impl Into<String>,
        payload: Value,
    ) -> Result<(), ReporterError> {
        self.send(OutboundMessage::new(route, payload)).await
    }

    /// 대기 없이 큐에 넣습니다.
    pub fn try_enqueue(
        &self,
        route: impl Into<String>,
        payload: Value,
    ) -> Result<(), ReporterError> {
        self.try_send(OutboundMessage::new(route, payload))
    }

    /// 머신 등록 이벤트를 보냅니다.
    pub async fn register_machine(&self, host: &HostInfo) -> Result<(), ReporterError> {
        self.send(OutboundMessage::registration(host)).await
    }

    /// 상태 변경 이벤트를 보냅니다.
    pub async fn report_state(
        &self,
        state: MachineState,
        detail: &str,
    ) -> Result<(), ReporterError> {
        self.send(OutboundMessage::state_change(&self.host, state, detail))
            .await
    }

    /// 대기 없이 상태 변경 이벤트를 넣습니다. 종료 경로에서 사용합니다.
    pub fn try_report_state(&self, state: MachineState, detail: &str) -> Result<(), ReporterError> {
        self.try_send(OutboundMessage::state_change(&self.host, state, detail))
    }

    pub fn stats(&self) -> Arc<ReporterStats> {
        Arc::clone(&self.stats)
    }

    pub fn host(&self) -> &HostInfo {
        &self.host
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), ReporterError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| ReporterError::QueueClosed)
    }

    fn try_send(&self, message: OutboundMessage) -> Result<(), ReporterError> {
        self.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ReporterError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => ReporterError::QueueClosed,
        })
    }
}

/// 전송 워커
pub struct Reporter<T: Transport> {
    config: DeliveryConfig,
    transport: Arc<T>,
    rx: mpsc::Receiver<OutboundMessage>,
    retries: RetryBuffer,
    stats: Arc<ReporterStats>,
}

impl<T: Transport> Reporter<T> {
    /// 워커와 생산자 핸들을 함께 생성합니다.
    ///
    /// 용량 0은 1로 올립니다. 값 범위는 [`DeliveryConfig::validate`]로 미리 확인하세요.
    pub fn new(config: DeliveryConfig, transport: Arc<T>, host: HostInfo) -> (Self, ReporterHandle) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let stats = Arc::new(ReporterStats::default());
        let retries = RetryBuffer::new(config.max_pending_retries.max(1));

        let handle = ReporterHandle {
            tx,
            host: Arc::new(host),
            stats: Arc::clone(&stats),
        };
        let reporter = Self {
            config,
            transport,
            rx,
            retries,
            stats,
        };
        (reporter, handle)
    }

    /// 워커 루프를 실행합니다.
    ///
    /// 큐가 닫히고 재시도 버퍼가 비면 반환합니다.
    pub async fn run(mut self) {
        let period = self.config.flush_interval.max(std::time::Duration::from_millis(1));
        let mut flush = tokio::time::interval_at(Instant::now() + period, period);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut open = true;
        info!(
            base_url = %self.config.base_url,
            queue_capacity = self.config.queue_capacity,
            "delivery worker started"
        );

        loop {
            if !open && self.retries.is_empty() {
                break;
            }
            let next_due = self.retries.next_due();

            tokio::select! {
                received = self.rx.recv(), if open && !self.retries.is_full() => {
                    match received {
                        Some(message) => self.attempt(message).await,
                        None => {
                            open = false;
                            debug!(pending = self.retries.len(), "all producers dropped");
                        }
                    }
                }
                _ = tokio::time::sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                    self.flush_due().await;
                }
                _ = flush.tick() => {
                    self.flush_due().await;
                    debug!(
                        pending_retries = self.retries.len(),
                        delivered = self.stats.delivered(),
                        failed_attempts = self.stats.failed_attempts(),
                        "delivery worker heartbeat"
                    );
                }
            }
        }

        info!(delivered = self.stats.delivered(), "delivery worker stopped");
    }

    /// 현재 시각 기준 due인 재시도를 보냅니다.
    ///
    /// 시작 시점의 버퍼 크기만큼만 처리해서, 이번 flush에서 다시 실패한 메시지는 다음 차례로 넘깁니다.
    async fn flush_due(&mut self) {
        let now = Instant::now();
        let budget = self.retries.len();
        for _ in 0..budget {
            let Some(message) = self.retries.pop_due(now) else {
                break;
            };
            self.attempt(message).await;
        }
        self.update_pending();
    }

    async fn attempt(&mut self, mut message: OutboundMessage) {
        message.attempt = message.attempt.saturating_add(1);

        match self.transport.deliver(&message).await {
            Ok(()) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::REPORTER_DELIVERED_TOTAL, m::LABEL_ROUTE => message.route.clone())
                    .increment(1);
                info!(route = %message.route, attempt = message.attempt, "event delivered");
            }
            Err(e) => {
                self.stats.failed_attempts.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::REPORTER_FAILED_ATTEMPTS_TOTAL, m::LABEL_ROUTE => message.route.clone())
                    .increment(1);
                warn!(
                    route = %message.route,
                    attempt = message.attempt,
                    retry_in_secs = self.config.retry_delay.as_secs(),
                    error = %e,
                    "event delivery failed, scheduling retry"
                );
                let due = Instant::now() + self.config.retry_delay;
                self.retries.push(due, message);
            }
        }
        self.update_pending();
    }

    fn update_pending(&self) {
        let pending = self.retries.len();
        self.stats.pending_retries.store(pending, Ordering::Relaxed);
        metrics::gauge!(m::REPORTER_PENDING_RETRIES).set(pending as f64);
    }
}

/// 결과를 미리 지정하는 테스트용 전송기
#[cfg(test)]
#[derive(Default)]
pub struct MockTransport {
    script: std::sync::Mutex<std::collections::VecDeque<Result<(), ReporterError>>>,
    /// 전송된 (경로, 시도 번호) 기록
    pub seen: std::sync::Mutex<Vec<(String, u32)>>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 다음 `n`번의 전송을 실패시킵니다. 스크립트가 비면 성공합니다.
    pub fn with_failures(self, n: usize) -> Self {
        if let Ok(mut script) = self.script.lock() {
            for _ in 0..n {
                script.push_back(Err(ReporterError::Transport("connection refused".to_owned())));
            }
        }
        self
    }

    pub fn attempts(&self) -> Vec<u32> {
        self.seen
            .lock()
            .map(|s| s.iter().map(|(_, a)| *a).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl Transport for MockTransport {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), ReporterError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((message.route.clone(), message.attempt));
        }
        self.script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or(Ok(()))
    }
}
