//! 로그 파일 테일러
//!
//! 로그 파일 하나를 `tail -F`처럼 따라 읽으며 새 라인을 분석기로 넘깁니다.
//!
//! # 상태 전이
//! ```text
//! Init ──(체크포인트 로드)──► Waiting ◄──┐   (파일 없음, 폴링)
//!                               │        │
//!                               ▼        │
//!                           Following ──► Reopening
//!                    (로테이션 / truncation / 삭제 감지)
//! ```
//!
//! truncation은 크기 감소뿐 아니라 파일 앞부분(head fingerprint)이 바뀐 경우로도
//! 감지합니다. copytruncate 직후 파일이 이전 오프셋보다 다시 커져도 놓치지 않습니다.
//!
//! # 라인 처리
//! 1. JSON 파싱에 실패한 라인은 조용히 버립니다.
//! 2. 타임스탬프가 현재 체크포인트보다 엄격히 늦지 않으면 버립니다.
//! 3. 분석기에 넘기고 ack를 기다린 뒤 체크포인트를 기록합니다.
//!
//! 파일을 열 때마다 처음부터 읽으므로, 재시작이나 로테이션 후의 중복 억제는
//! 전적으로 타임스탬프 비교에 의존합니다.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rigwatch_core::config::SourceConfig;
use rigwatch_core::metrics as m;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::error::LogMonitorError;
use crate::handoff::LineSender;
use crate::parser::JsonLineParser;

/// 한 번에 읽는 최대 바이트 수
const READ_CHUNK_BYTES: usize = 64 * 1024;

/// head fingerprint로 비교하는 파일 앞부분 바이트 수
const HEAD_FINGERPRINT_BYTES: usize = 256;

/// 테일러 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailerState {
    /// 체크포인트 로드 전
    Init,
    /// 파일이 아직 없어 폴링 중
    Waiting,
    /// 파일을 따라 읽는 중
    Following,
    /// 로테이션/truncation 감지 후 다시 여는 중
    Reopening,
}

/// 테일러 설정
#[derive(Debug, Clone)]
pub struct TailerConfig {
    /// 감시 파일 경로
    pub path: PathBuf,
    /// 체크포인트 식별자
    pub checkpoint_id: String,
    /// 메트릭/로그 레이블용 소스 이름
    pub source: String,
    /// 파일 상태 체크 주기
    pub poll_interval: Duration,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
}

impl TailerConfig {
    /// 감시 소스 설정에서 생성합니다.
    pub fn from_source(source: &SourceConfig, poll_interval: Duration, max_line_length: usize) -> Self {
        Self {
            path: PathBuf::from(&source.path),
            checkpoint_id: source.checkpoint_id(),
            source: source.base_name(),
            poll_interval,
            max_line_length,
        }
    }
}

/// 경로의 파일이 바뀐 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rotation {
    /// 다른 파일로 교체되었거나 삭제됨. 이전 핸들에 남은 라인은 유효
    Replaced,
    /// 같은 파일이 잘림. 이전 오프셋 이후 내용은 새 내용의 일부
    Truncated,
}

/// 열린 파일의 읽기 상태
struct OpenFile {
    file: File,
    /// 지금까지 읽은 바이트 수
    offset: u64,
    /// 열 당시의 inode (Unix 전용)
    inode: Option<u64>,
    /// 개행을 아직 만나지 못한 부분 라인
    pending: Vec<u8>,
    /// 최대 길이를 넘긴 라인의 나머지를 버리는 중
    discarding: bool,
    /// 지금까지 읽은 파일 앞부분 (최대 `HEAD_FINGERPRINT_BYTES`)
    head: Vec<u8>,
}

/// 로그 파일 테일러
pub struct Tailer<S: CheckpointStore> {
    config: TailerConfig,
    store: Arc<S>,
    parser: JsonLineParser,
    sender: LineSender,
    /// 현재 유효한 체크포인트 (저장 실패와 무관하게 전달 후 전진)
    checkpoint: Option<DateTime<Utc>>,
    state_tx: watch::Sender<TailerState>,
}

impl<S: CheckpointStore> Tailer<S> {
    /// 새 테일러를 생성합니다.
    pub fn new(config: TailerConfig, store: Arc<S>, sender: LineSender) -> Self {
        let parser = JsonLineParser::new(config.max_line_length);
        let (state_tx, _) = watch::channel(TailerState::Init);
        Self {
            config,
            store,
            parser,
            sender,
            checkpoint: None,
            state_tx,
        }
    }

    /// 상태 변화를 구독합니다.
    pub fn subscribe_state(&self) -> watch::Receiver<TailerState> {
        self.state_tx.subscribe()
    }

    /// 테일러 설정
    pub fn config(&self) -> &TailerConfig {
        &self.config
    }

    /// 테일러를 실행합니다.
    ///
    /// 분석기 쪽 채널이 닫히기 전까지 반환하지 않습니다.
    /// `tokio::spawn`으로 별도 태스크에서 호출하세요.
    pub async fn run(mut self) -> Result<(), LogMonitorError> {
        self.set_state(TailerState::Init);
        self.checkpoint = self.load_checkpoint().await;

        info!(
            path = %self.config.path.display(),
            checkpoint = ?self.checkpoint,
            "starting tailer"
        );

        let mut buf = vec![0u8; READ_CHUNK_BYTES];
        loop {
            let mut open = self.open().await;
            self.set_state(TailerState::Following);

            self.follow(&mut open, &mut buf).await?;

            self.set_state(TailerState::Reopening);
            metrics::counter!(m::TAILER_REOPENS_TOTAL, m::LABEL_SOURCE => self.config.source.clone())
                .increment(1);
            info!(
                path = %self.config.path.display(),
                "log file rotated or truncated, reopening"
            );
        }
    }

    fn set_state(&self, state: TailerState) {
        self.state_tx.send_replace(state);
    }

    async fn load_checkpoint(&self) -> Option<DateTime<Utc>> {
        match self.store.load(&self.config.checkpoint_id).await {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                warn!(
                    checkpoint = %self.config.checkpoint_id,
                    error = %e,
                    "failed to load checkpoint, reading from beginning of file"
                );
                None
            }
        }
    }

    /// 파일이 열릴 때까지 폴링합니다.
    async fn open(&self) -> OpenFile {
        let mut announced = false;
        loop {
            match File::open(&self.config.path).await {
                Ok(file) => {
                    let inode = match file.metadata().await {
                        Ok(meta) => inode_of(&meta),
                        Err(_) => None,
                    };
                    debug!(path = %self.config.path.display(), "opened log file");
                    return OpenFile {
                        file,
                        offset: 0,
                        inode,
                        pending: Vec::new(),
                        discarding: false,
                        head: Vec::new(),
                    };
                }
                Err(e) => {
                    if !announced {
                        self.set_state(TailerState::Waiting);
                        info!(
                            path = %self.config.path.display(),
                            error = %e,
                            "log file not available, waiting"
                        );
                        announced = true;
                    }
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
    }

    /// 로테이션이 감지될 때까지 파일을 따라 읽습니다.
    ///
    /// 폴링 대기 후에는 읽기 전에 먼저 로테이션을 확인합니다. 잘린 파일을 이전
    /// 오프셋부터 읽으면 새 내용의 앞부분을 건너뛰게 됩니다.
    async fn follow(&mut self, open: &mut OpenFile, buf: &mut [u8]) -> Result<(), LogMonitorError> {
        loop {
            self.drain(open, buf).await?;
            tokio::time::sleep(self.config.poll_interval).await;

            match self.rotated(open).await {
                None => {}
                Some(Rotation::Replaced) => {
                    // 이전 파일 핸들에 남은 라인을 먼저 소진
                    self.drain(open, buf).await?;
                    if !open.discarding && !open.pending.is_empty() {
                        let rest = std::mem::take(&mut open.pending);
                        self.handle_line(&rest).await?;
                    }
                    return Ok(());
                }
                Some(Rotation::Truncated) => {
                    debug!(
                        path = %self.config.path.display(),
                        offset = open.offset,
                        "log file truncated in place"
                    );
                    return Ok(());
                }
            }
        }
    }

    /// 현재 핸들에서 읽을 수 있는 만큼 읽어 처리합니다.
    async fn drain(&mut self, open: &mut OpenFile, buf: &mut [u8]) -> Result<(), LogMonitorError> {
        loop {
            let n = self.read_some(open, buf).await;
            if n == 0 {
                return Ok(());
            }
            self.consume(open, &buf[..n]).await?;
        }
    }

    async fn read_some(&self, open: &mut OpenFile, buf: &mut [u8]) -> usize {
        match open.file.read(buf).await {
            Ok(n) => {
                open.offset += n as u64;
                if open.head.len() < HEAD_FINGERPRINT_BYTES {
                    let take = (HEAD_FINGERPRINT_BYTES - open.head.len()).min(n);
                    open.head.extend_from_slice(&buf[..take]);
                }
                n
            }
            Err(e) => {
                warn!(path = %self.config.path.display(), error = %e, "read failed");
                0
            }
        }
    }

    /// 읽은 바이트를 라인 단위로 나눠 처리합니다.
    async fn consume(&mut self, open: &mut OpenFile, chunk: &[u8]) -> Result<(), LogMonitorError> {
        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            let head = &rest[..pos];
            rest = &rest[pos + 1..];

            if open.discarding {
                open.discarding = false;
                open.pending.clear();
                continue;
            }

            if open.pending.is_empty() {
                self.handle_line(head).await?;
            } else {
                open.pending.extend_from_slice(head);
                let line = std::mem::take(&mut open.pending);
                self.handle_line(&line).await?;
            }
        }

        if !open.discarding && !rest.is_empty() {
            open.pending.extend_from_slice(rest);
            if open.pending.len() > self.config.max_line_length {
                debug!(
                    path = %self.config.path.display(),
                    "dropping line longer than max_line_length"
                );
                open.pending.clear();
                open.discarding = true;
            }
        }
        Ok(())
    }

    /// 완성된 라인 하나를 처리합니다: 파싱 → 중복 억제 → 핸드오프 → 체크포인트.
    async fn handle_line(&mut self, bytes: &[u8]) -> Result<(), LogMonitorError> {
        if bytes.len() > self.config.max_line_length {
            return Ok(());
        }
        let Ok(text) = std::str::from_utf8(bytes) else {
            return Ok(());
        };
        if text.trim().is_empty() {
            return Ok(());
        }
        let Ok(line) = self.parser.parse(text) else {
            return Ok(());
        };
        if self.checkpoint.is_some_and(|cp| line.timestamp <= cp) {
            return Ok(());
        }

        let timestamp = line.timestamp;
        self.sender.forward(line).await?;
        self.checkpoint = Some(timestamp);
        metrics::counter!(m::TAILER_LINES_FORWARDED_TOTAL, m::LABEL_SOURCE => self.config.source.clone())
            .increment(1);

        if let Err(e) = self.store.save(&self.config.checkpoint_id, timestamp).await {
            metrics::counter!(m::CHECKPOINT_WRITE_FAILURES_TOTAL).increment(1);
            warn!(
                checkpoint = %self.config.checkpoint_id,
                error = %e,
                "failed to persist checkpoint"
            );
        }
        Ok(())
    }

    /// 현재 경로의 파일이 열린 파일과 달라졌는지 확인합니다.
    async fn rotated(&self, open: &OpenFile) -> Option<Rotation> {
        let Ok(meta) = tokio::fs::metadata(&self.config.path).await else {
            return Some(Rotation::Replaced);
        };
        if inode_of(&meta) != open.inode {
            return Some(Rotation::Replaced);
        }
        if meta.len() < open.offset || !self.head_matches(&open.head).await {
            return Some(Rotation::Truncated);
        }
        None
    }

    /// 경로의 파일 앞부분이 이미 읽은 앞부분과 같은지 확인합니다.
    async fn head_matches(&self, head: &[u8]) -> bool {
        if head.is_empty() {
            return true;
        }
        let Ok(mut file) = File::open(&self.config.path).await else {
            return false;
        };
        let mut current = vec![0u8; head.len()];
        match file.read_exact(&mut current).await {
            Ok(_) => current == head,
            Err(_) => false,
        }
    }
}

#[cfg(unix)]
fn inode_of(meta: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

#[cfg(not(unix))]
fn inode_of(_meta: &std::fs::Metadata) -> Option<u64> {
    None
}
