//! 체크포인트 저장소
//!
//! 감시 파일별로 마지막으로 분석기에 전달한 라인의 타임스탬프를 보관합니다.
//! 체크포인트가 없으면 에러가 아니라 "파일 처음부터 읽기"를 의미합니다.
//!
//! # 파일 형식
//! `<checkpoint_dir>/<base name>.<role>.checkpoint` 에 RFC 3339 타임스탬프 한 줄.
//!
//! ```text
//! 2024-05-01T02:00:00.500000000Z
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::LogMonitorError;

const CHECKPOINT_EXTENSION: &str = "checkpoint";

/// 체크포인트 저장소 trait
///
/// 테일러 하나가 체크포인트 id 하나를 소유합니다. 구현체는 서로 다른 id에
/// 대한 동시 호출을 허용해야 합니다.
pub trait CheckpointStore: Send + Sync + 'static {
    /// 체크포인트를 읽습니다. 없으면 `Ok(None)`.
    fn load(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<DateTime<Utc>>, LogMonitorError>> + Send;

    /// 체크포인트를 기록합니다.
    fn save(
        &self,
        id: &str,
        timestamp: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), LogMonitorError>> + Send;
}

/// 디렉토리 기반 체크포인트 저장소
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// 저장 디렉토리를 지정하여 생성합니다. 디렉토리는 첫 저장 시 생성됩니다.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 저장 디렉토리
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 체크포인트 파일 경로
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{CHECKPOINT_EXTENSION}"))
    }
}

impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, id: &str) -> Result<Option<DateTime<Utc>>, LogMonitorError> {
        let path = self.path_for(id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LogMonitorError::Checkpoint {
                    id: id.to_owned(),
                    reason: format!("failed to read {}: {e}", path.display()),
                });
            }
        };

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| LogMonitorError::Checkpoint {
                id: id.to_owned(),
                reason: format!("invalid timestamp '{trimmed}': {e}"),
            })
    }

    async fn save(&self, id: &str, timestamp: DateTime<Utc>) -> Result<(), LogMonitorError> {
        let checkpoint_err = |reason: String| LogMonitorError::Checkpoint {
            id: id.to_owned(),
            reason,
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| checkpoint_err(format!("failed to create {}: {e}", self.dir.display())))?;

        let path = self.path_for(id);
        let tmp = path.with_extension(format!("{CHECKPOINT_EXTENSION}.tmp"));
        let body = format!(
            "{}\n",
            timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
        );

        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| checkpoint_err(format!("failed to write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| checkpoint_err(format!("failed to replace {}: {e}", path.display())))?;

        Ok(())
    }
}

/// 테스트용 인메모리 저장소
#[cfg(test)]
#[derive(Default)]
pub struct MockCheckpointStore {
    /// 저장된 체크포인트
    pub entries: std::sync::Mutex<std::collections::HashMap<String, DateTime<Utc>>>,
    /// 저장 실패를 시뮬레이션할지 여부
    pub fail_saves: bool,
    /// 저장 호출 횟수
    pub save_calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 초기 체크포인트를 설정합니다.
    pub fn with_entry(self, id: &str, timestamp: DateTime<Utc>) -> Self {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(id.to_owned(), timestamp);
        }
        self
    }

    /// 저장 호출이 실패하도록 설정합니다.
    pub fn with_failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    pub fn get(&self, id: &str) -> Option<DateTime<Utc>> {
        self.entries.lock().ok().and_then(|e| e.get(id).copied())
    }
}

#[cfg(test)]
impl CheckpointStore for MockCheckpointStore {
    async fn load(&self, id: &str) -> Result<Option<DateTime<Utc>>, LogMonitorError> {
        Ok(self.get(id))
    }

    async fn save(&self, id: &str, timestamp: DateTime<Utc>) -> Result<(), LogMonitorError> {
        self.save_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.fail_saves {
            return Err(LogMonitorError::Checkpoint {
                id: id.to_owned(),
                reason: "mock failure".to_owned(),
            });
        }
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(id.to_owned(), timestamp);
        }
        Ok(())
    }
}
