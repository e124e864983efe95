//! 로그 모니터 설정
//!
//! [`LogMonitorConfig`]는 core의 [`MonitorConfig`]와 [`MinerConfig`]를
//! 합쳐 로그 모니터 내부에서 쓰는 형태(`Duration`, `PathBuf`, `Option`)로 바꿉니다.
//!
//! # 사용 예시
//! ```ignore
//! use rigwatch_core::config::RigwatchConfig;
//! use rigwatch_log_monitor::config::LogMonitorConfig;
//!
//! let core = RigwatchConfig::default();
//! let config = LogMonitorConfig::from_core(&core.monitor, &core.miner);
//! config.validate()?;
//! ```

use std::path::PathBuf;
use std::time::Duration;

use rigwatch_core::config::{MinerConfig, MonitorConfig, SourceConfig};

use crate::error::LogMonitorError;

/// 로그 모니터 설정
#[derive(Debug, Clone)]
pub struct LogMonitorConfig {
    /// 감시 소스 목록
    pub sources: Vec<SourceConfig>,
    /// 파일 상태 체크 주기
    pub poll_interval: Duration,
    /// 체크포인트 디렉토리
    pub checkpoint_dir: PathBuf,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
    /// 추가 규칙 파일
    pub rules_file: Option<PathBuf>,
    /// 체인 조회 호스트 (설정 시 채굴 분석기의 대상 호스트가 됨)
    pub chain_api_url: Option<String>,
    /// 체인 조회 bearer 토큰
    pub chain_api_token: Option<String>,
    /// 분류 주기
    pub classify_interval: Duration,
    /// 체인 조회 타임아웃
    pub lookup_timeout: Duration,
    /// 분류 대기 블록 최대 개수
    pub max_pending_blocks: usize,
}

impl Default for LogMonitorConfig {
    fn default() -> Self {
        Self::from_core(&MonitorConfig::default(), &MinerConfig::default())
    }
}

impl LogMonitorConfig {
    /// core 설정 섹션에서 생성합니다.
    pub fn from_core(monitor: &MonitorConfig, miner: &MinerConfig) -> Self {
        Self {
            sources: monitor.sources.clone(),
            poll_interval: Duration::from_millis(monitor.poll_interval_ms),
            checkpoint_dir: PathBuf::from(&monitor.checkpoint_dir),
            max_line_length: monitor.max_line_length,
            rules_file: non_empty(&monitor.rules_file).map(PathBuf::from),
            chain_api_url: non_empty(&miner.chain_api_url),
            chain_api_token: non_empty(&miner.chain_api_token),
            classify_interval: Duration::from_secs(miner.classify_interval_secs),
            lookup_timeout: Duration::from_secs(miner.lookup_timeout_secs),
            max_pending_blocks: miner.max_pending_blocks,
        }
    }

    /// 설정 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogMonitorError> {
        if self.poll_interval.is_zero() {
            return Err(config_err("poll_interval", "must be greater than 0"));
        }
        if self.max_line_length == 0 {
            return Err(config_err("max_line_length", "must be greater than 0"));
        }
        if self.classify_interval.is_zero() {
            return Err(config_err("classify_interval", "must be greater than 0"));
        }
        if self.max_pending_blocks == 0 {
            return Err(config_err("max_pending_blocks", "must be greater than 0"));
        }
        if self.checkpoint_dir.as_os_str().is_empty() {
            return Err(config_err("checkpoint_dir", "must not be empty"));
        }
        for source in &self.sources {
            if source.path.is_empty() {
                return Err(config_err("sources.path", "must not be empty"));
            }
        }
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn config_err(field: &str, reason: &str) -> LogMonitorError {
    LogMonitorError::Config {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigwatch_core::Role;

    #[test]
    fn from_core_converts_units() {
        let mut monitor = MonitorConfig::default();
        monitor.poll_interval_ms = 250;
        monitor.sources.push(SourceConfig {
            path: "/var/log/miner.log".to_owned(),
            role: Role::Miner,
        });
        let mut miner = MinerConfig::default();
        miner.chain_api_url = "http://127.0.0.1:1234".to_owned();

        let config = LogMonitorConfig::from_core(&monitor, &miner);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.classify_interval, Duration::from_secs(30));
        assert_eq!(config.chain_api_url.as_deref(), Some("http://127.0.0.1:1234"));
        assert!(config.chain_api_token.is_none());
        assert!(config.rules_file.is_none());
        assert_eq!(config.sources.len(), 1);
    }

    #[test]
    fn default_passes_validation() {
        LogMonitorConfig::default().validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_pending_bound() {
        let config = LogMonitorConfig {
            max_pending_blocks: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_pending_blocks"));
    }

    #[test]
    fn whitespace_rules_file_is_none() {
        let monitor = MonitorConfig {
            rules_file: "   ".to_owned(),
            ..Default::default()
        };
        let config = LogMonitorConfig::from_core(&monitor, &MinerConfig::default());
        assert!(config.rules_file.is_none());
    }
}
