//! 설정 관리 — rigwatch.toml 파싱 및 런타임 설정
//!
//! [`RigwatchConfig`]는 모든 구성 요소의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`RIGWATCH_REPORTER_BASE_URL=https://...` 형식)
//! 3. 설정 파일 (`rigwatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), rigwatch_core::error::RigwatchError> {
//! use rigwatch_core::config::RigwatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = RigwatchConfig::load("rigwatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = RigwatchConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, RigwatchError};
use crate::types::Role;

/// rigwatch 통합 설정
///
/// `rigwatch.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 구성 요소는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RigwatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 메트릭 엔드포인트 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// 로그 감시 설정
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// 채굴 분석기 설정 (체인 조회)
    #[serde(default)]
    pub miner: MinerConfig,
    /// 외부 보고 설정
    #[serde(default)]
    pub reporter: ReporterConfig,
    /// 정적 호스트 정보
    #[serde(default)]
    pub host: HostConfig,
}

impl RigwatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RigwatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, RigwatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RigwatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                RigwatchError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, RigwatchError> {
        toml::from_str(toml_str).map_err(|e| {
            RigwatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `RIGWATCH_{SECTION}_{FIELD}`
    /// 감시 소스 목록(`monitor.sources`)은 파일에서만 설정합니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "RIGWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "RIGWATCH_GENERAL_LOG_FORMAT");

        // Metrics
        override_bool(&mut self.metrics.enabled, "RIGWATCH_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "RIGWATCH_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "RIGWATCH_METRICS_PORT");

        // Monitor
        override_u64(
            &mut self.monitor.poll_interval_ms,
            "RIGWATCH_MONITOR_POLL_INTERVAL_MS",
        );
        override_string(
            &mut self.monitor.checkpoint_dir,
            "RIGWATCH_MONITOR_CHECKPOINT_DIR",
        );
        override_usize(
            &mut self.monitor.max_line_length,
            "RIGWATCH_MONITOR_MAX_LINE_LENGTH",
        );
        override_string(&mut self.monitor.rules_file, "RIGWATCH_MONITOR_RULES_FILE");

        // Miner
        override_string(&mut self.miner.chain_api_url, "RIGWATCH_MINER_CHAIN_API_URL");
        override_string(
            &mut self.miner.chain_api_token,
            "RIGWATCH_MINER_CHAIN_API_TOKEN",
        );
        override_u64(
            &mut self.miner.classify_interval_secs,
            "RIGWATCH_MINER_CLASSIFY_INTERVAL_SECS",
        );

        // Reporter
        override_bool(&mut self.reporter.enabled, "RIGWATCH_REPORTER_ENABLED");
        override_string(&mut self.reporter.base_url, "RIGWATCH_REPORTER_BASE_URL");
        override_u64(
            &mut self.reporter.retry_delay_secs,
            "RIGWATCH_REPORTER_RETRY_DELAY_SECS",
        );
        override_u64(
            &mut self.reporter.flush_interval_secs,
            "RIGWATCH_REPORTER_FLUSH_INTERVAL_SECS",
        );

        // Host
        override_string(&mut self.host.hostname, "RIGWATCH_HOST_HOSTNAME");
        override_string(&mut self.host.machine_id, "RIGWATCH_HOST_MACHINE_ID");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), RigwatchError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(invalid("metrics.port", "must be greater than 0"));
            }
            if !self.metrics.endpoint.starts_with('/') {
                return Err(invalid("metrics.endpoint", "must start with '/'"));
            }
        }

        self.validate_monitor()?;

        if self.miner.classify_interval_secs == 0 {
            return Err(invalid(
                "miner.classify_interval_secs",
                "must be greater than 0",
            ));
        }
        if self.miner.lookup_timeout_secs == 0 {
            return Err(invalid("miner.lookup_timeout_secs", "must be greater than 0"));
        }
        if self.miner.max_pending_blocks == 0 {
            return Err(invalid("miner.max_pending_blocks", "must be greater than 0"));
        }
        if !self.miner.chain_api_url.is_empty() && !is_http_url(&self.miner.chain_api_url) {
            return Err(invalid(
                "miner.chain_api_url",
                "must start with http:// or https://",
            ));
        }

        if self.reporter.enabled {
            if !is_http_url(&self.reporter.base_url) {
                return Err(invalid(
                    "reporter.base_url",
                    "must start with http:// or https:// when reporter is enabled",
                ));
            }
            let positive = [
                ("reporter.queue_capacity", self.reporter.queue_capacity as u64),
                ("reporter.retry_delay_secs", self.reporter.retry_delay_secs),
                ("reporter.flush_interval_secs", self.reporter.flush_interval_secs),
                (
                    "reporter.max_pending_retries",
                    self.reporter.max_pending_retries as u64,
                ),
                (
                    "reporter.request_timeout_secs",
                    self.reporter.request_timeout_secs,
                ),
            ];
            for (field, value) in positive {
                if value == 0 {
                    return Err(invalid(field, "must be greater than 0"));
                }
            }
        }

        Ok(())
    }

    fn validate_monitor(&self) -> Result<(), RigwatchError> {
        let monitor = &self.monitor;

        if monitor.poll_interval_ms == 0 {
            return Err(invalid("monitor.poll_interval_ms", "must be greater than 0"));
        }
        if monitor.max_line_length == 0 {
            return Err(invalid("monitor.max_line_length", "must be greater than 0"));
        }
        if monitor.checkpoint_dir.is_empty() {
            return Err(invalid("monitor.checkpoint_dir", "must not be empty"));
        }

        let mut seen = HashSet::new();
        for source in &monitor.sources {
            if source.path.is_empty() {
                return Err(invalid("monitor.sources.path", "must not be empty"));
            }
            if !Path::new(&source.path).is_absolute() {
                return Err(invalid(
                    "monitor.sources.path",
                    format!("'{}' must be an absolute path", source.path),
                ));
            }
            let id = source.checkpoint_id();
            if !seen.insert(id.clone()) {
                return Err(invalid(
                    "monitor.sources",
                    format!("two sources share checkpoint id '{id}'"),
                ));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> RigwatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 메트릭 엔드포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

/// 로그 감시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// 파일 상태 체크 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 체크포인트 디렉토리
    pub checkpoint_dir: String,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
    /// 추가 규칙 YAML 파일 (빈 문자열이면 기본 규칙만 사용)
    pub rules_file: String,
    /// 감시 소스 (`[[monitor.sources]]`)
    pub sources: Vec<SourceConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            checkpoint_dir: "/var/lib/rigwatch/checkpoints".to_owned(),
            max_line_length: 64 * 1024, // 64KB
            rules_file: String::new(),
            sources: Vec::new(),
        }
    }
}

/// 감시 소스 하나 (로그 파일 + 분석기 역할)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// 로그 파일 절대 경로
    pub path: String,
    /// 분석기 역할
    pub role: Role,
}

impl SourceConfig {
    /// 파일 base name (레이블, 체크포인트 파일명에 사용)
    pub fn base_name(&self) -> String {
        Path::new(&self.path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.replace('/', "_"))
    }

    /// 체크포인트 식별자: `<base name>.<role>`
    pub fn checkpoint_id(&self) -> String {
        format!("{}.{}", self.base_name(), self.role)
    }
}

/// 채굴 분석기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// 체인 조회 API 주소 (빈 문자열이면 분류하지 않음)
    pub chain_api_url: String,
    /// 체인 조회 API bearer 토큰 (선택)
    pub chain_api_token: String,
    /// 분류 주기 (초)
    pub classify_interval_secs: u64,
    /// 조회 타임아웃 (초)
    pub lookup_timeout_secs: u64,
    /// 분류 대기 블록 최대 개수
    pub max_pending_blocks: usize,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            chain_api_url: String::new(),
            chain_api_token: String::new(),
            classify_interval_secs: 30,
            lookup_timeout_secs: 10,
            max_pending_blocks: 1024,
        }
    }
}

/// 외부 보고 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 컨트롤 플레인 base URL
    pub base_url: String,
    /// 전송 큐 용량
    pub queue_capacity: usize,
    /// 실패 후 재시도 지연 (초)
    pub retry_delay_secs: u64,
    /// 주기적 flush 간격 (초)
    pub flush_interval_secs: u64,
    /// 재시도 버퍼 최대 크기
    pub max_pending_retries: usize,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            queue_capacity: 64,
            retry_delay_secs: 10,
            flush_interval_secs: 60,
            max_pending_retries: 1024,
            request_timeout_secs: 10,
        }
    }
}

/// 정적 호스트 정보
///
/// 하드웨어 인벤토리 수집은 외부에서 수행하고, 결과 문자열만 설정으로 받습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub hostname: String,
    pub machine_id: String,
    pub os: String,
    pub cpu: String,
    pub gpu: String,
    pub memory: String,
    pub disk: String,
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn source(path: &str, role: Role) -> SourceConfig {
        SourceConfig {
            path: path.to_owned(),
            role,
        }
    }

    #[test]
    fn default_config_has_sane_values() {
        let config = RigwatchConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert!(config.metrics.enabled);
        assert!(config.monitor.sources.is_empty());
        assert_eq!(config.miner.classify_interval_secs, 30);
        assert!(!config.reporter.enabled);
        assert_eq!(config.reporter.queue_capacity, 64);
    }

    #[test]
    fn default_config_passes_validation() {
        RigwatchConfig::default().validate().unwrap();
    }

    #[test]
    fn from_str_empty_toml_uses_defaults() {
        let config = RigwatchConfig::parse("").unwrap();
        assert_eq!(config.monitor.poll_interval_ms, 500);
        assert_eq!(config.monitor.checkpoint_dir, "/var/lib/rigwatch/checkpoints");
    }

    #[test]
    fn from_str_sources_and_sections() {
        let toml = r#"
[general]
log_level = "debug"

[[monitor.sources]]
path = "/var/log/lotus/miner.log"
role = "miner"

[[monitor.sources]]
path = "/var/log/lotus/miner.log"
role = "generic_error"

[miner]
chain_api_url = "http://127.0.0.1:1234"

[reporter]
enabled = true
base_url = "https://control.example.com"
retry_delay_secs = 5
"#;
        let config = RigwatchConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.monitor.sources.len(), 2);
        assert_eq!(config.monitor.sources[0].role, Role::Miner);
        assert_eq!(config.reporter.retry_delay_secs, 5);
        assert_eq!(config.reporter.flush_interval_secs, 60);
        config.validate().unwrap();
    }

    #[test]
    fn from_str_unknown_role_fails() {
        let toml = r#"
[[monitor.sources]]
path = "/var/log/x.log"
role = "harvester"
"#;
        let err = RigwatchConfig::parse(toml).unwrap_err();
        assert!(matches!(
            err,
            RigwatchError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn from_str_invalid_toml_returns_error() {
        let err = RigwatchConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            RigwatchError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = RigwatchConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = RigwatchConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_relative_source_path() {
        let mut config = RigwatchConfig::default();
        config.monitor.sources.push(source("logs/miner.log", Role::Miner));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn validate_rejects_colliding_checkpoint_ids() {
        let mut config = RigwatchConfig::default();
        config
            .monitor
            .sources
            .push(source("/a/miner.log", Role::Miner));
        config
            .monitor
            .sources
            .push(source("/b/miner.log", Role::Miner));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("miner.log.miner"));
    }

    #[test]
    fn same_file_with_different_roles_is_allowed() {
        let mut config = RigwatchConfig::default();
        config
            .monitor
            .sources
            .push(source("/a/miner.log", Role::Miner));
        config
            .monitor
            .sources
            .push(source("/a/miner.log", Role::GenericError));
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_reporter_without_url() {
        let mut config = RigwatchConfig::default();
        config.reporter.enabled = true;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("reporter.base_url"));
    }

    #[test]
    fn validate_rejects_zero_retry_delay_when_enabled() {
        let mut config = RigwatchConfig::default();
        config.reporter.enabled = true;
        config.reporter.base_url = "http://localhost:8080".to_owned();
        config.reporter.retry_delay_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("retry_delay_secs"));
    }

    #[test]
    fn validate_rejects_non_http_chain_url() {
        let mut config = RigwatchConfig::default();
        config.miner.chain_api_url = "ws://127.0.0.1:1234".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chain_api_url"));
    }

    #[test]
    fn checkpoint_id_uses_base_name_and_role() {
        let src = source("/var/log/lotus/plot-worker.log", Role::Plotter);
        assert_eq!(src.base_name(), "plot-worker.log");
        assert_eq!(src.checkpoint_id(), "plot-worker.log.plotter");
    }

    #[test]
    #[serial]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: serial 테스트에서만 환경변수를 조작합니다.
        unsafe { std::env::set_var("TEST_RIGWATCH_STR", "overridden") };
        override_string(&mut val, "TEST_RIGWATCH_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_RIGWATCH_STR") };
    }

    #[test]
    #[serial]
    fn env_override_u16_invalid_keeps_original() {
        let mut val = 9100u16;
        // SAFETY: serial 테스트에서만 환경변수를 조작합니다.
        unsafe { std::env::set_var("TEST_RIGWATCH_PORT_BAD", "99999") };
        override_u16(&mut val, "TEST_RIGWATCH_PORT_BAD");
        assert_eq!(val, 9100);
        unsafe { std::env::remove_var("TEST_RIGWATCH_PORT_BAD") };
    }

    #[test]
    #[serial]
    fn apply_env_overrides_sets_reporter_url() {
        let mut config = RigwatchConfig::default();
        // SAFETY: serial 테스트에서만 환경변수를 조작합니다.
        unsafe { std::env::set_var("RIGWATCH_REPORTER_BASE_URL", "https://cp.example.com") };
        config.apply_env_overrides();
        unsafe { std::env::remove_var("RIGWATCH_REPORTER_BASE_URL") };
        assert_eq!(config.reporter.base_url, "https://cp.example.com");
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_RIGWATCH_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let mut config = RigwatchConfig::default();
        config
            .monitor
            .sources
            .push(source("/var/log/plot.log", Role::Plotter));
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = RigwatchConfig::parse(&toml_str).unwrap();
        assert_eq!(parsed.monitor.sources, config.monitor.sources);
        assert_eq!(parsed.metrics.port, config.metrics.port);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = RigwatchConfig::from_file("/nonexistent/path/rigwatch.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RigwatchError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
