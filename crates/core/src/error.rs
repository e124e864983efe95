//! 에러 타입 — 도메인별 에러 정의

/// rigwatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum RigwatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 채널 수신 실패
    #[error("channel receive failed: {0}")]
    ChannelRecv(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 외부 전송 실패 (리포터, 체인 조회 등)
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// 이미 실행 중
    #[error("already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("not running")]
    NotRunning,
}

/// 파싱 에러
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 로그 라인 파싱 실패
    #[error("malformed log line: {reason}")]
    MalformedLine { reason: String },

    /// 타임스탬프 파싱 실패
    #[error("invalid timestamp '{value}'")]
    Timestamp { value: String },

    /// 입력 데이터 초과
    #[error("input too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_into_top_level() {
        let err: RigwatchError = ConfigError::InvalidValue {
            field: "monitor.sources".to_owned(),
            reason: "duplicate".to_owned(),
        }
        .into();
        assert!(matches!(err, RigwatchError::Config(_)));
        assert!(err.to_string().contains("monitor.sources"));
    }

    #[test]
    fn too_large_display_includes_limits() {
        let err = ParseError::TooLarge {
            size: 70_000,
            max: 65_536,
        };
        let msg = err.to_string();
        assert!(msg.contains("70000"));
        assert!(msg.contains("65536"));
    }
}
