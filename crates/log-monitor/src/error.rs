//! 로그 모니터 에러 타입
//!
//! [`LogMonitorError`]는 테일러, 분석기, 체인 조회 등 로그 모니터 내부에서
//! 발생하는 모든 에러를 표현합니다. `From<LogMonitorError> for RigwatchError`
//! 변환이 구현되어 있어 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use rigwatch_core::error::{ParseError, PipelineError, RigwatchError};

/// 로그 모니터 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogMonitorError {
    /// 로그 라인 파싱 실패
    #[error("parse error: {reason}")]
    Parse {
        /// 실패 사유
        reason: String,
    },

    /// 체크포인트 읽기/쓰기 실패
    #[error("checkpoint error: {id}: {reason}")]
    Checkpoint {
        /// 체크포인트 식별자
        id: String,
        /// 실패 사유
        reason: String,
    },

    /// 체인 높이 조회 실패 (재시도 대상)
    #[error("chain lookup failed: {host} at height {height}: {reason}")]
    ChainLookup {
        /// 조회 대상 호스트
        host: String,
        /// 조회 높이
        height: u64,
        /// 실패 사유
        reason: String,
    },

    /// 규칙 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 규칙 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 규칙 유효성 검증 실패
    #[error("rule validation error: rule '{rule_id}': {reason}")]
    RuleValidation {
        /// 문제가 된 규칙 ID
        rule_id: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러 (핸드오프 상대가 사라짐)
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<LogMonitorError> for RigwatchError {
    fn from(err: LogMonitorError) -> Self {
        match err {
            LogMonitorError::Parse { reason } => {
                RigwatchError::Parse(ParseError::MalformedLine { reason })
            }
            LogMonitorError::Io(e) => RigwatchError::Io(e),
            other => RigwatchError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
