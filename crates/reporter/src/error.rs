//! 리포터 에러 타입

use rigwatch_core::error::{ConfigError, PipelineError, RigwatchError};

/// 리포터 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ReporterError {
    /// 연결/타임아웃 등 전송 실패
    #[error("transport error: {0}")]
    Transport(String),

    /// 200 이외의 HTTP 상태
    #[error("unexpected http status: {0}")]
    HttpStatus(u16),

    /// 응답 envelope의 code가 0이 아님
    #[error("rejected by control plane: code {code}: {msg}")]
    Envelope {
        /// envelope code
        code: i64,
        /// envelope msg
        msg: String,
    },

    /// 응답 본문 해석 실패
    #[error("decode error: {0}")]
    Decode(String),

    /// 큐가 가득 참 (`try_enqueue`)
    #[error("delivery queue full")]
    QueueFull,

    /// 워커가 종료됨
    #[error("delivery queue closed")]
    QueueClosed,

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<ReporterError> for RigwatchError {
    fn from(err: ReporterError) -> Self {
        match err {
            ReporterError::Config { field, reason } => {
                RigwatchError::Config(ConfigError::InvalidValue { field, reason })
            }
            ReporterError::QueueFull | ReporterError::QueueClosed => {
                RigwatchError::Pipeline(PipelineError::ChannelSend(err.to_string()))
            }
            other => RigwatchError::Pipeline(PipelineError::Delivery(other.to_string())),
        }
    }
}
