//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 테일러가 만들어 분석기가 소비하는 로그 라인과
//! 분석기의 규칙 테이블을 고르는 역할(role)을 정의합니다.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 분석기 역할
///
/// 감시 대상 데몬의 종류에 따라 기본 규칙 테이블과 노출 카운터가 달라집니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// 블록 채굴 데몬 (mined block, fork 분류)
    Miner,
    /// 플롯 생성 작업자 (소요 시간 통계)
    Plotter,
    /// 풀노드 동기화 데몬
    FullnodeSync,
    /// 범용 에러 카운터
    GenericError,
}

impl Role {
    /// 모든 역할 (설정 검증, 규칙 파일 키 확인용)
    pub const ALL: [Role; 4] = [
        Role::Miner,
        Role::Plotter,
        Role::FullnodeSync,
        Role::GenericError,
    ];

    /// 설정 파일/메트릭 레이블에서 사용하는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Miner => "miner",
            Self::Plotter => "plotter",
            Self::FullnodeSync => "fullnode_sync",
            Self::GenericError => "generic_error",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "role".to_owned(),
                reason: format!(
                    "unknown role '{s}', expected one of: miner, plotter, fullnode_sync, generic_error"
                ),
            })
    }
}

/// 파싱된 로그 라인
///
/// 한 줄의 JSON 로그 레코드를 나타냅니다. 생성 이후 변경되지 않으며,
/// 테일러에서 바인딩된 분석기로 정확히 한 번 전달됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    /// 레코드 타임스탬프 (`ts`, UTC로 정규화)
    pub timestamp: DateTime<Utc>,
    /// 로그 레벨 (`level`)
    pub level: String,
    /// 로거 태그 (`logger`)
    pub logger: String,
    /// 소스 위치 (`caller`)
    pub caller: String,
    /// 메시지 (`msg`)
    pub message: String,
    /// 나머지 필드
    pub fields: serde_json::Map<String, serde_json::Value>,
    /// 원본 텍스트
    pub raw: String,
}

impl LogLine {
    /// 레벨이 주어진 값과 같은지 대소문자 무시 비교
    pub fn level_is(&self, level: &str) -> bool {
        self.level.eq_ignore_ascii_case(level)
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.timestamp.to_rfc3339(),
            self.level,
            self.logger,
            self.message,
        )
    }
}
