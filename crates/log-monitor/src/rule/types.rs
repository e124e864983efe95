//! 규칙 데이터 타입
//!
//! 내장 규칙 테이블과 운영자 규칙 파일(YAML)이 공유하는 규칙 정의입니다.

use rigwatch_core::Role;
use serde::{Deserialize, Serialize};

use crate::error::LogMonitorError;

/// 규칙 id 최대 길이
const MAX_RULE_ID_LEN: usize = 256;

/// 분석기가 직접 관리하는 카운터 이름 (규칙에서 사용 불가)
pub const RESERVED_COUNTERS: [&str; 2] = ["lines", "forked_blocks"];

/// 규칙 정의
///
/// # YAML 스키마
/// ```yaml
/// - id: gpu_oom
///   counter: gpu_out_of_memory
///   level: error
///   target: raw
///   match: contains
///   pattern: "CUDA out of memory"
/// - id: seal_time
///   counter: seal_precommit
///   match: regex
///   pattern: "precommit took ([0-9.]+)s"
///   action: timing
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// 규칙 고유 ID (역할 내에서 유일)
    pub id: String,
    /// 증가시킬 카운터 이름
    pub counter: String,
    /// 레벨 필터 (대소문자 무시)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// 로거 이름 필터
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    /// 매칭 대상 텍스트
    #[serde(default)]
    pub target: RuleTarget,
    /// 매칭 방식
    #[serde(default, rename = "match")]
    pub match_kind: MatchKind,
    /// 매칭 패턴
    pub pattern: String,
    /// 매칭 시 동작
    #[serde(default)]
    pub action: RuleAction,
}

impl RuleSpec {
    /// 메시지 부분 문자열 매칭 규칙을 만듭니다.
    pub fn contains(id: &str, counter: &str, pattern: &str) -> Self {
        Self {
            id: id.to_owned(),
            counter: counter.to_owned(),
            level: None,
            logger: None,
            target: RuleTarget::Message,
            match_kind: MatchKind::Contains,
            pattern: pattern.to_owned(),
            action: RuleAction::Count,
        }
    }

    /// 메시지 정규식 매칭 규칙을 만듭니다.
    pub fn regex(id: &str, counter: &str, pattern: &str) -> Self {
        Self {
            match_kind: MatchKind::Regex,
            ..Self::contains(id, counter, pattern)
        }
    }

    /// 레벨 필터를 지정합니다.
    pub fn with_level(mut self, level: &str) -> Self {
        self.level = Some(level.to_owned());
        self
    }

    /// 원본 라인 전체를 매칭 대상으로 지정합니다.
    pub fn on_raw(mut self) -> Self {
        self.target = RuleTarget::Raw;
        self
    }

    /// 매칭 시 동작을 지정합니다.
    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.action = action;
        self
    }

    /// 규칙의 유효성을 검증합니다. 정규식 컴파일은 [`CompiledRule`](super::CompiledRule)에서 수행합니다.
    pub fn validate(&self) -> Result<(), LogMonitorError> {
        if self.id.is_empty() {
            return Err(invalid("(empty)", "rule id must not be empty"));
        }
        if self.id.len() > MAX_RULE_ID_LEN {
            return Err(invalid(
                &self.id,
                &format!("rule id must not exceed {MAX_RULE_ID_LEN} characters"),
            ));
        }
        if self.counter.is_empty()
            || !self
                .counter
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(invalid(
                &self.id,
                "counter must be non-empty and use only [a-z0-9_]",
            ));
        }
        if RESERVED_COUNTERS.contains(&self.counter.as_str()) {
            return Err(invalid(
                &self.id,
                &format!("counter '{}' is reserved", self.counter),
            ));
        }
        if self.pattern.is_empty() {
            return Err(invalid(&self.id, "pattern must not be empty"));
        }
        if self.action == RuleAction::Timing && self.match_kind != MatchKind::Regex {
            return Err(invalid(
                &self.id,
                "timing rules must use a regex with a capture group",
            ));
        }
        Ok(())
    }

    /// 역할까지 고려해 검증합니다. `mined_block`은 채굴 로그에서만 분류됩니다.
    pub fn validate_for_role(&self, role: Role) -> Result<(), LogMonitorError> {
        self.validate()?;
        if self.action == RuleAction::MinedBlock && role != Role::Miner {
            return Err(invalid(
                &self.id,
                &format!("mined_block rules are only allowed for role '{}'", Role::Miner),
            ));
        }
        Ok(())
    }
}

fn invalid(rule_id: &str, reason: &str) -> LogMonitorError {
    LogMonitorError::RuleValidation {
        rule_id: rule_id.to_owned(),
        reason: reason.to_owned(),
    }
}

/// 매칭 대상
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleTarget {
    /// `msg` 필드 (기본값)
    #[default]
    Message,
    /// 원본 JSON 라인 전체
    Raw,
}

/// 매칭 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// 부분 문자열 포함 (대소문자 구분)
    #[default]
    Contains,
    /// 정규식
    Regex,
}

/// 매칭 시 동작
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// 카운터 1 증가 (기본값)
    #[default]
    Count,
    /// 첫 번째 캡처 그룹을 초 단위 소요 시간으로 누적
    Timing,
    /// 카운터 증가 + 블록 레코드를 분류 대기열에 추가
    MinedBlock,
}
