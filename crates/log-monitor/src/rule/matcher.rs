//! 규칙 매칭
//!
//! [`CompiledRule`]은 규칙 로딩 시 정규식을 한 번만 컴파일해 두고,
//! 라인마다 레벨/로거 필터와 패턴을 평가합니다.

use regex::Regex;
use rigwatch_core::LogLine;

use super::types::{MatchKind, RuleAction, RuleSpec, RuleTarget};
use crate::error::LogMonitorError;

/// 매칭 결과
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleHit<'a> {
    /// 규칙 ID
    pub rule_id: &'a str,
    /// 증가시킬 카운터
    pub counter: &'a str,
    /// 동작
    pub action: RuleAction,
    /// `Timing` 규칙이 캡처한 소요 시간 (초)
    pub value: Option<f64>,
}

#[derive(Debug, Clone)]
enum Pattern {
    Contains(String),
    Regex(Regex),
}

/// 컴파일된 규칙
#[derive(Debug, Clone)]
pub struct CompiledRule {
    spec: RuleSpec,
    pattern: Pattern,
}

impl CompiledRule {
    /// 규칙을 검증하고 컴파일합니다.
    pub fn compile(spec: RuleSpec) -> Result<Self, LogMonitorError> {
        spec.validate()?;

        let pattern = match spec.match_kind {
            MatchKind::Contains => Pattern::Contains(spec.pattern.clone()),
            MatchKind::Regex => {
                let regex =
                    Regex::new(&spec.pattern).map_err(|e| LogMonitorError::RuleValidation {
                        rule_id: spec.id.clone(),
                        reason: format!("invalid regex: {e}"),
                    })?;
                if spec.action == RuleAction::Timing && regex.captures_len() < 2 {
                    return Err(LogMonitorError::RuleValidation {
                        rule_id: spec.id.clone(),
                        reason: "timing regex must have a capture group".to_owned(),
                    });
                }
                Pattern::Regex(regex)
            }
        };

        Ok(Self { spec, pattern })
    }

    /// 규칙 ID
    pub fn id(&self) -> &str {
        &self.spec.id
    }

    /// 원본 규칙 정의
    pub fn spec(&self) -> &RuleSpec {
        &self.spec
    }

    /// 라인을 평가합니다.
    ///
    /// `Timing` 규칙은 캡처 값을 숫자로 해석할 수 없으면 매칭되지 않은 것으로 봅니다.
    pub fn matches(&self, line: &LogLine) -> Option<RuleHit<'_>> {
        if let Some(level) = &self.spec.level
            && !line.level_is(level)
        {
            return None;
        }
        if let Some(logger) = &self.spec.logger
            && line.logger != *logger
        {
            return None;
        }

        let text = match self.spec.target {
            RuleTarget::Message => line.message.as_str(),
            RuleTarget::Raw => line.raw.as_str(),
        };

        let value = match &self.pattern {
            Pattern::Contains(needle) => {
                if !text.contains(needle.as_str()) {
                    return None;
                }
                None
            }
            Pattern::Regex(regex) if self.spec.action == RuleAction::Timing => {
                let captures = regex.captures(text)?;
                let secs: f64 = captures.get(1)?.as_str().parse().ok()?;
                if !secs.is_finite() || secs < 0.0 {
                    return None;
                }
                Some(secs)
            }
            Pattern::Regex(regex) => {
                if !regex.is_match(text) {
                    return None;
                }
                None
            }
        };

        Some(RuleHit {
            rule_id: &self.spec.id,
            counter: &self.spec.counter,
            action: self.spec.action,
            value,
        })
    }
}
