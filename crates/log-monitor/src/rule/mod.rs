//! 규칙 테이블 -- 역할별 매칭 규칙 집합
//!
//! 분석기는 역할과 관계없이 같은 타입이며, 주입된 [`RuleTable`]만 다릅니다.
//! 내장 테이블은 [`RuleTable::builtin`]이 제공하고, 운영자 규칙 파일의 규칙은
//! [`RuleTable::extend`]로 뒤에 덧붙입니다.
//!
//! 한 라인이 여러 규칙에 매칭되면 매칭된 모든 규칙이 적용됩니다.

pub mod loader;
pub mod matcher;
pub mod types;

pub use loader::RuleLoader;
pub use matcher::{CompiledRule, RuleHit};
pub use types::{MatchKind, RuleAction, RuleSpec, RuleTarget};

use std::collections::HashSet;

use rigwatch_core::{LogLine, Role};

use crate::error::LogMonitorError;

/// 플롯 생성 완료 라인 패턴 (`Total plot creation time was 125.3 sec`)
pub const PLOT_CREATION_PATTERN: &str =
    r"(?i)total plot creation time was\s+([0-9]+(?:\.[0-9]+)?)\s*sec";

/// 역할별 규칙 테이블
#[derive(Debug, Clone)]
pub struct RuleTable {
    role: Role,
    rules: Vec<CompiledRule>,
}

impl RuleTable {
    /// 규칙 목록을 컴파일하여 테이블을 만듭니다.
    ///
    /// # Errors
    /// 규칙 검증 실패, 정규식 컴파일 실패, 중복 id
    pub fn new(role: Role, specs: Vec<RuleSpec>) -> Result<Self, LogMonitorError> {
        let mut table = Self {
            role,
            rules: Vec::new(),
        };
        table.extend(specs)?;
        Ok(table)
    }

    /// 역할의 내장 규칙 테이블
    pub fn builtin(role: Role) -> Self {
        let rules = builtin_specs(role)
            .into_iter()
            .filter_map(|spec| CompiledRule::compile(spec).ok())
            .collect();
        Self { role, rules }
    }

    /// 규칙을 테이블 뒤에 추가합니다. 실패하면 테이블은 변경되지 않습니다.
    pub fn extend(&mut self, specs: Vec<RuleSpec>) -> Result<(), LogMonitorError> {
        let mut seen: HashSet<String> = self.rules.iter().map(|r| r.id().to_owned()).collect();
        let mut compiled = Vec::with_capacity(specs.len());

        for spec in specs {
            if !seen.insert(spec.id.clone()) {
                return Err(LogMonitorError::RuleValidation {
                    rule_id: spec.id,
                    reason: format!("duplicate rule id for role '{}'", self.role),
                });
            }
            spec.validate_for_role(self.role)?;
            compiled.push(CompiledRule::compile(spec)?);
        }

        self.rules.extend(compiled);
        Ok(())
    }

    /// 테이블의 역할
    pub fn role(&self) -> Role {
        self.role
    }

    /// 규칙 목록
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 라인에 매칭되는 모든 규칙을 테이블 순서대로 반환합니다.
    pub fn evaluate<'a>(&'a self, line: &'a LogLine) -> impl Iterator<Item = RuleHit<'a>> + 'a {
        self.rules.iter().filter_map(move |rule| rule.matches(line))
    }
}

/// 역할별 내장 규칙 정의
pub fn builtin_specs(role: Role) -> Vec<RuleSpec> {
    match role {
        Role::GenericError => vec![
            RuleSpec::contains("connection_refused", "connection_refused", "connection refused")
                .with_level("error")
                .on_raw(),
            RuleSpec::contains("io_timeout", "io_timeout", "i/o timeout")
                .with_level("error")
                .on_raw(),
            RuleSpec::contains(
                "deadline_exceeded",
                "deadline_exceeded",
                "context deadline exceeded",
            )
            .with_level("error")
            .on_raw(),
        ],
        Role::Miner => vec![
            RuleSpec::contains("mined_block", "blocks_mined", "mined new block")
                .with_action(RuleAction::MinedBlock),
            RuleSpec::contains(
                "mining_candidate_failure",
                "mining_candidate_failures",
                "failed to get best mining candidate",
            )
            .with_level("error")
            .on_raw(),
        ],
        Role::Plotter => vec![
            RuleSpec::regex("plot_creation", "plot_creation", PLOT_CREATION_PATTERN)
                .with_action(RuleAction::Timing),
        ],
        Role::FullnodeSync => vec![
            RuleSpec::contains("incoming_block", "incoming_blocks", "incoming block"),
            RuleSpec::regex("sync_failure", "sync_failures", r"sync failed|failed to sync"),
            RuleSpec::contains("bad_block", "bad_blocks", "bad block"),
        ],
    }
}
