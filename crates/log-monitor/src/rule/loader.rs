//! 규칙 파일 로더 -- 운영자 YAML 규칙 파일을 읽습니다.
//!
//! 파일은 역할 이름을 키로, 추가 규칙 목록을 값으로 갖는 매핑입니다.
//!
//! ```yaml
//! generic_error:
//!   - id: gpu_oom
//!     counter: gpu_out_of_memory
//!     target: raw
//!     pattern: "CUDA out of memory"
//! miner:
//!   - id: winning_post
//!     counter: winning_post_failures
//!     level: error
//!     pattern: "failed to compute winning post proof"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use rigwatch_core::Role;

use super::types::RuleSpec;
use crate::error::LogMonitorError;

/// 규칙 파일 최대 크기
const MAX_RULE_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
/// 역할당 최대 추가 규칙 수
const MAX_RULES_PER_ROLE: usize = 1_000;

/// 역할별 추가 규칙
pub type RoleRules = BTreeMap<Role, Vec<RuleSpec>>;

/// 규칙 파일 로더
pub struct RuleLoader;

impl RuleLoader {
    /// 규칙 파일을 로드합니다.
    ///
    /// # Errors
    /// - 파일을 읽을 수 없거나 `MAX_RULE_FILE_SIZE`를 초과하는 경우
    /// - YAML 파싱 또는 규칙 검증에 실패한 경우
    pub async fn load_file(path: impl AsRef<Path>) -> Result<RoleRules, LogMonitorError> {
        let path = path.as_ref();
        let load_err = |reason: String| LogMonitorError::RuleLoad {
            path: path.display().to_string(),
            reason,
        };

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| load_err(format!("failed to read file metadata: {e}")))?;

        if metadata.len() > MAX_RULE_FILE_SIZE {
            return Err(load_err(format!(
                "file too large: {} bytes (max: {MAX_RULE_FILE_SIZE})",
                metadata.len()
            )));
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| load_err(format!("failed to read file: {e}")))?;

        let rules = Self::parse_yaml(&content, &path.display().to_string())?;

        tracing::info!(
            path = %path.display(),
            roles = rules.len(),
            count = rules.values().map(Vec::len).sum::<usize>(),
            "loaded operator rules"
        );

        Ok(rules)
    }

    /// YAML 문자열을 파싱하여 역할별 규칙을 만듭니다.
    ///
    /// 빈 문서는 규칙 없음으로 취급합니다.
    pub fn parse_yaml(yaml_str: &str, source: &str) -> Result<RoleRules, LogMonitorError> {
        if yaml_str.trim().is_empty() {
            return Ok(RoleRules::new());
        }

        let rules: Option<RoleRules> =
            serde_yaml::from_str(yaml_str).map_err(|e| LogMonitorError::RuleLoad {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;
        let rules = rules.unwrap_or_default();

        for (role, specs) in &rules {
            if specs.len() > MAX_RULES_PER_ROLE {
                return Err(LogMonitorError::RuleLoad {
                    path: source.to_owned(),
                    reason: format!(
                        "too many rules for role '{role}': {} (max {MAX_RULES_PER_ROLE})",
                        specs.len()
                    ),
                });
            }

            let mut seen = HashSet::new();
            for spec in specs {
                spec.validate_for_role(*role)?;
                if !seen.insert(spec.id.as_str()) {
                    return Err(LogMonitorError::RuleValidation {
                        rule_id: spec.id.clone(),
                        reason: format!("duplicate rule id for role '{role}' in {source}"),
                    });
                }
            }
        }

        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::types::{MatchKind, RuleAction};

    #[test]
    fn parse_roles_and_defaults() {
        let yaml = r#"
generic_error:
  - id: gpu_oom
    counter: gpu_out_of_memory
    target: raw
    pattern: "CUDA out of memory"
plotter:
  - id: copy
    counter: plot_copy
    match: regex
    pattern: 'copy took ([0-9.]+)s'
    action: timing
"#;
        let rules = RuleLoader::parse_yaml(yaml, "rules.yml").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[&Role::GenericError][0].counter, "gpu_out_of_memory");
        let copy = &rules[&Role::Plotter][0];
        assert_eq!(copy.match_kind, MatchKind::Regex);
        assert_eq!(copy.action, RuleAction::Timing);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let yaml = "harvester:\n  - id: a\n    counter: b\n    pattern: c\n";
        let err = RuleLoader::parse_yaml(yaml, "rules.yml").unwrap_err();
        assert!(matches!(err, LogMonitorError::RuleLoad { .. }));
    }

    #[test]
    fn duplicate_ids_in_role_are_rejected() {
        let yaml = r#"
miner:
  - { id: a, counter: x, pattern: one }
  - { id: a, counter: y, pattern: two }
"#;
        let err = RuleLoader::parse_yaml(yaml, "rules.yml").unwrap_err();
        assert!(matches!(err, LogMonitorError::RuleValidation { .. }));
    }

    #[test]
    fn same_id_in_different_roles_is_allowed() {
        let yaml = r#"
miner:
  - { id: a, counter: x, pattern: one }
plotter:
  - { id: a, counter: x, pattern: one }
"#;
        assert!(RuleLoader::parse_yaml(yaml, "rules.yml").is_ok());
    }

    #[test]
    fn invalid_spec_is_rejected() {
        let yaml = "miner:\n  - { id: a, counter: lines, pattern: x }\n";
        assert!(RuleLoader::parse_yaml(yaml, "rules.yml").is_err());
    }

    #[test]
    fn mined_block_rule_outside_miner_is_rejected() {
        let yaml = "plotter:\n  - { id: blk, counter: blocks, pattern: mined, action: mined_block }\n";
        let err = RuleLoader::parse_yaml(yaml, "rules.yml").unwrap_err();
        assert!(matches!(err, LogMonitorError::RuleValidation { .. }));

        let yaml = "miner:\n  - { id: blk, counter: blocks, pattern: mined, action: mined_block }\n";
        assert!(RuleLoader::parse_yaml(yaml, "rules.yml").is_ok());
    }

    #[test]
    fn empty_document_has_no_rules() {
        assert!(RuleLoader::parse_yaml("", "rules.yml").unwrap().is_empty());
        assert!(RuleLoader::parse_yaml("# nothing\n", "rules.yml").unwrap().is_empty());
    }

    #[test]
    fn malformed_yaml_is_error() {
        assert!(RuleLoader::parse_yaml("not: [valid: yaml: {{{", "bad.yml").is_err());
    }

    #[tokio::test]
    async fn load_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.yml");
        tokio::fs::write(
            &path,
            "fullnode_sync:\n  - { id: fork, counter: reorgs, pattern: reorg }\n",
        )
        .await
        .unwrap();
        let rules = RuleLoader::load_file(&path).await.unwrap();
        assert_eq!(rules[&Role::FullnodeSync].len(), 1);
    }

    #[tokio::test]
    async fn load_missing_file_is_error() {
        let err = RuleLoader::load_file("/nonexistent/rigwatch/rules.yml")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rules.yml"));
    }
}
