#![no_main]

use libfuzzer_sys::fuzz_target;
use rigwatch_log_monitor::{RuleLoader, RuleTable};

fuzz_target!(|data: &[u8]| {
    // YAML 파서는 &str을 받으므로 UTF-8 변환 필요
    let Ok(yaml_str) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(rules) = RuleLoader::parse_yaml(yaml_str, "fuzz-input.yml") else {
        return;
    };

    // 검증을 통과한 규칙은 기본 테이블 확장 시 Ok/Err만 반환해야 함
    for (role, specs) in rules {
        let mut table = RuleTable::builtin(role);
        let _ = table.extend(specs);
    }
});
