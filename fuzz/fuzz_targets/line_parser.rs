#![no_main]

use libfuzzer_sys::fuzz_target;
use rigwatch_core::Role;
use rigwatch_log_monitor::{CandidateBlock, JsonLineParser, RuleTable};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let parser = JsonLineParser::default();
    let Ok(line) = parser.parse(raw) else {
        return;
    };

    // 파싱된 라인은 블록 추출과 모든 기본 규칙을 패닉 없이 통과해야 함
    let _ = CandidateBlock::from_line(&line);
    for role in Role::ALL {
        let table = RuleTable::builtin(role);
        let _ = table.evaluate(&line).count();
    }
});
