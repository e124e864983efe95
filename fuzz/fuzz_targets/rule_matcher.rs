#![no_main]

use arbitrary::Arbitrary;
use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;

use rigwatch_core::LogLine;
use rigwatch_log_monitor::rule::{CompiledRule, RuleAction, RuleSpec};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    pattern: String,
    regex: bool,
    timing: bool,
    raw_target: bool,
    level: Option<String>,
    message: String,
    line_level: String,
}

fuzz_target!(|input: FuzzInput| {
    let mut spec = if input.regex {
        RuleSpec::regex("fuzz_rule", "fuzz_counter", &input.pattern)
    } else {
        RuleSpec::contains("fuzz_rule", "fuzz_counter", &input.pattern)
    };
    if input.timing {
        spec = spec.with_action(RuleAction::Timing);
    }
    if input.raw_target {
        spec = spec.on_raw();
    }
    if let Some(level) = &input.level {
        spec = spec.with_level(level);
    }

    // compile이 실패해도 크래시는 안 됨
    let Ok(rule) = CompiledRule::compile(spec) else {
        return;
    };

    let Some(timestamp) = Utc.timestamp_opt(1_700_000_000, 0).single() else {
        return;
    };
    let raw = serde_json::json!({ "level": input.line_level, "msg": input.message }).to_string();
    let line = LogLine {
        timestamp,
        level: input.line_level,
        logger: "fuzz".to_owned(),
        caller: String::new(),
        message: input.message,
        fields: serde_json::Map::new(),
        raw,
    };

    if let Some(hit) = rule.matches(&line)
        && let Some(value) = hit.value
    {
        assert!(value.is_finite() && value >= 0.0);
    }
});
