//! JSON 로그 라인 파서
//!
//! zap 계열 구조화 로거가 남기는 한 줄짜리 JSON 레코드를 [`LogLine`]으로 변환합니다.
//!
//! ```text
//! {"level":"info","ts":"2024-05-01T10:00:00.123+0800","logger":"miner","caller":"miner/miner.go:475","msg":"mined new block", ...}
//! ```
//!
//! `ts`가 없거나 해석할 수 없는 라인은 잘못된 라인으로 취급합니다.

use chrono::{DateTime, NaiveDateTime, Utc};
use rigwatch_core::LogLine;
use serde_json::{Map, Value};

use crate::error::LogMonitorError;

/// 오프셋 표기(`+0800`, `+08:00`)를 모두 받는 ISO 8601 형식
const ISO_WITH_OFFSET: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// 오프셋 없는 형식 (UTC로 간주)
const ISO_NAIVE: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Unix timestamp가 밀리초로 표기되었다고 보는 경계 (초 단위로는 2286년)
const MILLIS_THRESHOLD: f64 = 9_999_999_999.0;

/// JSON 로그 라인 파서
#[derive(Debug, Clone)]
pub struct JsonLineParser {
    /// 최대 허용 라인 크기 (바이트)
    max_line_length: usize,
}

impl Default for JsonLineParser {
    fn default() -> Self {
        Self {
            max_line_length: 64 * 1024,
        }
    }
}

impl JsonLineParser {
    /// 최대 라인 길이를 지정하여 생성합니다.
    pub fn new(max_line_length: usize) -> Self {
        Self { max_line_length }
    }

    /// 한 줄을 파싱합니다. 줄 끝의 개행 문자는 무시합니다.
    pub fn parse(&self, raw: &str) -> Result<LogLine, LogMonitorError> {
        let line = raw.trim_end_matches(['\n', '\r']);

        if line.len() > self.max_line_length {
            return Err(parse_err(format!(
                "line too long: {} bytes (max: {})",
                line.len(),
                self.max_line_length
            )));
        }

        let value: Value =
            serde_json::from_str(line).map_err(|e| parse_err(format!("invalid json: {e}")))?;

        let Value::Object(mut map) = value else {
            return Err(parse_err("expected JSON object at top level"));
        };

        let ts = map
            .remove("ts")
            .ok_or_else(|| parse_err("missing 'ts' field"))?;
        let timestamp =
            parse_timestamp(&ts).ok_or_else(|| parse_err(format!("unparsable 'ts': {ts}")))?;

        Ok(LogLine {
            timestamp,
            level: take_string(&mut map, "level"),
            logger: take_string(&mut map, "logger"),
            caller: take_string(&mut map, "caller"),
            message: take_string(&mut map, "msg"),
            fields: map,
            raw: line.to_owned(),
        })
    }
}

/// `ts` 값을 UTC 시각으로 변환합니다.
///
/// 지원 형식:
/// - RFC 3339: `2024-05-01T10:00:00.123Z`
/// - zap ISO 8601: `2024-05-01T10:00:00.123+0800`
/// - 오프셋 없는 ISO 8601 (UTC)
/// - Unix timestamp (초, 소수 허용 / 13자리 이상이면 밀리초), 숫자 또는 숫자 문자열
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(dt) = DateTime::parse_from_str(s, ISO_WITH_OFFSET) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, ISO_NAIVE) {
                return Some(naive.and_utc());
            }
            s.parse::<f64>().ok().and_then(from_epoch)
        }
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        _ => None,
    }
}

fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let secs_f = if value > MILLIS_THRESHOLD {
        value / 1000.0
    } else {
        value
    };
    let secs = secs_f.trunc();
    let nanos = ((secs_f - secs) * 1e9).round().min(999_999_999.0);
    DateTime::from_timestamp(secs as i64, nanos as u32)
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> String {
    match map.remove(key) {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn parse_err(reason: impl Into<String>) -> LogMonitorError {
    LogMonitorError::Parse {
        reason: reason.into(),
    }
}
