//! 채굴 블록 레코드 추출
//!
//! "mined new block" 라인에 담긴 블록 정보를 [`CandidateBlock`]으로 변환합니다.
//! 블록 정보는 `block` 하위 객체에 있거나 최상위 필드에 평탄하게 있을 수 있습니다.
//!
//! ```text
//! {"msg":"mined new block","cid":{"/":"bafy2bz..."},"height":"1024000","took":"4.25s","parents":["bafy...","bafy..."]}
//! {"msg":"mined new block","block":{"cid":"bafy2bz...","height":1024000,"took":4.25,"parents":[{"/":"bafy..."}]}}
//! ```

use rigwatch_core::LogLine;
use serde::Serialize;
use serde_json::{Map, Value};

/// 분류 대기 중인 채굴 블록
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateBlock {
    /// 블록 content id
    pub cid: String,
    /// 블록 높이
    pub height: u64,
    /// 채굴 소요 시간 (밀리초, 반올림)
    pub took_ms: u64,
    /// 부모 블록 id 목록
    pub parents: Vec<String>,
}

impl CandidateBlock {
    /// 로그 라인에서 블록 레코드를 추출합니다.
    ///
    /// `cid`와 `height`가 없으면 `None`을 반환합니다. `took`이 없거나
    /// 해석할 수 없으면 0으로 둡니다.
    pub fn from_line(line: &LogLine) -> Option<Self> {
        let record = match line.fields.get("block") {
            Some(Value::Object(block)) => block,
            _ => &line.fields,
        };
        Self::from_record(record)
    }

    fn from_record(record: &Map<String, Value>) -> Option<Self> {
        let cid = record.get("cid").and_then(cid_string)?;
        let height = record.get("height").and_then(as_u64)?;
        let took_ms = record
            .get("took")
            .and_then(duration_secs)
            .map(secs_to_ms)
            .unwrap_or(0);
        let parents = match record.get("parents") {
            Some(Value::Array(items)) => items.iter().filter_map(cid_string).collect(),
            _ => Vec::new(),
        };

        Some(Self {
            cid,
            height,
            took_ms,
            parents,
        })
    }
}

/// `"bafy..."` 또는 `{"/": "bafy..."}` 형태의 CID를 읽습니다.
pub(crate) fn cid_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => match map.get("/") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 소요 시간을 초 단위로 읽습니다.
///
/// 숫자는 초로 간주합니다. 문자열은 숫자만 있으면 초, 아니면
/// Go duration 표기(`1m2.5s`, `850ms`, `1.2s`)로 해석합니다.
fn duration_secs(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| *v >= 0.0),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(secs) = s.parse::<f64>() {
                return (secs.is_finite() && secs >= 0.0).then_some(secs);
            }
            parse_go_duration(s)
        }
        _ => None,
    }
}

/// Go `time.Duration.String()` 형식을 초 단위로 변환합니다.
pub fn parse_go_duration(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }

    let mut total = 0.0;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return None;
        }
        let number: f64 = rest[..num_len].parse().ok()?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        total += match &rest[..unit_len] {
            "h" => number * 3600.0,
            "m" => number * 60.0,
            "s" => number,
            "ms" => number / 1e3,
            "us" | "µs" => number / 1e6,
            "ns" => number / 1e9,
            _ => return None,
        };
        rest = &rest[unit_len..];
    }
    Some(total)
}

fn secs_to_ms(secs: f64) -> u64 {
    (secs * 1000.0).round() as u64
}
