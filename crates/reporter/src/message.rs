//! 전송 메시지와 응답 envelope
//!
//! 요청 본문은 경로별 JSON payload이고, 응답은 항상 다음 envelope입니다.
//!
//! ```text
//! {"code": 0, "msg": "ok", "body": {...}}
//! ```

use std::fmt;

use chrono::{SecondsFormat, Utc};
use rigwatch_core::config::HostConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// 머신 등록 경로
pub const ROUTE_REGISTER: &str = "/api/v1/machine/register";

/// 머신 상태 변경 경로
pub const ROUTE_STATE: &str = "/api/v1/machine/state";

/// 전송 대기 메시지
///
/// 식별자가 없으므로 재시도된 메시지와 새 메시지를 구분하지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    /// 대상 경로 (`/`로 시작)
    pub route: String,
    /// JSON 본문
    pub payload: Value,
    /// 지금까지의 전송 시도 횟수
    pub attempt: u32,
}

impl OutboundMessage {
    /// 새 메시지를 만듭니다. 경로가 `/`로 시작하지 않으면 붙입니다.
    pub fn new(route: impl Into<String>, payload: Value) -> Self {
        let route = route.into();
        let route = if route.starts_with('/') {
            route
        } else {
            format!("/{route}")
        };
        Self {
            route,
            payload,
            attempt: 0,
        }
    }

    /// 머신 등록 메시지
    pub fn registration(host: &HostInfo) -> Self {
        Self::new(
            ROUTE_REGISTER,
            json!({
                "hostname": host.hostname,
                "machine_id": host.machine_id,
                "os": host.os,
                "cpu": host.cpu,
                "gpu": host.gpu,
                "memory": host.memory,
                "disk": host.disk,
                "registered_at": now_rfc3339(),
            }),
        )
    }

    /// 상태 변경 메시지
    pub fn state_change(host: &HostInfo, state: MachineState, detail: &str) -> Self {
        Self::new(
            ROUTE_STATE,
            json!({
                "hostname": host.hostname,
                "machine_id": host.machine_id,
                "state": state,
                "detail": detail,
                "timestamp": now_rfc3339(),
            }),
        )
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// 머신 식별/인벤토리 정보
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub hostname: String,
    pub machine_id: String,
    pub os: String,
    pub cpu: String,
    pub gpu: String,
    pub memory: String,
    pub disk: String,
}

impl HostInfo {
    /// `[host]` 설정 섹션에서 생성합니다.
    pub fn from_core(host: &HostConfig) -> Self {
        Self {
            hostname: host.hostname.clone(),
            machine_id: host.machine_id.clone(),
            os: host.os.clone(),
            cpu: host.cpu.clone(),
            gpu: host.gpu.clone(),
            memory: host.memory.clone(),
            disk: host.disk.clone(),
        }
    }
}

/// 보고하는 머신 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineState {
    /// 데몬 시작 중
    Starting,
    /// 감시 동작 중
    Running,
    /// 종료 중
    Stopping,
}

impl MachineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 컨트롤 플레인 응답 envelope
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    /// 0이면 성공
    pub code: i64,
    /// 사람이 읽는 메시지
    #[serde(default)]
    pub msg: String,
    /// 응답 본문 (경로별)
    #[serde(default)]
    pub body: Value,
}
