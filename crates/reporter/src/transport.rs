//! 전송 계층
//!
//! [`Transport`]는 메시지 한 건을 보내고 성공 여부만 돌려줍니다.
//! 실패 원인과 상관없이 워커는 같은 방식으로 재시도합니다.

use std::future::Future;
use std::time::Duration;

use crate::error::ReporterError;
use crate::message::{Envelope, OutboundMessage};

/// 메시지 전송 trait
pub trait Transport: Send + Sync + 'static {
    /// 메시지 한 건을 전송합니다. 컨트롤 플레인이 수락했을 때만 `Ok`입니다.
    fn deliver(
        &self,
        message: &OutboundMessage,
    ) -> impl Future<Output = Result<(), ReporterError>> + Send;
}

/// `reqwest` 기반 HTTP POST 전송
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ReporterError> {
        let base_url = base_url.into();
        if base_url.is_empty() {
            return Err(ReporterError::Config {
                field: "reporter.base_url".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReporterError::Config {
                field: "reporter.request_timeout_secs".to_owned(),
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { client, base_url })
    }

    /// base URL 끝의 `/`를 제거하고 경로를 붙입니다.
    pub fn url_for(&self, route: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), route)
    }
}

impl Transport for HttpTransport {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), ReporterError> {
        let response = self
            .client
            .post(self.url_for(&message.route))
            .json(&message.payload)
            .send()
            .await
            .map_err(|e| ReporterError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ReporterError::Transport(e.to_string()))?;

        check_envelope(status, &body).map(|_| ())
    }
}

/// 응답 상태와 본문을 검사합니다.
///
/// HTTP 200이고 envelope `code == 0`일 때만 성공입니다.
pub fn check_envelope(status: u16, body: &[u8]) -> Result<Envelope, ReporterError> {
    if status != 200 {
        return Err(ReporterError::HttpStatus(status));
    }
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| ReporterError::Decode(e.to_string()))?;
    if envelope.code != 0 {
        return Err(ReporterError::Envelope {
            code: envelope.code,
            msg: envelope.msg,
        });
    }
    Ok(envelope)
}
