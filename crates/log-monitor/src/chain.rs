//! 체인 높이 조회
//!
//! 채굴 분석기는 [`ChainLookup`]으로 특정 높이의 canonical 블록 id 집합을 얻습니다.
//! 기본 구현 [`HttpChainLookup`]은 Lotus JSON-RPC의
//! `Filecoin.ChainGetTipSetByHeight`를 호출합니다.
//!
//! ```text
//! POST <host>/rpc/v0
//! {"jsonrpc":"2.0","id":1,"method":"Filecoin.ChainGetTipSetByHeight","params":[1024000,null]}
//!
//! {"jsonrpc":"2.0","id":1,"result":{"Cids":[{"/":"bafy2bz..."},{"/":"bafy2bz..."}],"Height":1024000}}
//! ```
//!
//! 조회 실패(전송 에러, 2xx 외 상태, RPC `error`, 형식 오류)는 모두 재시도 대상입니다.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use serde_json::{Value, json};

use crate::error::LogMonitorError;
use crate::parser::block::cid_string;

const TIPSET_BY_HEIGHT_METHOD: &str = "Filecoin.ChainGetTipSetByHeight";

/// 체인 조회 trait
pub trait ChainLookup: Send + Sync + 'static {
    /// `height`의 canonical 블록 id 집합을 조회합니다.
    fn canonical_blocks(
        &self,
        host: &str,
        height: u64,
    ) -> impl Future<Output = Result<HashSet<String>, LogMonitorError>> + Send;
}

/// Lotus JSON-RPC 기반 체인 조회
#[derive(Debug, Clone)]
pub struct HttpChainLookup {
    client: reqwest::Client,
    token: Option<String>,
}

impl HttpChainLookup {
    /// 요청 타임아웃과 선택적 bearer 토큰으로 생성합니다.
    pub fn new(timeout: Duration, token: Option<String>) -> Result<Self, LogMonitorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LogMonitorError::Config {
                field: "miner.lookup_timeout_secs".to_owned(),
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { client, token })
    }

    /// 호스트 주소에서 RPC 엔드포인트 URL을 만듭니다.
    ///
    /// 이미 `/rpc/v0` 또는 `/rpc/v1`로 끝나면 그대로 사용합니다.
    pub fn rpc_url(host: &str) -> String {
        let host = host.trim_end_matches('/');
        if host.ends_with("/rpc/v0") || host.ends_with("/rpc/v1") {
            host.to_owned()
        } else {
            format!("{host}/rpc/v0")
        }
    }
}

impl ChainLookup for HttpChainLookup {
    async fn canonical_blocks(
        &self,
        host: &str,
        height: u64,
    ) -> Result<HashSet<String>, LogMonitorError> {
        let lookup_err = |reason: String| LogMonitorError::ChainLookup {
            host: host.to_owned(),
            height,
            reason,
        };

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": TIPSET_BY_HEIGHT_METHOD,
            "params": [height, null],
        });

        let mut request = self.client.post(Self::rpc_url(host)).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| lookup_err(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(lookup_err(format!("unexpected status {status}")));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| lookup_err(format!("invalid response body: {e}")))?;

        parse_tipset_response(&value).map_err(lookup_err)
    }
}

/// JSON-RPC 응답에서 `result.Cids[*]["/"]`를 추출합니다.
pub fn parse_tipset_response(value: &Value) -> Result<HashSet<String>, String> {
    if let Some(error) = value.get("error")
        && !error.is_null()
    {
        return Err(format!("rpc error: {error}"));
    }

    let cids = value
        .get("result")
        .and_then(|r| r.get("Cids"))
        .and_then(Value::as_array)
        .ok_or_else(|| "response missing result.Cids".to_owned())?;

    cids.iter()
        .map(|c| cid_string(c).ok_or_else(|| format!("malformed cid entry: {c}")))
        .collect()
}

/// 높이별 응답을 미리 지정하는 테스트용 조회기
#[cfg(test)]
#[derive(Default)]
pub struct MockChainLookup {
    responses: std::sync::Mutex<std::collections::HashMap<u64, Result<HashSet<String>, String>>>,
    /// 조회 호출 횟수
    pub calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockChainLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_canonical(self, height: u64, cids: &[&str]) -> Self {
        self.set_canonical(height, cids);
        self
    }

    pub fn with_failure(self, height: u64, reason: &str) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(height, Err(reason.to_owned()));
        }
        self
    }

    pub fn set_canonical(&self, height: u64, cids: &[&str]) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(height, Ok(cids.iter().map(|c| (*c).to_owned()).collect()));
        }
    }
}

#[cfg(test)]
impl ChainLookup for MockChainLookup {
    async fn canonical_blocks(
        &self,
        host: &str,
        height: u64,
    ) -> Result<HashSet<String>, LogMonitorError> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let response = self
            .responses
            .lock()
            .ok()
            .and_then(|r| r.get(&height).cloned())
            .unwrap_or_else(|| Err("no tipset scripted".to_owned()));
        response.map_err(|reason| LogMonitorError::ChainLookup {
            host: host.to_owned(),
            height,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn rpc_url_appends_path_once() {
        assert_eq!(
            HttpChainLookup::rpc_url("http://127.0.0.1:1234"),
            "http://127.0.0.1:1234/rpc/v0"
        );
        assert_eq!(
            HttpChainLookup::rpc_url("http://127.0.0.1:1234/"),
            "http://127.0.0.1:1234/rpc/v0"
        );
        assert_eq!(
            HttpChainLookup::rpc_url("https://node.example/rpc/v1"),
            "https://node.example/rpc/v1"
        );
    }

    #[test]
    fn parse_result_cids() {
        let value = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"Cids": [{"/": "bafyA"}, {"/": "bafyB"}], "Height": 10}
        });
        let cids = parse_tipset_response(&value).unwrap();
        assert_eq!(cids.len(), 2);
        assert!(cids.contains("bafyA"));
    }

    #[test]
    fn empty_tipset_is_ok() {
        let value = json!({"result": {"Cids": []}});
        assert!(parse_tipset_response(&value).unwrap().is_empty());
    }

    #[test]
    fn rpc_error_is_failure() {
        let value = json!({"error": {"code": 1, "message": "looking for tipset with height greater than start point"}});
        assert!(parse_tipset_response(&value).unwrap_err().contains("rpc error"));
    }

    #[test]
    fn null_error_with_result_is_ok() {
        let value = json!({"error": null, "result": {"Cids": ["bafyA"]}});
        assert!(parse_tipset_response(&value).unwrap().contains("bafyA"));
    }

    #[test]
    fn malformed_body_is_failure() {
        assert!(parse_tipset_response(&json!({"result": null})).is_err());
        assert!(parse_tipset_response(&json!({"result": {"Cids": [42]}})).is_err());
    }

    /// 요청 한 건을 받고 고정 응답을 돌려주는 HTTP 서버. 받은 요청 원문을 반환합니다.
    async fn serve_once(status: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );

        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });

        (format!("http://{addr}"), task)
    }

    #[tokio::test]
    async fn http_lookup_sends_rpc_and_parses_result() {
        let (host, server) = serve_once(
            "200 OK",
            r#"{"jsonrpc":"2.0","id":1,"result":{"Cids":[{"/":"bafyA"}],"Height":7}}"#,
        )
        .await;
        let lookup =
            HttpChainLookup::new(Duration::from_secs(5), Some("secret".to_owned())).unwrap();

        let cids = lookup.canonical_blocks(&host, 7).await.unwrap();
        assert!(cids.contains("bafyA"));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /rpc/v0 "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer secret"));
        assert!(request.contains(TIPSET_BY_HEIGHT_METHOD));
        assert!(request.contains("[7,null]"));
    }

    #[tokio::test]
    async fn http_lookup_non_success_status_is_error() {
        let (host, server) = serve_once("503 Service Unavailable", "{}").await;
        let lookup = HttpChainLookup::new(Duration::from_secs(5), None).unwrap();

        let err = lookup.canonical_blocks(&host, 7).await.unwrap_err();
        assert!(matches!(err, LogMonitorError::ChainLookup { height: 7, .. }));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn http_lookup_unreachable_host_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let lookup = HttpChainLookup::new(Duration::from_secs(2), None).unwrap();
        assert!(lookup.canonical_blocks(&format!("http://{addr}"), 1).await.is_err());
    }
}
