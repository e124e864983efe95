//! 테일러 → 분석기 라인 핸드오프
//!
//! 용량 1의 채널과 라인별 ack로 구성된 랑데부입니다. [`LineSender::forward`]는
//! 분석기가 라인 처리를 마치고 [`Handoff::complete`]를 호출할 때까지 반환하지
//! 않으므로, 테일러는 직전 라인이 소비되기 전에는 다음 라인으로 넘어가지 않고
//! ack 이후에만 체크포인트를 기록합니다.

use rigwatch_core::LogLine;
use tokio::sync::{mpsc, oneshot};

use crate::error::LogMonitorError;

/// 전달 중인 라인 하나
#[derive(Debug)]
pub struct Handoff {
    line: LogLine,
    ack: oneshot::Sender<()>,
}

impl Handoff {
    /// 전달된 라인
    pub fn line(&self) -> &LogLine {
        &self.line
    }

    /// 처리 완료를 알립니다.
    pub fn complete(self) {
        // 테일러가 이미 종료되었으면 알릴 대상이 없음
        let _ = self.ack.send(());
    }
}

/// 테일러 쪽 핸들
#[derive(Debug, Clone)]
pub struct LineSender {
    tx: mpsc::Sender<Handoff>,
}

impl LineSender {
    /// 라인을 넘기고 분석기의 처리 완료를 기다립니다.
    ///
    /// # Errors
    /// 분석기가 종료되었거나 ack 없이 라인을 버린 경우 `Channel` 에러
    pub async fn forward(&self, line: LogLine) -> Result<(), LogMonitorError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Handoff { line, ack: ack_tx })
            .await
            .map_err(|_| LogMonitorError::Channel("analyzer receiver closed".to_owned()))?;
        ack_rx.await.map_err(|_| {
            LogMonitorError::Channel("analyzer dropped line without acknowledging".to_owned())
        })
    }
}

/// 분석기 쪽 핸들
#[derive(Debug)]
pub struct LineReceiver {
    rx: mpsc::Receiver<Handoff>,
}

impl LineReceiver {
    /// 다음 라인을 기다립니다. 테일러가 종료되면 `None`.
    pub async fn recv(&mut self) -> Option<Handoff> {
        self.rx.recv().await
    }
}

/// 핸드오프 채널을 생성합니다.
pub fn channel() -> (LineSender, LineReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (LineSender { tx }, LineReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn line(msg: &str) -> LogLine {
        LogLine {
            timestamp: Utc::now(),
            level: "info".to_owned(),
            logger: "test".to_owned(),
            caller: String::new(),
            message: msg.to_owned(),
            fields: serde_json::Map::new(),
            raw: String::new(),
        }
    }

    #[tokio::test]
    async fn forward_waits_for_ack() {
        let (tx, mut rx) = channel();
        let forward = tokio::spawn(async move { tx.forward(line("a")).await });

        let handoff = rx.recv().await.unwrap();
        assert_eq!(handoff.line().message, "a");

        // ack 전에는 forward가 끝나지 않음
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!forward.is_finished());

        handoff.complete();
        forward.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn forward_fails_when_receiver_dropped() {
        let (tx, rx) = channel();
        drop(rx);
        let err = tx.forward(line("a")).await.unwrap_err();
        assert!(matches!(err, LogMonitorError::Channel(_)));
    }

    #[tokio::test]
    async fn forward_fails_when_handoff_dropped_without_ack() {
        let (tx, mut rx) = channel();
        let forward = tokio::spawn(async move { tx.forward(line("a")).await });
        let handoff = rx.recv().await.unwrap();
        drop(handoff);
        assert!(forward.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn recv_returns_none_after_sender_dropped() {
        let (tx, mut rx) = channel();
        drop(tx);
        assert!(rx.recv().await.is_none());
    }
}
