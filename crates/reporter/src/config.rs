//! 리포터 설정

use std::time::Duration;

use rigwatch_core::config::ReporterConfig;

use crate::error::ReporterError;

/// 전송 워커 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// 컨트롤 플레인 base URL
    pub base_url: String,
    /// 전송 큐 용량
    pub queue_capacity: usize,
    /// 실패 후 재시도까지 지연
    pub retry_delay: Duration,
    /// 주기적 flush 간격
    pub flush_interval: Duration,
    /// 재시도 버퍼 용량
    pub max_pending_retries: usize,
    /// HTTP 요청 타임아웃
    pub request_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self::from_core(&ReporterConfig::default())
    }
}

impl DeliveryConfig {
    pub fn from_core(core: &ReporterConfig) -> Self {
        Self {
            base_url: core.base_url.clone(),
            queue_capacity: core.queue_capacity,
            retry_delay: Duration::from_secs(core.retry_delay_secs),
            flush_interval: Duration::from_secs(core.flush_interval_secs),
            max_pending_retries: core.max_pending_retries,
            request_timeout: Duration::from_secs(core.request_timeout_secs),
        }
    }

    /// 워커를 만들기 전에 값 범위를 확인합니다.
    pub fn validate(&self) -> Result<(), ReporterError> {
        let err = |field: &str, reason: &str| ReporterError::Config {
            field: field.to_owned(),
            reason: reason.to_owned(),
        };
        if self.queue_capacity == 0 {
            return Err(err("reporter.queue_capacity", "must be greater than 0"));
        }
        if self.max_pending_retries == 0 {
            return Err(err("reporter.max_pending_retries", "must be greater than 0"));
        }
        if self.flush_interval.is_zero() {
            return Err(err("reporter.flush_interval_secs", "must be greater than 0"));
        }
        if self.retry_delay.is_zero() {
            return Err(err("reporter.retry_delay_secs", "must be greater than 0"));
        }
        Ok(())
    }
}
