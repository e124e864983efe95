//! 메트릭 소스 trait — 스크레이프 시점 수집 확장 포인트
//!
//! 분석기, 정적 호스트 정보 등 스크레이프 요청마다 값을 읽어야 하는
//! 구성 요소는 [`MetricSource`]를 구현합니다. 수집기는 소스들을
//! `Vec<Arc<dyn MetricSource>>`로 보관하므로 trait은 dyn-compatible 해야 하고,
//! 비동기 메서드는 [`BoxFuture`]를 반환합니다.

use std::future::Future;
use std::pin::Pin;

/// dyn-compatible trait에서 사용하는 박싱된 Future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 샘플 값
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    /// 누적 카운터 (절댓값)
    Counter(u64),
    /// 게이지
    Gauge(f64),
    /// 히스토그램 관측값 (이전 스크레이프 이후 발생분)
    Histogram(Vec<f64>),
}

/// 단일 메트릭 샘플
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// 메트릭 이름 (`rigwatch_` 접두어)
    pub name: String,
    /// 레이블 (key, value)
    pub labels: Vec<(String, String)>,
    /// 값
    pub value: SampleValue,
}

impl MetricSample {
    /// 카운터 샘플 생성
    pub fn counter(name: impl Into<String>, value: u64) -> Self {
        Self {
            name: name.into(),
            labels: Vec::new(),
            value: SampleValue::Counter(value),
        }
    }

    /// 게이지 샘플 생성
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            labels: Vec::new(),
            value: SampleValue::Gauge(value),
        }
    }

    /// 히스토그램 샘플 생성
    pub fn histogram(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            labels: Vec::new(),
            value: SampleValue::Histogram(values),
        }
    }

    /// 레이블 추가
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    /// 레이블 값 조회
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// 스크레이프 시점에 메트릭 샘플을 제공하는 소스
///
/// `collect`는 소스 자신의 잠금만 사용해야 하며, 다른 소스와 조율하지 않습니다.
/// 드레인형(drain-on-read) 값은 `collect` 호출 시 반환 후 초기화됩니다.
pub trait MetricSource: Send + Sync {
    /// 소스 이름 (로그용)
    fn name(&self) -> &str;

    /// 현재 값을 샘플로 수집
    fn collect(&self) -> BoxFuture<'_, Vec<MetricSample>>;
}
