//! 스크레이프 시점 메트릭 수집
//!
//! [`MetricsCollector`]는 등록된 [`MetricSource`]들을 스크레이프 요청마다 읽어
//! 설치된 `metrics` 레코더에 기록합니다. 수집기는 소스 사이를 조율하지 않으며,
//! 각 소스는 자기 락 안에서 값을 읽습니다.

use std::sync::Arc;

use metrics::Label;
use rigwatch_core::{MetricSample, MetricSource, SampleValue};
use tracing::debug;

/// 메트릭 수집기
#[derive(Clone, Default)]
pub struct MetricsCollector {
    sources: Vec<Arc<dyn MetricSource>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 소스를 등록합니다. 수집은 등록 순서대로 진행됩니다.
    pub fn register(&mut self, source: Arc<dyn MetricSource>) {
        debug!(source = source.name(), "registered metric source");
        self.sources.push(source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// 등록된 모든 소스에서 샘플을 모읍니다.
    pub async fn collect(&self) -> Vec<MetricSample> {
        let mut samples = Vec::new();
        for source in &self.sources {
            samples.extend(source.collect().await);
        }
        samples
    }

    /// 수집 후 레코더에 기록합니다. 기록한 샘플 수를 반환합니다.
    pub async fn collect_and_record(&self) -> usize {
        let samples = self.collect().await;
        record(&samples);
        samples.len()
    }
}

/// 샘플을 현재 `metrics` 레코더에 기록합니다.
///
/// 카운터는 절댓값으로 덮어쓰고, 게이지는 설정하고, 히스토그램은 관측값을 모두 기록합니다.
pub fn record(samples: &[MetricSample]) {
    for sample in samples {
        let labels: Vec<Label> = sample
            .labels
            .iter()
            .map(|(k, v)| Label::new(k.clone(), v.clone()))
            .collect();
        let name = sample.name.clone();

        match &sample.value {
            SampleValue::Counter(value) => metrics::counter!(name, labels).absolute(*value),
            SampleValue::Gauge(value) => metrics::gauge!(name, labels).set(*value),
            SampleValue::Histogram(values) => {
                let histogram = metrics::histogram!(name, labels);
                for value in values {
                    histogram.record(*value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use rigwatch_core::BoxFuture;

    struct Fixed {
        name: String,
        samples: Vec<MetricSample>,
    }

    impl MetricSource for Fixed {
        fn name(&self) -> &str {
            &self.name
        }

        fn collect(&self) -> BoxFuture<'_, Vec<MetricSample>> {
            let samples = self.samples.clone();
            Box::pin(async move { samples })
        }
    }

    fn fixed(name: &str, samples: Vec<MetricSample>) -> Arc<dyn MetricSource> {
        Arc::new(Fixed {
            name: name.to_owned(),
            samples,
        })
    }

    #[tokio::test]
    async fn collect_preserves_registration_order() {
        let mut collector = MetricsCollector::new();
        collector.register(fixed("a", vec![MetricSample::counter("first", 1)]));
        collector.register(fixed("b", vec![MetricSample::gauge("second", 2.0)]));

        let names: Vec<_> = collector
            .collect()
            .await
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(collector.len(), 2);
    }

    #[test]
    fn record_renders_through_prometheus() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record(&[
                MetricSample::counter("rigwatch_test_total", 5).with_label("role", "miner"),
                MetricSample::gauge("rigwatch_test_gauge", 1.5),
                MetricSample::histogram("rigwatch_test_ms", vec![100.0, 300.0]),
            ]);
            // 카운터는 절댓값이므로 같은 값으로 다시 기록해도 증가하지 않음
            record(&[MetricSample::counter("rigwatch_test_total", 5).with_label("role", "miner")]);
        });

        let rendered = handle.render();
        assert!(rendered.contains("rigwatch_test_total{role=\"miner\"} 5"));
        assert!(rendered.contains("rigwatch_test_gauge 1.5"));
        assert!(rendered.contains("rigwatch_test_ms_count 2"));
    }
}
