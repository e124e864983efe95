//! Static host descriptors exposed on every scrape.

use rigwatch_core::config::HostConfig;
use rigwatch_core::metrics as m;
use rigwatch_core::{BoxFuture, MetricSample, MetricSource};

/// Emits `rigwatch_host_info{hostname, machine_id, ...} = 1`.
///
/// Inventory strings come from the `[host]` config section; empty values
/// are exported as empty labels.
#[derive(Debug, Clone)]
pub struct StaticHostSource {
    labels: Vec<(String, String)>,
}

impl StaticHostSource {
    pub fn new(host: &HostConfig) -> Self {
        let labels = [
            ("hostname", &host.hostname),
            ("machine_id", &host.machine_id),
            ("os", &host.os),
            ("cpu", &host.cpu),
            ("gpu", &host.gpu),
            ("memory", &host.memory),
            ("disk", &host.disk),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.clone()))
        .collect();
        Self { labels }
    }

    fn sample(&self) -> MetricSample {
        let mut sample = MetricSample::gauge(m::HOST_INFO, 1.0);
        sample.labels = self.labels.clone();
        sample
    }
}

impl MetricSource for StaticHostSource {
    fn name(&self) -> &str {
        "host"
    }

    fn collect(&self) -> BoxFuture<'_, Vec<MetricSample>> {
        Box::pin(async move { vec![self.sample()] })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigwatch_core::SampleValue;

    #[tokio::test]
    async fn host_info_is_constant_one_with_labels() {
        let host = HostConfig {
            hostname: "rig-01".to_owned(),
            gpu: "NVIDIA RTX 3090".to_owned(),
            ..HostConfig::default()
        };
        let source = StaticHostSource::new(&host);

        let samples = source.collect().await;
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, m::HOST_INFO);
        assert_eq!(samples[0].value, SampleValue::Gauge(1.0));
        assert_eq!(samples[0].label("hostname"), Some("rig-01"));
        assert_eq!(samples[0].label("gpu"), Some("NVIDIA RTX 3090"));
        assert_eq!(samples[0].label("disk"), Some(""));
    }
}
