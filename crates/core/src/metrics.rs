//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출하거나 [`MetricSample`](crate::pipeline::MetricSample)을 만듭니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `rigwatch_`
//! - 모듈명: `tailer_`, `checkpoint_`, `analyzer_`, `miner_`, `plot_`, `reporter_`, `host_`
//! - 접미어: `_total` (counter), `_seconds`/`_ms` (단위), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 분석기 역할 레이블 키 (miner, plotter, fullnode_sync, generic_error)
pub const LABEL_ROLE: &str = "role";

/// 로그 소스 레이블 키 (파일 base name)
pub const LABEL_SOURCE: &str = "source";

/// 이벤트(카운터 이름) 레이블 키
pub const LABEL_EVENT: &str = "event";

/// 체인 조회 대상 호스트 레이블 키
pub const LABEL_HOST: &str = "host";

/// 전송 경로 레이블 키
pub const LABEL_ROUTE: &str = "route";

// ─── Tailer / Checkpoint 메트릭 ────────────────────────────────────

/// Tailer: 분석기로 전달된 라인 수 (counter)
pub const TAILER_LINES_FORWARDED_TOTAL: &str = "rigwatch_tailer_lines_forwarded_total";

/// Tailer: 로테이션/truncation으로 다시 연 횟수 (counter)
pub const TAILER_REOPENS_TOTAL: &str = "rigwatch_tailer_reopens_total";

/// Checkpoint: 저장 실패 수 (counter)
pub const CHECKPOINT_WRITE_FAILURES_TOTAL: &str = "rigwatch_checkpoint_write_failures_total";

// ─── Analyzer 메트릭 ───────────────────────────────────────────────

/// Analyzer: 소비한 라인 수 (counter)
pub const ANALYZER_LINES_TOTAL: &str = "rigwatch_analyzer_lines_total";

/// Analyzer: 규칙별 이벤트 수 (counter, label: event)
pub const ANALYZER_EVENTS_TOTAL: &str = "rigwatch_analyzer_events_total";

/// Plotter: 완료된 플롯 수 (counter)
pub const PLOTS_COMPLETED_TOTAL: &str = "rigwatch_plots_completed_total";

/// Plotter: 최소 플롯 생성 시간 (gauge, 초)
pub const PLOT_DURATION_SECONDS_MIN: &str = "rigwatch_plot_duration_seconds_min";

/// Plotter: 최대 플롯 생성 시간 (gauge, 초)
pub const PLOT_DURATION_SECONDS_MAX: &str = "rigwatch_plot_duration_seconds_max";

/// Plotter: 평균 플롯 생성 시간 (gauge, 초)
pub const PLOT_DURATION_SECONDS_AVG: &str = "rigwatch_plot_duration_seconds_avg";

/// Plotter: 플롯 생성 시간 합계 (gauge, 초)
pub const PLOT_DURATION_SECONDS_SUM: &str = "rigwatch_plot_duration_seconds_sum";

/// Miner: fork로 분류된 블록 수 (counter, label: host)
pub const MINER_FORKED_BLOCKS_TOTAL: &str = "rigwatch_miner_forked_blocks_total";

/// Miner: canonical 블록 생성 지연 (histogram, 밀리초, label: host)
pub const MINER_BLOCK_LATENCY_MS: &str = "rigwatch_miner_block_latency_ms";

/// Miner: 분류 대기 중인 블록 수 (gauge, label: host)
pub const MINER_PENDING_BLOCKS: &str = "rigwatch_miner_pending_blocks";

/// Miner: 체인 조회 실패 수 (counter)
pub const MINER_LOOKUP_FAILURES_TOTAL: &str = "rigwatch_miner_lookup_failures_total";

// ─── Reporter 메트릭 ───────────────────────────────────────────────

/// Reporter: 전달 성공 수 (counter, label: route)
pub const REPORTER_DELIVERED_TOTAL: &str = "rigwatch_reporter_delivered_total";

/// Reporter: 전달 실패 시도 수 (counter, label: route)
pub const REPORTER_FAILED_ATTEMPTS_TOTAL: &str = "rigwatch_reporter_failed_attempts_total";

/// Reporter: 재시도 대기 메시지 수 (gauge)
pub const REPORTER_PENDING_RETRIES: &str = "rigwatch_reporter_pending_retries";

// ─── Host 메트릭 ───────────────────────────────────────────────────

/// Host: 정적 호스트 정보 (gauge, 항상 1)
pub const HOST_INFO: &str = "rigwatch_host_info";

/// 블록 지연 히스토그램 버킷 (밀리초)
pub const BLOCK_LATENCY_BUCKETS_MS: [f64; 10] = [
    100.0, 250.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0, 20000.0, 30000.0, 60000.0,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번 호출합니다. 레코더가 없으면 아무 일도 하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        TAILER_LINES_FORWARDED_TOTAL,
        "Log lines handed from a tailer to its analyzer"
    );
    describe_counter!(
        TAILER_REOPENS_TOTAL,
        "Times a tailer reopened its file after rotation or truncation"
    );
    describe_counter!(
        CHECKPOINT_WRITE_FAILURES_TOTAL,
        "Checkpoint writes that failed"
    );

    describe_counter!(ANALYZER_LINES_TOTAL, "Log lines consumed by an analyzer");
    describe_counter!(
        ANALYZER_EVENTS_TOTAL,
        "Rule matches per analyzer counter"
    );
    describe_counter!(PLOTS_COMPLETED_TOTAL, "Completed plot operations");
    describe_gauge!(PLOT_DURATION_SECONDS_MIN, "Shortest plot creation time");
    describe_gauge!(PLOT_DURATION_SECONDS_MAX, "Longest plot creation time");
    describe_gauge!(PLOT_DURATION_SECONDS_AVG, "Average plot creation time");
    describe_gauge!(PLOT_DURATION_SECONDS_SUM, "Total plot creation time");
    describe_counter!(
        MINER_FORKED_BLOCKS_TOTAL,
        "Mined blocks absent from the canonical tipset at their height"
    );
    describe_histogram!(
        MINER_BLOCK_LATENCY_MS,
        "Mining time of canonical blocks in milliseconds"
    );
    describe_gauge!(
        MINER_PENDING_BLOCKS,
        "Mined blocks waiting for chain classification"
    );
    describe_counter!(
        MINER_LOOKUP_FAILURES_TOTAL,
        "Chain lookups that failed and will be retried"
    );

    describe_counter!(
        REPORTER_DELIVERED_TOTAL,
        "Outbound events accepted by the control plane"
    );
    describe_counter!(
        REPORTER_FAILED_ATTEMPTS_TOTAL,
        "Outbound delivery attempts that failed"
    );
    describe_gauge!(
        REPORTER_PENDING_RETRIES,
        "Outbound events waiting for their retry deadline"
    );

    describe_gauge!(HOST_INFO, "Static host descriptors (always 1)");
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        TAILER_LINES_FORWARDED_TOTAL,
        TAILER_REOPENS_TOTAL,
        CHECKPOINT_WRITE_FAILURES_TOTAL,
        ANALYZER_LINES_TOTAL,
        ANALYZER_EVENTS_TOTAL,
        PLOTS_COMPLETED_TOTAL,
        PLOT_DURATION_SECONDS_MIN,
        PLOT_DURATION_SECONDS_MAX,
        PLOT_DURATION_SECONDS_AVG,
        PLOT_DURATION_SECONDS_SUM,
        MINER_FORKED_BLOCKS_TOTAL,
        MINER_BLOCK_LATENCY_MS,
        MINER_PENDING_BLOCKS,
        MINER_LOOKUP_FAILURES_TOTAL,
        REPORTER_DELIVERED_TOTAL,
        REPORTER_FAILED_ATTEMPTS_TOTAL,
        REPORTER_PENDING_RETRIES,
        HOST_INFO,
    ];

    #[test]
    fn all_metrics_start_with_rigwatch_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("rigwatch_"),
                "Metric '{}' does not start with 'rigwatch_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        let counters = [
            TAILER_LINES_FORWARDED_TOTAL,
            TAILER_REOPENS_TOTAL,
            CHECKPOINT_WRITE_FAILURES_TOTAL,
            ANALYZER_LINES_TOTAL,
            ANALYZER_EVENTS_TOTAL,
            PLOTS_COMPLETED_TOTAL,
            MINER_FORKED_BLOCKS_TOTAL,
            MINER_LOOKUP_FAILURES_TOTAL,
            REPORTER_DELIVERED_TOTAL,
            REPORTER_FAILED_ATTEMPTS_TOTAL,
        ];
        for name in counters {
            assert!(name.ends_with("_total"), "counter '{name}' must end with _total");
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_ROLE, LABEL_SOURCE, LABEL_EVENT, LABEL_HOST, LABEL_ROUTE] {
            assert_eq!(label.to_lowercase(), label);
        }
    }

    #[test]
    fn latency_buckets_are_sorted() {
        let buckets = BLOCK_LATENCY_BUCKETS_MS;
        for i in 1..buckets.len() {
            assert!(buckets[i] > buckets[i - 1]);
        }
    }
}
