//! 분석기 상태
//!
//! 분석기 하나가 소유하는 카운터 묶음입니다. 모든 접근은 분석기의 락을 통해
//! 이루어지므로 이 모듈의 타입은 동기화 없이 단순 자료구조로 둡니다.

use std::collections::{BTreeMap, VecDeque};

use crate::parser::CandidateBlock;

/// 스크레이프 사이에 보관하는 최대 지연 샘플 수. 넘치면 오래된 것부터 버림
pub const MAX_BUFFERED_LATENCIES: usize = 4096;

/// 소요 시간 통계 (초)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimingStats {
    /// 관측 횟수
    pub count: u64,
    /// 합계
    pub total: f64,
    /// 최솟값
    pub min: f64,
    /// 최댓값
    pub max: f64,
}

impl TimingStats {
    /// 관측값 하나를 누적합니다.
    pub fn record(&mut self, secs: f64) {
        if self.count == 0 {
            self.min = secs;
            self.max = secs;
        } else {
            self.min = self.min.min(secs);
            self.max = self.max.max(secs);
        }
        self.count += 1;
        self.total += secs;
    }

    /// 평균값. 관측이 없으면 `None`.
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total / self.count as f64)
    }
}

/// 후보 블록 추가 결과
#[derive(Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// 추가됨
    Queued,
    /// 같은 cid가 이미 대기 중
    Duplicate,
    /// 추가됨, 가장 오래된 후보를 밀어냄
    Evicted(CandidateBlock),
}

/// 분석기 상태
#[derive(Debug, Default)]
pub struct AnalyzerState {
    /// 누적 카운터 (프로세스 수명 동안 감소하지 않음)
    pub cumulative: BTreeMap<String, u64>,
    /// 정상 블록 채굴 지연 (밀리초, 스크레이프 시 비움)
    pub latencies_ms: VecDeque<u64>,
    /// 규칙별 소요 시간 통계
    pub timing: BTreeMap<String, TimingStats>,
    /// 분류 대기 중인 채굴 블록 (오래된 순)
    pub pending: VecDeque<CandidateBlock>,
}

impl AnalyzerState {
    /// 누적 카운터를 1 증가시킵니다.
    pub fn increment(&mut self, counter: &str) {
        match self.cumulative.get_mut(counter) {
            Some(value) => *value = value.saturating_add(1),
            None => {
                self.cumulative.insert(counter.to_owned(), 1);
            }
        }
    }

    /// 누적 카운터 값 (없으면 0)
    pub fn counter(&self, counter: &str) -> u64 {
        self.cumulative.get(counter).copied().unwrap_or(0)
    }

    /// 소요 시간을 누적합니다.
    pub fn record_timing(&mut self, name: &str, secs: f64) {
        self.timing.entry(name.to_owned()).or_default().record(secs);
    }

    /// 후보 블록을 대기열 끝에 추가합니다.
    pub fn push_candidate(&mut self, block: CandidateBlock, max_pending: usize) -> PushOutcome {
        if self.pending.iter().any(|p| p.cid == block.cid) {
            return PushOutcome::Duplicate;
        }
        let evicted = if self.pending.len() >= max_pending {
            self.pending.pop_front()
        } else {
            None
        };
        self.pending.push_back(block);
        match evicted {
            Some(old) => PushOutcome::Evicted(old),
            None => PushOutcome::Queued,
        }
    }

    /// 대기열에서 cid로 후보를 제거합니다.
    pub fn take_candidate(&mut self, cid: &str) -> Option<CandidateBlock> {
        let idx = self.pending.iter().position(|p| p.cid == cid)?;
        self.pending.remove(idx)
    }

    /// 정상 블록 지연을 기록합니다.
    pub fn record_latency(&mut self, took_ms: u64) {
        if self.latencies_ms.len() >= MAX_BUFFERED_LATENCIES {
            self.latencies_ms.pop_front();
        }
        self.latencies_ms.push_back(took_ms);
    }

    /// 지연 목록을 비우고 반환합니다.
    pub fn drain_latencies(&mut self) -> Vec<u64> {
        self.latencies_ms.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(cid: &str) -> CandidateBlock {
        CandidateBlock {
            cid: cid.to_owned(),
            height: 1,
            took_ms: 10,
            parents: Vec::new(),
        }
    }

    #[test]
    fn timing_tracks_min_max_avg() {
        let mut stats = TimingStats::default();
        assert_eq!(stats.average(), None);
        stats.record(120.0);
        stats.record(80.0);
        stats.record(100.0);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, 80.0);
        assert_eq!(stats.max, 120.0);
        assert_eq!(stats.average(), Some(100.0));
    }

    #[test]
    fn increment_creates_and_grows() {
        let mut state = AnalyzerState::default();
        state.increment("io_timeout");
        state.increment("io_timeout");
        assert_eq!(state.counter("io_timeout"), 2);
        assert_eq!(state.counter("missing"), 0);
    }

    #[test]
    fn push_dedupes_and_evicts_oldest() {
        let mut state = AnalyzerState::default();
        assert_eq!(state.push_candidate(block("a"), 2), PushOutcome::Queued);
        assert_eq!(state.push_candidate(block("a"), 2), PushOutcome::Duplicate);
        assert_eq!(state.push_candidate(block("b"), 2), PushOutcome::Queued);
        assert_eq!(
            state.push_candidate(block("c"), 2),
            PushOutcome::Evicted(block("a"))
        );
        let cids: Vec<_> = state.pending.iter().map(|b| b.cid.as_str()).collect();
        assert_eq!(cids, vec!["b", "c"]);
    }

    #[test]
    fn take_candidate_by_cid() {
        let mut state = AnalyzerState::default();
        state.push_candidate(block("a"), 8);
        state.push_candidate(block("b"), 8);
        assert_eq!(state.take_candidate("b"), Some(block("b")));
        assert_eq!(state.take_candidate("b"), None);
        assert_eq!(state.pending.len(), 1);
    }

    #[test]
    fn drain_empties_list() {
        let mut state = AnalyzerState::default();
        state.record_latency(1);
        state.record_latency(2);
        assert_eq!(state.drain_latencies(), vec![1, 2]);
        assert!(state.drain_latencies().is_empty());
    }

    #[test]
    fn undrained_latencies_are_capped() {
        // Given: 스크레이프 없이 한도보다 많이 기록
        let mut state = AnalyzerState::default();
        for ms in 0..(MAX_BUFFERED_LATENCIES as u64 + 10) {
            state.record_latency(ms);
        }

        // Then: 가장 오래된 10개가 밀려남
        let drained = state.drain_latencies();
        assert_eq!(drained.len(), MAX_BUFFERED_LATENCIES);
        assert_eq!(drained.first(), Some(&10));
        assert_eq!(drained.last(), Some(&(MAX_BUFFERED_LATENCIES as u64 + 9)));
    }
}
