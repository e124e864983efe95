//! 시간순 재시도 버퍼
//!
//! 실패한 메시지를 due 시각 기준 min-heap에 보관합니다. due 시각이 같으면
//! 먼저 넣은 메시지가 먼저 나옵니다. 워커 혼자 소유하므로 잠금이 없습니다.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tokio::time::Instant;

use crate::message::OutboundMessage;

#[derive(Debug)]
struct Scheduled {
    due: Instant,
    seq: u64,
    message: OutboundMessage,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // BinaryHeap은 max-heap이므로 역순
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// 재시도 대기 버퍼
///
/// `capacity`는 워커가 새 메시지 수신을 멈추는 기준입니다.
/// `push`는 용량을 넘어도 거절하지 않으므로, 이미 꺼낸 메시지를 잃지 않습니다.
#[derive(Debug)]
pub struct RetryBuffer {
    heap: BinaryHeap<Scheduled>,
    capacity: usize,
    next_seq: u64,
}

impl RetryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            capacity,
            next_seq: 0,
        }
    }

    /// `due` 시각에 다시 보낼 메시지를 넣습니다.
    pub fn push(&mut self, due: Instant, message: OutboundMessage) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.heap.push(Scheduled { due, seq, message });
    }

    /// 가장 이른 due 시각
    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|s| s.due)
    }

    /// `now` 이전이 due인 메시지 하나를 꺼냅니다.
    pub fn pop_due(&mut self, now: Instant) -> Option<OutboundMessage> {
        if self.heap.peek().is_some_and(|s| s.due <= now) {
            self.heap.pop().map(|s| s.message)
        } else {
            None
        }
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    fn msg(n: u64) -> OutboundMessage {
        OutboundMessage::new("/r", json!({ "n": n }))
    }

    #[test]
    fn pops_only_due_messages() {
        let base = Instant::now();
        let mut buffer = RetryBuffer::new(8);
        buffer.push(base + Duration::from_secs(10), msg(1));

        assert!(buffer.pop_due(base).is_none());
        assert_eq!(buffer.next_due(), Some(base + Duration::from_secs(10)));
        assert_eq!(buffer.len(), 1);

        let popped = buffer.pop_due(base + Duration::from_secs(10)).unwrap();
        assert_eq!(popped.payload["n"], 1);
        assert!(buffer.is_empty());
        assert!(buffer.next_due().is_none());
    }

    #[test]
    fn earliest_due_first() {
        let base = Instant::now();
        let mut buffer = RetryBuffer::new(8);
        buffer.push(base + Duration::from_secs(30), msg(3));
        buffer.push(base + Duration::from_secs(10), msg(1));
        buffer.push(base + Duration::from_secs(20), msg(2));

        let later = base + Duration::from_secs(60);
        let order: Vec<_> = std::iter::from_fn(|| buffer.pop_due(later))
            .map(|m| m.payload["n"].as_u64().unwrap())
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn same_due_is_fifo() {
        let due = Instant::now();
        let mut buffer = RetryBuffer::new(8);
        for n in 0..5 {
            buffer.push(due, msg(n));
        }
        let order: Vec<_> = std::iter::from_fn(|| buffer.pop_due(due))
            .map(|m| m.payload["n"].as_u64().unwrap())
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn full_is_soft_limit() {
        let now = Instant::now();
        let mut buffer = RetryBuffer::new(2);
        buffer.push(now, msg(1));
        assert!(!buffer.is_full());
        buffer.push(now, msg(2));
        assert!(buffer.is_full());
        buffer.push(now, msg(3));
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.capacity(), 2);
    }

    proptest! {
        #[test]
        fn drain_order_is_sorted_by_due_then_insertion(delays in proptest::collection::vec(0u64..50, 0..40)) {
            let base = Instant::now();
            let mut buffer = RetryBuffer::new(64);
            for (i, d) in delays.iter().enumerate() {
                buffer.push(base + Duration::from_millis(*d), msg(i as u64));
            }

            let end = base + Duration::from_secs(1);
            let drained: Vec<u64> = std::iter::from_fn(|| buffer.pop_due(end))
                .map(|m| m.payload["n"].as_u64().unwrap())
                .collect();

            let mut expected: Vec<(u64, u64)> =
                delays.iter().enumerate().map(|(i, d)| (*d, i as u64)).collect();
            expected.sort();
            let expected: Vec<u64> = expected.into_iter().map(|(_, i)| i).collect();
            prop_assert_eq!(drained, expected);
        }
    }
}
