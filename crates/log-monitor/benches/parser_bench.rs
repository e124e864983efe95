//! 라인 파서 / 규칙 평가 벤치마크
//!
//! JSON 라인 파싱과 역할별 내장 규칙 테이블 평가의 처리량을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rigwatch_core::Role;
use rigwatch_log_monitor::parser::{CandidateBlock, JsonLineParser};
use rigwatch_log_monitor::rule::RuleTable;

/// 짧은 info 라인
const LINE_SHORT: &str = r#"{"level":"info","ts":"2024-05-01T10:00:00.123+0800","logger":"chain","caller":"chain/sync.go:190","msg":"incoming block from peer"}"#;

/// 채굴 블록 라인
const LINE_MINED: &str = r#"{"level":"info","ts":"2024-05-01T10:00:00.123+0800","logger":"miner","caller":"miner/miner.go:475","msg":"mined new block","cid":{"/":"bafy2bzacecnamqgqmifpluoeldx7zzglxcljo6oja4vrmtj7432rphldpdmm2"},"height":"1024000","took":"4.251s","parents":[{"/":"bafy2bzaceaxyz"},{"/":"bafy2bzaceaabc"}]}"#;

/// 에러 라인
const LINE_ERROR: &str = r#"{"level":"error","ts":1714557600.25,"logger":"rpc","caller":"rpc/client.go:88","msg":"request failed","error":"dial tcp 10.0.0.2:2345: connect: connection refused","attempt":3}"#;

fn bench_parse(c: &mut Criterion) {
    let parser = JsonLineParser::default();
    let mut group = c.benchmark_group("json_line_parse");
    group.throughput(Throughput::Elements(1));

    for (name, line) in [
        ("short", LINE_SHORT),
        ("mined_block", LINE_MINED),
        ("error", LINE_ERROR),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), line, |b, line| {
            b.iter(|| parser.parse(black_box(line)).unwrap())
        });
    }

    group.finish();
}

fn bench_block_extract(c: &mut Criterion) {
    let line = JsonLineParser::default().parse(LINE_MINED).unwrap();
    c.bench_function("candidate_block_from_line", |b| {
        b.iter(|| CandidateBlock::from_line(black_box(&line)))
    });
}

fn bench_rules(c: &mut Criterion) {
    let parser = JsonLineParser::default();
    let lines = [
        parser.parse(LINE_SHORT).unwrap(),
        parser.parse(LINE_MINED).unwrap(),
        parser.parse(LINE_ERROR).unwrap(),
    ];

    let mut group = c.benchmark_group("builtin_rules");
    group.throughput(Throughput::Elements(lines.len() as u64));
    for role in Role::ALL {
        let table = RuleTable::builtin(role);
        group.bench_function(BenchmarkId::from_parameter(role), |b| {
            b.iter(|| {
                lines
                    .iter()
                    .map(|l| table.evaluate(black_box(l)).count())
                    .sum::<usize>()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_block_extract, bench_rules);
criterion_main!(benches);
