#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`checkpoint`]: 파일별 마지막 전달 타임스탬프 저장소
//! - [`tailer`]: 로그 파일 추적, 로테이션/truncation 감지, 중복 억제
//! - [`handoff`]: 테일러와 분석기 사이의 ack 기반 랑데부
//! - [`parser`]: JSON 라인 파서와 채굴 블록 레코드 추출
//! - [`rule`]: 역할별 내장 규칙과 YAML 규칙 파일
//! - [`analyzer`]: 역할별 카운터와 채굴 블록 fork 분류
//! - [`chain`]: 체인 높이 조회 (Lotus JSON-RPC)
//! - [`scrape`]: 스크레이프 시점 메트릭 수집
//! - [`monitor`]: 전체 조립 ([`LogMonitorBuilder`])
//! - [`config`]: 모니터 설정 (core 설정 변환)
//! - [`error`]: 도메인 에러 타입

pub mod analyzer;
pub mod chain;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod handoff;
pub mod monitor;
pub mod parser;
pub mod rule;
pub mod scrape;
pub mod tailer;

// --- 주요 타입 re-export ---

// 모니터
pub use monitor::{LogMonitor, LogMonitorBuilder};

// 설정
pub use config::LogMonitorConfig;

// 에러
pub use error::LogMonitorError;

// 테일러 / 체크포인트
pub use checkpoint::{CheckpointStore, FileCheckpointStore};
pub use tailer::{Tailer, TailerConfig, TailerState};

// 분석기
pub use analyzer::{Analyzer, ClassifyOutcome, TimingStats};

// 체인 조회
pub use chain::{ChainLookup, HttpChainLookup};

// 파서
pub use parser::{CandidateBlock, JsonLineParser};

// 규칙
pub use rule::{RuleLoader, RuleSpec, RuleTable};

// 수집기
pub use scrape::MetricsCollector;
