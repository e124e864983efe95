//! 로그 라인 파서
//!
//! - [`json`]: 한 줄 JSON 레코드를 [`LogLine`](rigwatch_core::LogLine)으로 변환
//! - [`block`]: 채굴 블록 레코드 추출

pub mod block;
pub mod json;

pub use block::CandidateBlock;
pub use json::JsonLineParser;
