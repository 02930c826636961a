//! 시장 데이터 증분 동기화 Collector.
//!
//! 워터마크 기반으로 A주/홍콩/펀드 데이터를 주기적으로 수집해
//! PostgreSQL 피드 테이블에 저장합니다.
//!
//! - [`engine`]: 선언적 피드 정의와 동기화 실행기
//! - [`feeds`]: 피드 카탈로그
//! - [`orchestrator`]: 전체 실행 (참조 단계 → 피드 풀)

pub mod config;
pub mod engine;
pub mod error;
pub mod feeds;
pub mod orchestrator;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use orchestrator::{shanghai_now, Orchestrator, RunAllOptions, RunReport};
pub use stats::SyncStats;
