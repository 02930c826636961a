//! 핵심 에러 타입.

use thiserror::Error;

/// 날짜 계산 및 계획 단계 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 거래일 캘린더가 비어 있거나 기준일 이전 거래일이 없음
    #[error("거래일 캘린더에서 {0} 이전 거래일을 찾을 수 없습니다")]
    NoTradingDay(chrono::NaiveDate),

    /// 잘못된 기준일 상수
    #[error("잘못된 기준일: {0}")]
    InvalidEpoch(u32),

    /// 스키마에 없는 컬럼
    #[error("알 수 없는 컬럼: {table}.{column}")]
    UnknownColumn { table: String, column: String },
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CoreError>;
