//! 저장소 에러 타입.

use thiserror::Error;

use datasync_core::CoreError;

#[derive(Debug, Error)]
pub enum DataError {
    /// 연결 실패
    #[error("데이터베이스 연결 에러: {0}")]
    ConnectionError(String),

    /// 조회 실패
    #[error("쿼리 에러: {0}")]
    QueryError(String),

    /// 저장 실패
    #[error("저장 에러: {0}")]
    InsertError(String),

    /// 테이블 생성/삭제 실패
    #[error("스키마 에러: {0}")]
    SchemaError(String),

    #[error("스키마 정의 에러: {0}")]
    Definition(#[from] CoreError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, DataError>;
