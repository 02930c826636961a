//! 에러 타입 정의.

use std::fmt;

use datasync_core::CoreError;
use datasync_data::DataError;
use datasync_provider::ProviderError;

/// Collector 에러 타입
#[derive(Debug)]
pub enum CollectorError {
    /// 데이터베이스 에러
    Database(sqlx::Error),
    /// 저장소 에러 (피드 테이블, 워터마크, 동기화 로그)
    Storage(DataError),
    /// 데이터 API 에러
    DataSource(ProviderError),
    /// 날짜 계산/스키마 정의 에러
    Planning(CoreError),
    /// 설정 에러
    Config(String),
    /// 워커 풀 에러 (태스크 패닉 등)
    Pool(String),
    /// 존재하지 않는 피드
    UnknownFeed(String),
    /// 일반 에러
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl CollectorError {
    /// 데이터 없음 에러 여부 (해당 구간만 건너뜀).
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::DataSource(e) if e.is_no_data())
    }
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(e) => write!(f, "Database error: {}", e),
            Self::Storage(e) => write!(f, "Storage error: {}", e),
            Self::DataSource(e) => write!(f, "Data source error: {}", e),
            Self::Planning(e) => write!(f, "Planning error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Pool(msg) => write!(f, "Worker pool error: {}", msg),
            Self::UnknownFeed(name) => write!(f, "Unknown feed: {}", name),
            Self::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for CollectorError {}

impl From<sqlx::Error> for CollectorError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}

impl From<DataError> for CollectorError {
    fn from(err: DataError) -> Self {
        Self::Storage(err)
    }
}

impl From<ProviderError> for CollectorError {
    fn from(err: ProviderError) -> Self {
        Self::DataSource(err)
    }
}

impl From<CoreError> for CollectorError {
    fn from(err: CoreError) -> Self {
        Self::Planning(err)
    }
}

impl From<std::env::VarError> for CollectorError {
    fn from(err: std::env::VarError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CollectorError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(err)
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
