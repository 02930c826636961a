//! 데이터 소스 에러 타입.

use thiserror::Error;

/// 데이터 API 호출 에러.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 네트워크 에러
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 요청 타임아웃
    #[error("요청 타임아웃: {0}")]
    Timeout(String),

    /// 호출 한도 초과
    #[error("호출 한도 초과: {0}")]
    RateLimited(String),

    /// HTTP 에러 응답
    #[error("HTTP 에러 {status}: {body}")]
    Http { status: u16, body: String },

    /// 응답 형식 오류
    #[error("응답 파싱 에러: {0}")]
    Malformed(String),

    /// 조회 결과 없음 (재시도하지 않음)
    #[error("데이터 없음: {function}")]
    NoData { function: String },

    /// 클라이언트 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),
}

impl ProviderError {
    /// 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(_)
            | ProviderError::Timeout(_)
            | ProviderError::RateLimited(_)
            | ProviderError::Malformed(_) => true,
            ProviderError::Http { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            ProviderError::NoData { .. } | ProviderError::Config(_) => false,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, ProviderError::NoData { .. })
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Malformed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(ProviderError::Network("reset".into()).is_retryable());
        assert!(ProviderError::Malformed("eof".into()).is_retryable());
        assert!(ProviderError::Http { status: 502, body: String::new() }.is_retryable());
        assert!(ProviderError::Http { status: 429, body: String::new() }.is_retryable());
        assert!(!ProviderError::Http { status: 400, body: String::new() }.is_retryable());
        assert!(!ProviderError::NoData { function: "stock_zcfz_em".into() }.is_retryable());
        assert!(ProviderError::NoData { function: "stock_zcfz_em".into() }.is_no_data());
    }
}
