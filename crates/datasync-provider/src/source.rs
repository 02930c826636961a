//! 데이터 소스 추상화.

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;

/// API 응답의 한 행 (컬럼명 → 값).
pub type Record = serde_json::Map<String, serde_json::Value>;

/// 외부 호출 전송 경로.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// 직접 연결
    #[default]
    Direct,
    /// 프록시 경유
    Proxy,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Direct => write!(f, "direct"),
            Transport::Proxy => write!(f, "proxy"),
        }
    }
}

/// 데이터 API 함수 호출 요청.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// API 함수 이름 (예: `stock_zh_a_hist`)
    pub function: String,
    /// 쿼리 파라미터 (순서 유지)
    pub params: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.function)?;
        for (i, (k, v)) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        write!(f, ")")
    }
}

/// 표 형태 데이터를 반환하는 외부 데이터 소스.
///
/// 결과가 없는 경우는 빈 목록 또는 [`ProviderError::NoData`](crate::ProviderError::NoData)로
/// 일시적 장애와 구분됩니다.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch(&self, request: &ApiRequest, transport: Transport) -> Result<Vec<Record>>;
}
