//! 데이터 API 재시도 유틸리티.
//!
//! 네트워크 오류, 응답 파싱 실패, 호출 한도 초과 등 일시적인 오류에 대해
//! 선형 증가 대기 후 재시도합니다. 결과 없음(`NoData`)은 재시도하지 않습니다.
//!
//! # 예시
//!
//! ```rust,ignore
//! use datasync_provider::{RetryConfig, RetryingFetcher};
//!
//! let fetcher = RetryingFetcher::new(source, RetryConfig::default());
//! let rows = fetcher.fetch(&request, Transport::Direct).await?;
//! ```

use std::{fmt::Display, future::Future, sync::Arc, time::Duration};

use tracing::{debug, warn};

use crate::error::Result;
use crate::source::{ApiRequest, DataSource, Record, Transport};

/// 재시도 설정.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// 최대 시도 횟수 (초기 시도 포함).
    pub max_attempts: u32,
    /// 첫 재시도 대기 시간.
    pub start: Duration,
    /// 재시도마다 늘어나는 대기 시간.
    pub increment: Duration,
    /// 최대 대기 시간.
    pub max_wait: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            start: Duration::from_secs(5),
            increment: Duration::from_secs(5),
            max_wait: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// 재무제표 피드용 설정 (짧은 대기, 적은 시도).
    pub fn fundamentals() -> Self {
        Self {
            max_attempts: 5,
            start: Duration::from_secs(3),
            increment: Duration::from_secs(3),
            max_wait: Duration::from_secs(20),
        }
    }

    /// 재시도 없음 (단일 시도).
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// `attempt`번째 실패 후 대기 시간 (1부터 시작).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let steps = attempt.saturating_sub(1);
        let delay = self.start + self.increment.saturating_mul(steps);
        delay.min(self.max_wait)
    }
}

/// 재시도가 포함된 비동기 작업 실행.
///
/// # Arguments
/// * `config` - 재시도 설정
/// * `label` - 로그에 남길 작업 설명
/// * `operation` - 실행할 비동기 작업
///
/// # Returns
/// 성공 결과, 또는 재시도 불가 에러나 마지막 시도의 에러
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    label: &(dyn Display + Sync),
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    let mut total_delay = Duration::ZERO;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        request = %label,
                        attempts = attempt,
                        total_delay_ms = total_delay.as_millis() as u64,
                        "재시도 후 성공"
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                if !e.is_retryable() {
                    debug!(request = %label, error = %e, "재시도 불가능한 에러, 즉시 반환");
                    return Err(e);
                }

                if attempt >= config.max_attempts {
                    warn!(
                        request = %label,
                        error = %e,
                        attempts = attempt,
                        "최대 시도 횟수 초과"
                    );
                    return Err(e);
                }

                let delay = config.delay_for(attempt);
                total_delay += delay;

                warn!(
                    request = %label,
                    error = %e,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "재시도 대기 중"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// 재시도 래퍼가 적용된 데이터 소스.
#[derive(Clone)]
pub struct RetryingFetcher {
    source: Arc<dyn DataSource>,
    config: RetryConfig,
}

impl RetryingFetcher {
    pub fn new(source: Arc<dyn DataSource>, config: RetryConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// 기본 재시도 설정으로 호출.
    pub async fn fetch(&self, request: &ApiRequest, transport: Transport) -> Result<Vec<Record>> {
        self.fetch_with(&self.config, request, transport).await
    }

    /// 지정한 재시도 설정으로 호출.
    pub async fn fetch_with(
        &self,
        config: &RetryConfig,
        request: &ApiRequest,
        transport: Transport,
    ) -> Result<Vec<Record>> {
        with_retry(config, request, || self.source.fetch(request, transport)).await
    }
}

impl std::fmt::Debug for RetryingFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingFetcher")
            .field("config", &self.config)
            .finish()
    }
}
