//! 시장 데이터 API 클라이언트.
//!
//! - [`source`]: 데이터 소스 trait, 요청 타입, 전송 경로
//! - [`retry`]: 증분 백오프 재시도 페처
//! - [`aktools`]: AKTools HTTP 게이트웨이 클라이언트
//! - [`mock`]: 테스트용 데이터 소스

pub mod aktools;
pub mod error;
pub mod mock;
pub mod retry;
pub mod source;

pub use aktools::{AkToolsClient, AkToolsConfig};
pub use error::{ProviderError, Result};
pub use mock::MockDataSource;
pub use retry::{with_retry, RetryConfig, RetryingFetcher};
pub use source::{ApiRequest, DataSource, Record, Transport};
