//! 환경변수 기반 설정 모듈.

use std::time::Duration;

use datasync_provider::{AkToolsConfig, RetryConfig, Transport};

use crate::Result;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL
    pub database_url: String,
    /// 연결 풀 최대 연결 수
    pub db_max_connections: u32,
    /// 데이터 API 설정
    pub api: ApiConfig,
    /// 동기화 실행 설정
    pub sync: SyncConfig,
    /// 재시도 설정
    pub retry: RetrySettings,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
}

/// 데이터 API 설정
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// AKTools 게이트웨이 주소
    pub base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// HTTP 프록시
    pub proxy_http: Option<String>,
    /// HTTPS 프록시
    pub proxy_https: Option<String>,
}

/// 동기화 실행 설정
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 프록시 경유 여부 (피드별 강제 직접 연결은 예외)
    pub use_proxy: bool,
    /// 피드 풀 크기
    pub processes: usize,
    /// 엔티티별 피드의 기본 워커 수
    pub default_workers: usize,
}

/// 재시도 설정 (기본 프리셋)
#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub start_secs: u64,
    pub increment_secs: u64,
    pub max_wait_secs: u64,
}

/// 데몬 모드 설정
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 전체 동기화 실행 주기 (분 단위)
    pub interval_minutes: u64,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            crate::error::CollectorError::Config(
                "DATABASE_URL 환경변수가 설정되지 않았습니다".to_string(),
            )
        })?;

        Ok(Self {
            database_url,
            db_max_connections: env_var_parse("DB_MAX_CONNECTIONS", 16),
            api: ApiConfig {
                base_url: env_var_parse(
                    "DATA_API_BASE_URL",
                    "http://127.0.0.1:8080".to_string(),
                ),
                timeout_secs: env_var_parse("DATA_API_TIMEOUT_SECS", 30),
                proxy_http: env_var_opt("SYNC_PROXY_HTTP"),
                proxy_https: env_var_opt("SYNC_PROXY_HTTPS"),
            },
            sync: SyncConfig {
                use_proxy: env_var_bool("SYNC_USE_PROXY", false),
                processes: env_var_parse("SYNC_PROCESSES", 12usize).max(1),
                default_workers: env_var_parse("SYNC_DEFAULT_WORKERS", 5usize).max(1),
            },
            retry: RetrySettings {
                max_attempts: env_var_parse("RETRY_MAX_ATTEMPTS", 10u32).max(1),
                start_secs: env_var_parse("RETRY_START_SECS", 5),
                increment_secs: env_var_parse("RETRY_INCREMENT_SECS", 5),
                max_wait_secs: env_var_parse("RETRY_MAX_WAIT_SECS", 60),
            },
            daemon: DaemonConfig {
                interval_minutes: env_var_parse("DAEMON_INTERVAL_MINUTES", 1440u64).max(1),
            },
        })
    }

    /// AKTools 클라이언트 설정
    pub fn api_client_config(&self) -> AkToolsConfig {
        AkToolsConfig {
            base_url: self.api.base_url.clone(),
            timeout: Duration::from_secs(self.api.timeout_secs),
            proxy_http: self.api.proxy_http.clone(),
            proxy_https: self.api.proxy_https.clone(),
        }
    }

    /// 기본 전송 경로 (CLI 플래그가 우선)
    pub fn transport(&self, proxy_flag: bool) -> Transport {
        if proxy_flag || self.sync.use_proxy {
            Transport::Proxy
        } else {
            Transport::Direct
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            start: Duration::from_secs(self.start_secs),
            increment: Duration::from_secs(self.increment_secs),
            max_wait: Duration::from_secs(self.max_wait_secs),
        }
    }
}

impl DaemonConfig {
    /// 실행 주기를 Duration으로 반환
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 bool 값 파싱
fn env_var_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

/// 비어 있지 않은 환경변수 값
fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_settings_conversion() {
        let settings = RetrySettings {
            max_attempts: 10,
            start_secs: 5,
            increment_secs: 5,
            max_wait_secs: 60,
        };
        assert_eq!(settings.to_retry_config(), RetryConfig::default());
    }

    #[test]
    fn test_env_helpers_fall_back_to_defaults() {
        assert_eq!(env_var_parse("DATASYNC_TEST_UNSET_NUMBER", 7u32), 7);
        assert!(env_var_bool("DATASYNC_TEST_UNSET_BOOL", true));
        assert_eq!(env_var_opt("DATASYNC_TEST_UNSET_TEXT"), None);
    }

    #[test]
    fn test_daemon_interval() {
        let daemon = DaemonConfig {
            interval_minutes: 90,
        };
        assert_eq!(daemon.interval(), Duration::from_secs(5400));
    }
}
