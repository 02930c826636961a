//! AKTools HTTP 게이트웨이 클라이언트.
//!
//! `GET {base_url}/api/public/{function}?{params}` 형태로 호출하며
//! 응답은 행 객체의 JSON 배열입니다.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::error::{ProviderError, Result};
use crate::source::{ApiRequest, DataSource, Record, Transport};

/// 게이트웨이 설정.
#[derive(Debug, Clone)]
pub struct AkToolsConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// HTTP 프록시 URL
    pub proxy_http: Option<String>,
    /// HTTPS 프록시 URL
    pub proxy_https: Option<String>,
}

impl Default for AkToolsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout: Duration::from_secs(30),
            proxy_http: None,
            proxy_https: None,
        }
    }
}

/// AKTools 클라이언트.
///
/// 직접 연결용 클라이언트와 프록시 경유 클라이언트를 한 번씩 생성해 두고
/// 호출마다 [`Transport`]로 선택합니다.
#[derive(Debug, Clone)]
pub struct AkToolsClient {
    base_url: String,
    direct: Client,
    proxied: Option<Client>,
}

impl AkToolsClient {
    pub fn new(config: AkToolsConfig) -> Result<Self> {
        let direct = Client::builder()
            .timeout(config.timeout)
            .no_proxy()
            .build()
            .map_err(|e| ProviderError::Config(e.to_string()))?;

        let proxied = if config.proxy_http.is_some() || config.proxy_https.is_some() {
            let mut builder = Client::builder().timeout(config.timeout);
            if let Some(url) = &config.proxy_http {
                let proxy = reqwest::Proxy::http(url.as_str())
                    .map_err(|e| ProviderError::Config(format!("HTTP 프록시 {}: {}", url, e)))?;
                builder = builder.proxy(proxy);
            }
            if let Some(url) = &config.proxy_https {
                let proxy = reqwest::Proxy::https(url.as_str())
                    .map_err(|e| ProviderError::Config(format!("HTTPS 프록시 {}: {}", url, e)))?;
                builder = builder.proxy(proxy);
            }
            Some(
                builder
                    .build()
                    .map_err(|e| ProviderError::Config(e.to_string()))?,
            )
        } else {
            None
        };

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            direct,
            proxied,
        })
    }

    pub fn has_proxy(&self) -> bool {
        self.proxied.is_some()
    }

    fn client(&self, transport: Transport) -> Result<&Client> {
        match transport {
            Transport::Direct => Ok(&self.direct),
            Transport::Proxy => self
                .proxied
                .as_ref()
                .ok_or_else(|| ProviderError::Config("프록시가 설정되지 않았습니다".to_string())),
        }
    }
}

#[async_trait]
impl DataSource for AkToolsClient {
    async fn fetch(&self, request: &ApiRequest, transport: Transport) -> Result<Vec<Record>> {
        let url = format!("{}/api/public/{}", self.base_url, request.function);
        debug!(request = %request, %transport, "데이터 API 호출");

        let response = self
            .client(transport)?
            .get(&url)
            .query(&request.params)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NoData {
                function: request.function.clone(),
            });
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited(request.to_string()));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        parse_rows(&request.function, &text)
    }
}

/// 응답 본문을 행 목록으로 변환.
fn parse_rows(function: &str, body: &str) -> Result<Vec<Record>> {
    if body.trim().is_empty() {
        return Err(ProviderError::NoData {
            function: function.to_string(),
        });
    }
    match serde_json::from_str::<Value>(body)? {
        Value::Null => Err(ProviderError::NoData {
            function: function.to_string(),
        }),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(ProviderError::Malformed(format!(
                    "{}: 행이 객체가 아닙니다 ({})",
                    function, other
                ))),
            })
            .collect(),
        other => Err(ProviderError::Malformed(format!(
            "{}: 배열이 아닌 응답 ({})",
            function,
            other.to_string().chars().take(80).collect::<String>()
        ))),
    }
}
