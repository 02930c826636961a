//! 테스트용 데이터 소스.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::source::{ApiRequest, DataSource, Record, Transport};

type Responder = dyn Fn(&ApiRequest, Transport) -> Result<Vec<Record>> + Send + Sync;

/// 요청마다 응답 함수를 호출하고 호출 이력을 기록하는 데이터 소스.
pub struct MockDataSource {
    responder: Box<Responder>,
    calls: Mutex<Vec<(ApiRequest, Transport)>>,
}

impl MockDataSource {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ApiRequest, Transport) -> Result<Vec<Record>> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 호출 이력 (요청 순서대로).
    pub fn calls(&self) -> Vec<(ApiRequest, Transport)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for MockDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDataSource")
            .field("calls", &self.call_count())
            .finish()
    }
}

#[async_trait]
impl DataSource for MockDataSource {
    async fn fetch(&self, request: &ApiRequest, transport: Transport) -> Result<Vec<Record>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((request.clone(), transport));
        }
        (self.responder)(request, transport)
    }
}
