//! 동기화 로그.
//!
//! (모듈, 테이블)별 마지막 성공 일자와 상태를 기록합니다.
//! 같은 키의 이전 기록은 덮어씁니다.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::postgres::PgPool;
use sqlx::FromRow;

use crate::error::{DataError, Result};

/// 동기화 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncState {
    Success,
    Failed,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Success => "SUCCESS",
            SyncState::Failed => "FAILED",
        }
    }

    fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("SUCCESS") {
            SyncState::Success
        } else {
            SyncState::Failed
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 동기화 로그 항목.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncLogEntry {
    pub module: String,
    pub table_name: String,
    pub last_date: Option<NaiveDate>,
    pub state: SyncState,
    pub updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct SyncLogRecord {
    module_name: String,
    table_name: String,
    last_date: Option<NaiveDate>,
    state: String,
    update_time: DateTime<Utc>,
}

impl From<SyncLogRecord> for SyncLogEntry {
    fn from(r: SyncLogRecord) -> Self {
        Self {
            module: r.module_name,
            table_name: r.table_name,
            last_date: r.last_date,
            state: SyncState::parse(&r.state),
            updated_at: r.update_time,
        }
    }
}

#[async_trait]
pub trait SyncLog: Send + Sync {
    async fn record_success(&self, module: &str, table: &str, last_date: NaiveDate) -> Result<()>;

    /// 실패 기록. 마지막 성공 일자는 유지됩니다.
    async fn record_failure(&self, module: &str, table: &str) -> Result<()>;

    /// 전체 로그 (모듈, 테이블 순).
    async fn snapshot(&self) -> Result<Vec<SyncLogEntry>>;
}

const CREATE_SYNC_LOG_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sync_logs (
    module_name TEXT        NOT NULL,
    table_name  TEXT        NOT NULL,
    last_date   DATE,
    state       TEXT        NOT NULL,
    update_time TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (module_name, table_name)
)
"#;

/// PostgreSQL 동기화 로그.
#[derive(Clone)]
pub struct PgSyncLog {
    pool: PgPool,
}

impl PgSyncLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(CREATE_SYNC_LOG_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::SchemaError(format!("sync_logs: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl SyncLog for PgSyncLog {
    async fn record_success(&self, module: &str, table: &str, last_date: NaiveDate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_logs (module_name, table_name, last_date, state, update_time)
            VALUES ($1, $2, $3, 'SUCCESS', NOW())
            ON CONFLICT (module_name, table_name) DO UPDATE SET
                last_date = EXCLUDED.last_date,
                state = 'SUCCESS',
                update_time = NOW()
            "#,
        )
        .bind(module)
        .bind(table)
        .bind(last_date)
        .execute(&self.pool)
        .await
        .map_err(|e| DataError::InsertError(format!("sync_logs: {}", e)))?;
        Ok(())
    }

    async fn record_failure(&self, module: &str, table: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_logs (module_name, table_name, last_date, state, update_time)
            VALUES ($1, $2, NULL, 'FAILED', NOW())
            ON CONFLICT (module_name, table_name) DO UPDATE SET
                state = 'FAILED',
                update_time = NOW()
            "#,
        )
        .bind(module)
        .bind(table)
        .execute(&self.pool)
        .await
        .map_err(|e| DataError::InsertError(format!("sync_logs: {}", e)))?;
        Ok(())
    }

    async fn snapshot(&self) -> Result<Vec<SyncLogEntry>> {
        let records: Vec<SyncLogRecord> = sqlx::query_as(
            r#"
            SELECT module_name, table_name, last_date, state, update_time
            FROM sync_logs
            ORDER BY module_name, table_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DataError::QueryError(e.to_string()))?;

        Ok(records.into_iter().map(SyncLogEntry::from).collect())
    }
}
