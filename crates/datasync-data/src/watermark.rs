//! 워터마크 저장소.
//!
//! (테이블, 엔티티)별 마지막 동기화 시각을 `sync_watermark` 테이블에 보관합니다.
//! 기록이 없으면 데이터 테이블의 워터마크 컬럼 최댓값으로 대체하며,
//! 기록은 `GREATEST`로 갱신되어 뒤로 이동하지 않습니다.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, QueryBuilder};
use tracing::debug;

use datasync_core::{SyncTarget, TableSchema, Value};

use crate::error::{DataError, Result};
use crate::feed_table::{quote, table_exists};

/// 워터마크 저장소.
///
/// 서로 다른 대상에 대해서는 동시에 사용해도 안전해야 합니다.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// 마지막 동기화 시각 (없으면 `None`).
    async fn read(&self, schema: &TableSchema, target: &SyncTarget) -> Result<Option<NaiveDateTime>>;

    /// 워터마크 기록. 기존 값보다 이전이면 무시됩니다.
    async fn write(&self, target: &SyncTarget, watermark: NaiveDateTime) -> Result<()>;

    /// 테이블의 모든 워터마크 삭제.
    async fn reset(&self, table: &str) -> Result<u64>;
}

const CREATE_WATERMARK_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sync_watermark (
    table_name  TEXT        NOT NULL,
    entity_key  TEXT        NOT NULL DEFAULT '',
    watermark   TIMESTAMP   NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (table_name, entity_key)
)
"#;

/// PostgreSQL 워터마크 저장소.
#[derive(Clone)]
pub struct PgWatermarkStore {
    pool: PgPool,
}

impl PgWatermarkStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(CREATE_WATERMARK_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::SchemaError(format!("sync_watermark: {}", e)))?;
        Ok(())
    }

    /// 데이터 테이블에서 워터마크 컬럼 최댓값 조회.
    async fn max_from_table(
        &self,
        schema: &TableSchema,
        target: &SyncTarget,
    ) -> Result<Option<NaiveDateTime>> {
        if !table_exists(&self.pool, target.table).await? {
            return Ok(None);
        }
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT MAX({})::timestamp FROM {}",
            quote(target.watermark_column),
            quote(target.table)
        ));
        if let (Some(column), Some(entity)) = (target.entity_column, target.entity.as_deref()) {
            schema.column(column)?;
            qb.push(format!(" WHERE {} = ", quote(column)));
            qb.push_bind(entity.to_string());
        }

        let (max,) = qb
            .build_query_as::<(Option<NaiveDateTime>,)>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DataError::QueryError(e.to_string()))?;
        Ok(max)
    }
}

#[async_trait]
impl WatermarkStore for PgWatermarkStore {
    async fn read(&self, schema: &TableSchema, target: &SyncTarget) -> Result<Option<NaiveDateTime>> {
        let stored: Option<(NaiveDateTime,)> = sqlx::query_as(
            r#"
            SELECT watermark FROM sync_watermark
            WHERE table_name = $1 AND entity_key = $2
            "#,
        )
        .bind(target.table)
        .bind(target.entity_key())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DataError::QueryError(e.to_string()))?;

        match stored {
            Some((watermark,)) => Ok(Some(watermark)),
            None => {
                let fallback = self.max_from_table(schema, target).await?;
                debug!(target = %target, fallback = ?fallback, "저장된 워터마크 없음, 테이블 최댓값 사용");
                Ok(fallback)
            }
        }
    }

    async fn write(&self, target: &SyncTarget, watermark: NaiveDateTime) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_watermark (table_name, entity_key, watermark, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (table_name, entity_key) DO UPDATE SET
                watermark = GREATEST(sync_watermark.watermark, EXCLUDED.watermark),
                updated_at = NOW()
            "#,
        )
        .bind(target.table)
        .bind(target.entity_key())
        .bind(watermark)
        .execute(&self.pool)
        .await
        .map_err(|e| DataError::InsertError(format!("sync_watermark: {}", e)))?;
        Ok(())
    }

    async fn reset(&self, table: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sync_watermark WHERE table_name = $1")
            .bind(table)
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::QueryError(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

/// 엔티티 필터 값.
pub(crate) fn entity_value(target: &SyncTarget) -> Option<(&'static str, Value)> {
    match (target.entity_column, target.entity.as_deref()) {
        (Some(column), Some(entity)) => Some((column, Value::Text(entity.to_string()))),
        _ => None,
    }
}
