//! 참조 데이터(거래일, 종목/보드/펀드 목록) 로드.
//!
//! 참조 테이블은 같은 실행의 참조 단계 피드가 먼저 채웁니다.
//! 테이블이 아직 없으면 빈 목록으로 취급합니다.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgPool;
use tracing::{info, warn};

use datasync_core::reference::is_tradable_a_share;
use datasync_core::{Entity, ReferenceData};

use crate::error::{DataError, Result};
use crate::feed_table::{quote, table_exists};

/// 참조 데이터 공급원.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    async fn load(&self) -> Result<ReferenceData>;
}

/// 엔티티 목록을 읽을 테이블과 컬럼.
#[derive(Debug, Clone, Copy)]
pub struct EntityQuery {
    pub table: &'static str,
    pub code_column: &'static str,
    pub name_column: &'static str,
    /// `column IN (values)` 조건
    pub filter: Option<(&'static str, &'static [&'static str])>,
}

impl EntityQuery {
    pub const fn new(table: &'static str, code_column: &'static str, name_column: &'static str) -> Self {
        Self {
            table,
            code_column,
            name_column,
            filter: None,
        }
    }

    pub const fn filtered(self, column: &'static str, values: &'static [&'static str]) -> Self {
        Self {
            filter: Some((column, values)),
            ..self
        }
    }
}

/// 참조 테이블 구성.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceTables {
    /// 거래일 (테이블, 날짜 컬럼)
    pub trade_dates: (&'static str, &'static str),
    pub a_shares: EntityQuery,
    pub hk_connect: EntityQuery,
    pub concept_boards: EntityQuery,
    pub industry_boards: EntityQuery,
    pub funds: EntityQuery,
}

/// PostgreSQL 참조 테이블에서 로드.
#[derive(Clone)]
pub struct PgReferenceSource {
    pool: PgPool,
    tables: ReferenceTables,
}

impl PgReferenceSource {
    pub fn new(pool: PgPool, tables: ReferenceTables) -> Self {
        Self { pool, tables }
    }

    async fn load_trade_dates(&self) -> Result<Vec<NaiveDate>> {
        let (table, column) = self.tables.trade_dates;
        if !table_exists(&self.pool, table).await? {
            warn!(table = table, "거래일 테이블 없음");
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {col}::date FROM {tbl} WHERE {col} IS NOT NULL ORDER BY 1",
            col = quote(column),
            tbl = quote(table)
        );
        let rows: Vec<(NaiveDate,)> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DataError::QueryError(format!("{}: {}", table, e)))?;
        Ok(rows.into_iter().map(|(d,)| d).collect())
    }

    async fn load_entities(&self, query: &EntityQuery) -> Result<Vec<Entity>> {
        if !table_exists(&self.pool, query.table).await? {
            warn!(table = query.table, "엔티티 테이블 없음");
            return Ok(Vec::new());
        }
        let mut sql = format!(
            "SELECT DISTINCT {code}::text, COALESCE({name}::text, '') FROM {tbl} WHERE {code} IS NOT NULL",
            code = quote(query.code_column),
            name = quote(query.name_column),
            tbl = quote(query.table)
        );
        let values: Vec<String> = match query.filter {
            Some((column, values)) => {
                sql.push_str(&format!(" AND {}::text = ANY($1)", quote(column)));
                values.iter().map(|v| v.to_string()).collect()
            }
            None => Vec::new(),
        };
        sql.push_str(" ORDER BY 1");

        let mut q = sqlx::query_as::<_, (String, String)>(&sql);
        if query.filter.is_some() {
            q = q.bind(values);
        }
        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DataError::QueryError(format!("{}: {}", query.table, e)))?;

        let mut entities: Vec<Entity> = Vec::with_capacity(rows.len());
        for (code, name) in rows {
            if entities.last().map(|e| e.code == code).unwrap_or(false) {
                continue;
            }
            entities.push(Entity::new(code, name));
        }
        Ok(entities)
    }
}

#[async_trait]
impl ReferenceSource for PgReferenceSource {
    async fn load(&self) -> Result<ReferenceData> {
        let trade_dates = self.load_trade_dates().await?;

        let mut a_shares = self.load_entities(&self.tables.a_shares).await?;
        a_shares.retain(|e| is_tradable_a_share(&e.code, &e.name));

        let data = ReferenceData {
            a_shares,
            hk_connect: self.load_entities(&self.tables.hk_connect).await?,
            concept_boards: self.load_entities(&self.tables.concept_boards).await?,
            industry_boards: self.load_entities(&self.tables.industry_boards).await?,
            funds: self.load_entities(&self.tables.funds).await?,
            ..Default::default()
        }
        .with_trade_dates(trade_dates);

        info!(
            trade_dates = data.trade_dates.len(),
            a_shares = data.a_shares.len(),
            hk_connect = data.hk_connect.len(),
            concept_boards = data.concept_boards.len(),
            industry_boards = data.industry_boards.len(),
            funds = data.funds.len(),
            "참조 데이터 로드 완료"
        );
        Ok(data)
    }
}

/// 고정 참조 데이터 (테스트 및 드라이런용).
#[derive(Debug, Clone, Default)]
pub struct StaticReference(pub ReferenceData);

#[async_trait]
impl ReferenceSource for StaticReference {
    async fn load(&self) -> Result<ReferenceData> {
        Ok(self.0.clone())
    }
}
