//! 피드 테이블 저장소.
//!
//! 테이블 스키마로부터 DDL을 생성하고, 범위 삭제 후 추가(한 트랜잭션)
//! 또는 자연키 기준 병합으로 배치를 저장합니다.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::postgres::PgPool;
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, info};

use datasync_core::batch::Row;
use datasync_core::{Batch, ColumnKind, TableSchema, Value};

use crate::error::{DataError, Result};

/// PostgreSQL 바인드 파라미터 상한
const MAX_BIND_PARAMS: usize = 65_535;
/// INSERT 한 번에 넣는 최대 행 수
const MAX_CHUNK_ROWS: usize = 2_000;

/// 행 선택 조건.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column = value`
    Eq(&'static str, Value),
    /// `from <= column <= to` (날짜/시각 컬럼)
    Range {
        column: &'static str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    },
}

impl Filter {
    /// 메모리 상의 행이 조건을 만족하는지 확인.
    pub fn matches(&self, schema: &TableSchema, row: &Row) -> bool {
        match self {
            Filter::Eq(column, value) => schema
                .column_index(column)
                .map(|i| &row[i] == value)
                .unwrap_or(false),
            Filter::Range { column, from, to } => schema
                .column_index(column)
                .and_then(|i| row[i].as_datetime())
                .map(|dt| {
                    let kind = schema.column(column).map(|c| c.kind).ok();
                    if kind == Some(ColumnKind::Date) {
                        from.date() <= dt.date() && dt.date() <= to.date()
                    } else {
                        *from <= dt && dt <= *to
                    }
                })
                .unwrap_or(false),
        }
    }
}

/// 배치 저장 방식.
#[derive(Debug, Clone, Copy)]
pub enum WriteOp<'a> {
    /// 조건에 맞는 행을 삭제한 뒤 추가 (조건은 하나 이상)
    Replace(&'a [Filter]),
    /// 테이블 전체 삭제 후 추가
    ReplaceAll,
    /// 자연키 기준 병합
    Merge,
}

impl WriteOp<'_> {
    /// 저장 전에 실행할 삭제 조건.
    ///
    /// `None`이면 삭제하지 않고, 빈 목록이면 테이블 전체를 삭제합니다.
    /// 조건 없는 `Replace`는 전체 삭제와 구분되지 않으므로 거부합니다.
    pub fn delete_filters(&self, table: &str) -> Result<Option<&[Filter]>> {
        match *self {
            WriteOp::Replace([]) => Err(DataError::InsertError(format!(
                "{} 삭제 조건 없음: 전체 교체는 ReplaceAll 사용",
                table
            ))),
            WriteOp::Replace(filters) => Ok(Some(filters)),
            WriteOp::ReplaceAll => Ok(Some(&[])),
            WriteOp::Merge => Ok(None),
        }
    }
}

/// 피드 테이블 저장소.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// 테이블이 없으면 생성. `drop_existing`이면 삭제 후 재생성.
    async fn ensure_table(&self, schema: &'static TableSchema, drop_existing: bool) -> Result<()>;

    /// 배치 저장. 삭제와 추가는 하나의 트랜잭션으로 처리됩니다.
    ///
    /// # 반환
    /// 저장된 행 수
    async fn write(&self, batch: &Batch, op: WriteOp<'_>) -> Result<u64>;

    /// 날짜/시각 컬럼의 최댓값 (테이블이 없거나 비어 있으면 `None`).
    async fn max_value(
        &self,
        schema: &TableSchema,
        column: &str,
        filters: &[Filter],
    ) -> Result<Option<NaiveDateTime>>;

    /// 조건에 맞는 첫 행의 실수 컬럼 값.
    async fn lookup_float(
        &self,
        schema: &TableSchema,
        column: &str,
        filters: &[Filter],
    ) -> Result<Option<f64>>;
}

/// 값 종류에 맞는 타입으로 바인드 (NULL은 컬럼 타입으로 바인드).
macro_rules! push_typed_bind {
    ($target:expr, $value:expr, $kind:expr) => {
        match ($value, $kind) {
            (Value::Int(n), _) => {
                $target.push_bind(*n);
            }
            (Value::Float(f), _) => {
                $target.push_bind(*f);
            }
            (Value::Text(s), _) => {
                $target.push_bind(s.clone());
            }
            (Value::Date(d), _) => {
                $target.push_bind(*d);
            }
            (Value::DateTime(dt), _) => {
                $target.push_bind(*dt);
            }
            (Value::Null, ColumnKind::Int) => {
                $target.push_bind(None::<i64>);
            }
            (Value::Null, ColumnKind::Float(_)) => {
                $target.push_bind(None::<f64>);
            }
            (Value::Null, ColumnKind::Date) => {
                $target.push_bind(None::<NaiveDate>);
            }
            (Value::Null, ColumnKind::DateTime) => {
                $target.push_bind(None::<NaiveDateTime>);
            }
            (Value::Null, _) => {
                $target.push_bind(None::<String>);
            }
        }
    };
}

pub(crate) fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn sql_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Text | ColumnKind::TextMax(_) => "TEXT",
        ColumnKind::Code => "VARCHAR(16)",
        ColumnKind::Int => "BIGINT",
        ColumnKind::Float(_) => "DOUBLE PRECISION",
        ColumnKind::Date => "DATE",
        ColumnKind::DateTime => "TIMESTAMP",
    }
}

/// `CREATE TABLE` 및 인덱스 DDL.
pub fn create_table_ddl(schema: &TableSchema) -> Vec<String> {
    let columns = schema
        .columns
        .iter()
        .map(|c| format!("{} {}", quote(c.name), sql_type(c.kind)))
        .collect::<Vec<_>>()
        .join(", ");

    let mut ddl = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote(schema.table),
        columns
    )];

    if !schema.natural_key.is_empty() {
        ddl.push(format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
            quote(&format!("{}_natural_key", schema.table)),
            quote(schema.table),
            quote_list(schema.natural_key)
        ));
    }

    if let Some(entity) = schema.entity_column {
        ddl.push(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({}, {})",
            quote(&format!("{}_watermark", schema.table)),
            quote(schema.table),
            quote(entity),
            quote(schema.watermark_column)
        ));
    }

    ddl
}

fn quote_list(columns: &[&str]) -> String {
    columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ")
}

/// 자연키 충돌 시 나머지 컬럼을 갱신하는 절.
fn conflict_clause(schema: &TableSchema) -> String {
    if schema.natural_key.is_empty() {
        return String::new();
    }
    let updates = schema
        .columns
        .iter()
        .filter(|c| !schema.natural_key.contains(&c.name))
        .map(|c| format!("{0} = EXCLUDED.{0}", quote(c.name)))
        .collect::<Vec<_>>();

    if updates.is_empty() {
        format!(" ON CONFLICT ({}) DO NOTHING", quote_list(schema.natural_key))
    } else {
        format!(
            " ON CONFLICT ({}) DO UPDATE SET {}",
            quote_list(schema.natural_key),
            updates.join(", ")
        )
    }
}

fn push_range_bound(qb: &mut QueryBuilder<'_, Postgres>, bound: NaiveDateTime, kind: ColumnKind) {
    match kind {
        ColumnKind::Date => {
            qb.push_bind(bound.date());
        }
        _ => {
            qb.push_bind(bound);
        }
    }
}

fn push_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    schema: &TableSchema,
    filters: &[Filter],
) -> Result<()> {
    for (i, filter) in filters.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        match filter {
            Filter::Eq(column, value) => {
                let kind = schema.column(column)?.kind;
                qb.push(quote(column)).push(" = ");
                push_typed_bind!(qb, value, kind);
            }
            Filter::Range { column, from, to } => {
                let kind = schema.column(column)?.kind;
                qb.push(quote(column)).push(" BETWEEN ");
                push_range_bound(qb, *from, kind);
                qb.push(" AND ");
                push_range_bound(qb, *to, kind);
            }
        }
    }
    Ok(())
}

/// PostgreSQL 피드 테이블 저장소.
#[derive(Clone)]
pub struct PgFeedStore {
    pool: PgPool,
}

impl PgFeedStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(crate) async fn table_exists(&self, table: &str) -> Result<bool> {
        table_exists(&self.pool, table).await
    }
}

pub(crate) async fn table_exists(pool: &PgPool, table: &str) -> Result<bool> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM information_schema.tables
            WHERE table_schema = current_schema() AND table_name = $1
        )
        "#,
    )
    .bind(table)
    .fetch_one(pool)
    .await
    .map_err(|e| DataError::QueryError(e.to_string()))
}

#[async_trait]
impl FeedStore for PgFeedStore {
    async fn ensure_table(&self, schema: &'static TableSchema, drop_existing: bool) -> Result<()> {
        schema.validate()?;

        if drop_existing {
            let drop = format!("DROP TABLE IF EXISTS {}", quote(schema.table));
            sqlx::query(&drop)
                .execute(&self.pool)
                .await
                .map_err(|e| DataError::SchemaError(format!("{}: {}", schema.table, e)))?;
            info!(table = schema.table, "테이블 삭제 후 재생성");
        }

        for statement in create_table_ddl(schema) {
            sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .map_err(|e| DataError::SchemaError(format!("{}: {}", schema.table, e)))?;
        }
        Ok(())
    }

    async fn write(&self, batch: &Batch, op: WriteOp<'_>) -> Result<u64> {
        let schema = batch.schema;
        let delete = op.delete_filters(schema.table)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DataError::InsertError(e.to_string()))?;

        let mut deleted = 0;
        if let Some(filters) = delete {
            let mut qb = QueryBuilder::<Postgres>::new(format!("DELETE FROM {}", quote(schema.table)));
            push_filters(&mut qb, schema, filters)?;
            deleted = qb
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| DataError::InsertError(format!("{} 삭제 실패: {}", schema.table, e)))?
                .rows_affected();
        }

        let column_count = schema.columns.len().max(1);
        let chunk_rows = (MAX_BIND_PARAMS / column_count).clamp(1, MAX_CHUNK_ROWS);
        let prefix = format!(
            "INSERT INTO {} ({}) ",
            quote(schema.table),
            schema
                .columns
                .iter()
                .map(|c| quote(c.name))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let conflict = conflict_clause(schema);

        let mut written = 0;
        for chunk in batch.rows.chunks(chunk_rows) {
            let mut qb = QueryBuilder::<Postgres>::new(prefix.as_str());
            qb.push_values(chunk, |mut b, row| {
                for (value, column) in row.iter().zip(schema.columns) {
                    push_typed_bind!(b, value, column.kind);
                }
            });
            qb.push(conflict.as_str());

            written += qb
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| DataError::InsertError(format!("{} 저장 실패: {}", schema.table, e)))?
                .rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| DataError::InsertError(e.to_string()))?;

        debug!(
            table = schema.table,
            deleted = deleted,
            written = written,
            "배치 저장 완료"
        );
        Ok(written)
    }

    async fn max_value(
        &self,
        schema: &TableSchema,
        column: &str,
        filters: &[Filter],
    ) -> Result<Option<NaiveDateTime>> {
        if !self.table_exists(schema.table).await? {
            return Ok(None);
        }
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT MAX({})::timestamp FROM {}",
            quote(column),
            quote(schema.table)
        ));
        push_filters(&mut qb, schema, filters)?;

        let (max,) = qb
            .build_query_as::<(Option<NaiveDateTime>,)>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DataError::QueryError(e.to_string()))?;
        Ok(max)
    }

    async fn lookup_float(
        &self,
        schema: &TableSchema,
        column: &str,
        filters: &[Filter],
    ) -> Result<Option<f64>> {
        if !self.table_exists(schema.table).await? {
            return Ok(None);
        }
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {}::float8 FROM {}",
            quote(column),
            quote(schema.table)
        ));
        push_filters(&mut qb, schema, filters)?;
        qb.push(" LIMIT 1");

        let row = qb
            .build_query_as::<(Option<f64>,)>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DataError::QueryError(e.to_string()))?;
        Ok(row.and_then(|(v,)| v))
    }
}
