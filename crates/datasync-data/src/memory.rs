//! 메모리 저장소.
//!
//! PostgreSQL 저장소와 같은 의미(트랜잭션 단위 범위 교체, 자연키 병합,
//! 단조 증가 워터마크)를 프로세스 메모리에서 제공합니다.
//! 수집기 통합 테스트와 드라이런에서 사용합니다.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};

use datasync_core::batch::Row;
use datasync_core::{Batch, SyncTarget, TableSchema};

use crate::error::{DataError, Result};
use crate::feed_table::{FeedStore, Filter, WriteOp};
use crate::sync_log::{SyncLog, SyncLogEntry, SyncState};
use crate::watermark::{entity_value, WatermarkStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct MemoryTable {
    schema: &'static TableSchema,
    rows: Vec<Row>,
}

impl MemoryTable {
    fn key_indices(&self) -> Vec<usize> {
        self.schema
            .natural_key
            .iter()
            .filter_map(|k| self.schema.column_index(k))
            .collect()
    }

    fn upsert(&mut self, row: Row, key: &[usize]) {
        if !key.is_empty() {
            if let Some(existing) = self
                .rows
                .iter_mut()
                .find(|r| key.iter().all(|&i| r[i] == row[i]))
            {
                *existing = row;
                return;
            }
        }
        self.rows.push(row);
    }
}

/// 메모리 피드 테이블 저장소.
#[derive(Default)]
pub struct MemoryFeedStore {
    tables: Mutex<HashMap<&'static str, MemoryTable>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryFeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 테이블 쓰기를 실패하게 설정.
    pub fn fail_writes(&self, table: &str) {
        lock(&self.failing).insert(table.to_string());
    }

    /// 테이블에 저장된 행 (없으면 빈 목록).
    pub fn rows(&self, table: &str) -> Vec<Row> {
        lock(&self.tables)
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn has_table(&self, table: &str) -> bool {
        lock(&self.tables).contains_key(table)
    }

    /// 스키마와 행을 직접 넣기 (테스트 준비용).
    pub fn seed(&self, schema: &'static TableSchema, rows: Vec<Row>) {
        lock(&self.tables).insert(schema.table, MemoryTable { schema, rows });
    }

    fn matching<'a>(
        table: &'a MemoryTable,
        schema: &'a TableSchema,
        filters: &'a [Filter],
    ) -> impl Iterator<Item = &'a Row> + 'a {
        table
            .rows
            .iter()
            .filter(move |row| filters.iter().all(|f| f.matches(schema, row)))
    }
}

#[async_trait]
impl FeedStore for MemoryFeedStore {
    async fn ensure_table(&self, schema: &'static TableSchema, drop_existing: bool) -> Result<()> {
        schema.validate()?;
        let mut tables = lock(&self.tables);
        if drop_existing {
            tables.remove(schema.table);
        }
        tables.entry(schema.table).or_insert_with(|| MemoryTable {
            schema,
            rows: Vec::new(),
        });
        Ok(())
    }

    async fn write(&self, batch: &Batch, op: WriteOp<'_>) -> Result<u64> {
        let schema = batch.schema;
        if lock(&self.failing).contains(schema.table) {
            return Err(DataError::InsertError(format!(
                "{} 저장 실패: 쓰기 차단됨",
                schema.table
            )));
        }

        let delete = op.delete_filters(schema.table)?;
        let mut tables = lock(&self.tables);
        let table = tables.get_mut(schema.table).ok_or_else(|| {
            DataError::InsertError(format!("{} 저장 실패: 테이블 없음", schema.table))
        })?;

        if let Some(filters) = delete {
            table
                .rows
                .retain(|row| !filters.iter().all(|f| f.matches(schema, row)));
        }

        let key = table.key_indices();
        for row in &batch.rows {
            table.upsert(row.clone(), &key);
        }
        Ok(batch.rows.len() as u64)
    }

    async fn max_value(
        &self,
        schema: &TableSchema,
        column: &str,
        filters: &[Filter],
    ) -> Result<Option<NaiveDateTime>> {
        let tables = lock(&self.tables);
        let Some(table) = tables.get(schema.table) else {
            return Ok(None);
        };
        let idx = schema.column(column).map(|_| schema.column_index(column))?;
        Ok(Self::matching(table, schema, filters)
            .filter_map(|row| idx.and_then(|i| row[i].as_datetime()))
            .max())
    }

    async fn lookup_float(
        &self,
        schema: &TableSchema,
        column: &str,
        filters: &[Filter],
    ) -> Result<Option<f64>> {
        let tables = lock(&self.tables);
        let Some(table) = tables.get(schema.table) else {
            return Ok(None);
        };
        let idx = schema.column(column).map(|_| schema.column_index(column))?;
        let value = Self::matching(table, schema, filters)
            .next()
            .and_then(|row| idx.and_then(|i| row[i].as_f64()));
        Ok(value)
    }
}

/// 메모리 워터마크 저장소.
///
/// 기록이 없으면 연결된 [`MemoryFeedStore`]의 컬럼 최댓값을 사용합니다.
#[derive(Default)]
pub struct MemoryWatermarkStore {
    marks: Mutex<HashMap<(String, String), NaiveDateTime>>,
    fallback: Option<Arc<MemoryFeedStore>>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(feeds: Arc<MemoryFeedStore>) -> Self {
        Self {
            marks: Mutex::default(),
            fallback: Some(feeds),
        }
    }

    /// 저장된 워터마크 직접 조회 (대체 조회 없음).
    pub fn get(&self, table: &str, entity: &str) -> Option<NaiveDateTime> {
        lock(&self.marks)
            .get(&(table.to_string(), entity.to_string()))
            .copied()
    }

    /// 워터마크 설정 (테스트 준비용, 단조성 검사 없음).
    pub fn set(&self, table: &str, entity: &str, watermark: NaiveDateTime) {
        lock(&self.marks).insert((table.to_string(), entity.to_string()), watermark);
    }
}

#[async_trait]
impl WatermarkStore for MemoryWatermarkStore {
    async fn read(&self, schema: &TableSchema, target: &SyncTarget) -> Result<Option<NaiveDateTime>> {
        if let Some(stored) = self.get(target.table, target.entity_key()) {
            return Ok(Some(stored));
        }
        match &self.fallback {
            Some(feeds) => {
                let filters: Vec<Filter> = entity_value(target)
                    .map(|(column, value)| vec![Filter::Eq(column, value)])
                    .unwrap_or_default();
                feeds
                    .max_value(schema, target.watermark_column, &filters)
                    .await
            }
            None => Ok(None),
        }
    }

    async fn write(&self, target: &SyncTarget, watermark: NaiveDateTime) -> Result<()> {
        let mut marks = lock(&self.marks);
        let slot = marks
            .entry((target.table.to_string(), target.entity_key().to_string()))
            .or_insert(watermark);
        if watermark > *slot {
            *slot = watermark;
        }
        Ok(())
    }

    async fn reset(&self, table: &str) -> Result<u64> {
        let mut marks = lock(&self.marks);
        let before = marks.len();
        marks.retain(|(t, _), _| t != table);
        Ok((before - marks.len()) as u64)
    }
}

/// 메모리 동기화 로그.
#[derive(Default)]
pub struct MemorySyncLog {
    entries: Mutex<BTreeMap<(String, String), SyncLogEntry>>,
}

impl MemorySyncLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, module: &str, table: &str) -> Option<SyncLogEntry> {
        lock(&self.entries)
            .get(&(module.to_string(), table.to_string()))
            .cloned()
    }
}

#[async_trait]
impl SyncLog for MemorySyncLog {
    async fn record_success(&self, module: &str, table: &str, last_date: NaiveDate) -> Result<()> {
        lock(&self.entries).insert(
            (module.to_string(), table.to_string()),
            SyncLogEntry {
                module: module.to_string(),
                table_name: table.to_string(),
                last_date: Some(last_date),
                state: SyncState::Success,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn record_failure(&self, module: &str, table: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        let entry = entries
            .entry((module.to_string(), table.to_string()))
            .or_insert_with(|| SyncLogEntry {
                module: module.to_string(),
                table_name: table.to_string(),
                last_date: None,
                state: SyncState::Failed,
                updated_at: Utc::now(),
            });
        entry.state = SyncState::Failed;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn snapshot(&self) -> Result<Vec<SyncLogEntry>> {
        Ok(lock(&self.entries).values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datasync_core::{ColumnDef, ColumnKind, Value};

    static DAILY: TableSchema = TableSchema {
        table: "daily",
        columns: &[
            ColumnDef::entity("code"),
            ColumnDef::field("trade_date", ColumnKind::Date, &["日期"]),
            ColumnDef::field("close", ColumnKind::Float(Some(2)), &["收盘"]),
        ],
        natural_key: &["code", "trade_date"],
        watermark_column: "trade_date",
        entity_column: Some("code"),
    };

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn row(code: &str, day: u32, close: f64) -> Row {
        vec![Value::Text(code.into()), Value::Date(d(day)), Value::Float(close)]
    }

    fn range(from: u32, to: u32) -> Filter {
        Filter::Range {
            column: "trade_date",
            from: d(from).and_hms_opt(0, 0, 0).unwrap(),
            to: d(to).and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_replace_range_keeps_rows_outside() {
        let store = MemoryFeedStore::new();
        store.ensure_table(&DAILY, false).await.unwrap();
        store
            .write(
                &Batch::with_rows(&DAILY, vec![row("A", 2, 1.0), row("A", 3, 2.0), row("A", 4, 3.0)]),
                WriteOp::Merge,
            )
            .await
            .unwrap();

        let filters = [range(3, 4)];
        store
            .write(
                &Batch::with_rows(&DAILY, vec![row("A", 3, 9.0)]),
                WriteOp::Replace(&filters),
            )
            .await
            .unwrap();

        assert_eq!(store.rows("daily"), vec![row("A", 2, 1.0), row("A", 3, 9.0)]);
    }

    #[tokio::test]
    async fn test_merge_upserts_by_natural_key() {
        let store = MemoryFeedStore::new();
        store.ensure_table(&DAILY, false).await.unwrap();
        store
            .write(&Batch::with_rows(&DAILY, vec![row("A", 2, 1.0)]), WriteOp::Merge)
            .await
            .unwrap();
        store
            .write(
                &Batch::with_rows(&DAILY, vec![row("A", 2, 5.0), row("B", 2, 1.0)]),
                WriteOp::Merge,
            )
            .await
            .unwrap();
        assert_eq!(store.rows("daily").len(), 2);
        assert_eq!(
            store
                .lookup_float(&DAILY, "close", &[Filter::Eq("code", "A".into())])
                .await
                .unwrap(),
            Some(5.0)
        );
    }

    #[tokio::test]
    async fn test_write_fails_without_table_or_when_blocked() {
        let store = MemoryFeedStore::new();
        let batch = Batch::with_rows(&DAILY, vec![row("A", 2, 1.0)]);
        assert!(store.write(&batch, WriteOp::Merge).await.is_err());

        store.ensure_table(&DAILY, false).await.unwrap();
        store.fail_writes("daily");
        assert!(store.write(&batch, WriteOp::Merge).await.is_err());
        assert!(store.rows("daily").is_empty());
    }

    #[tokio::test]
    async fn test_replace_without_filters_is_rejected() {
        let store = MemoryFeedStore::new();
        store.ensure_table(&DAILY, false).await.unwrap();
        store.seed(&DAILY, vec![row("A", 2, 1.0), row("B", 2, 1.0)]);

        let batch = Batch::with_rows(&DAILY, vec![row("A", 3, 2.0)]);
        let err = store.write(&batch, WriteOp::Replace(&[])).await.unwrap_err();
        assert!(matches!(err, DataError::InsertError(_)));
        assert_eq!(store.rows("daily").len(), 2);

        store.write(&batch, WriteOp::ReplaceAll).await.unwrap();
        assert_eq!(store.rows("daily"), vec![row("A", 3, 2.0)]);
    }

    #[tokio::test]
    async fn test_watermark_never_moves_backward() {
        let marks = MemoryWatermarkStore::new();
        let target = SyncTarget::entity(&DAILY, "A");
        let t = |day| d(day).and_hms_opt(0, 0, 0).unwrap();

        marks.write(&target, t(5)).await.unwrap();
        marks.write(&target, t(3)).await.unwrap();
        assert_eq!(marks.read(&DAILY, &target).await.unwrap(), Some(t(5)));

        marks.write(&target, t(9)).await.unwrap();
        assert_eq!(marks.read(&DAILY, &target).await.unwrap(), Some(t(9)));
        assert_eq!(marks.reset("daily").await.unwrap(), 1);
        assert_eq!(marks.read(&DAILY, &target).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_watermark_falls_back_to_table_max_per_entity() {
        let feeds = Arc::new(MemoryFeedStore::new());
        feeds.seed(&DAILY, vec![row("A", 4, 1.0), row("A", 8, 1.0), row("B", 2, 1.0)]);
        let marks = MemoryWatermarkStore::with_fallback(feeds);

        let a = marks.read(&DAILY, &SyncTarget::entity(&DAILY, "A")).await.unwrap();
        assert_eq!(a.map(|t| t.date()), Some(d(8)));
        let b = marks.read(&DAILY, &SyncTarget::entity(&DAILY, "B")).await.unwrap();
        assert_eq!(b.map(|t| t.date()), Some(d(2)));
        let c = marks.read(&DAILY, &SyncTarget::entity(&DAILY, "C")).await.unwrap();
        assert_eq!(c, None);
    }

    #[tokio::test]
    async fn test_sync_log_failure_keeps_last_date() {
        let log = MemorySyncLog::new();
        log.record_success("stock", "daily", d(5)).await.unwrap();
        log.record_failure("stock", "daily").await.unwrap();

        let entry = log.entry("stock", "daily").unwrap();
        assert_eq!(entry.state, SyncState::Failed);
        assert_eq!(entry.last_date, Some(d(5)));

        log.record_failure("stock", "other").await.unwrap();
        assert_eq!(log.entry("stock", "other").unwrap().last_date, None);
        assert_eq!(log.snapshot().await.unwrap().len(), 2);
    }
}
