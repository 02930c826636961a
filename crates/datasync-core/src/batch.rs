//! 정규화된 행 배치.

use std::collections::HashSet;

use chrono::NaiveDateTime;

use crate::schema::TableSchema;
use crate::value::Value;

/// 스키마 컬럼 순서를 따르는 행.
pub type Row = Vec<Value>;

/// 한 수집 구간(날짜, 분기, 엔티티)의 정규화된 행 묶음.
#[derive(Debug, Clone)]
pub struct Batch {
    pub schema: &'static TableSchema,
    pub rows: Vec<Row>,
}

impl Batch {
    pub fn new(schema: &'static TableSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(schema: &'static TableSchema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn extend(&mut self, other: Batch) {
        self.rows.extend(other.rows);
    }

    /// 자연키 기준 중복 제거 (마지막 행 유지).
    ///
    /// 남은 행의 상대 순서는 유지되며, 반복 적용해도 결과가 같습니다.
    ///
    /// # 반환
    /// 제거된 행 수
    pub fn dedupe(&mut self) -> usize {
        let key_indices: Vec<usize> = self
            .schema
            .natural_key
            .iter()
            .filter_map(|k| self.schema.column_index(k))
            .collect();
        if key_indices.is_empty() {
            return 0;
        }

        let before = self.rows.len();
        let mut seen = HashSet::with_capacity(before);
        let mut kept: Vec<Row> = Vec::with_capacity(before);
        for row in self.rows.drain(..).rev() {
            let key = key_indices
                .iter()
                .map(|&i| row[i].key_fragment())
                .collect::<Vec<_>>()
                .join("\u{1f}");
            if seen.insert(key) {
                kept.push(row);
            }
        }
        kept.reverse();
        self.rows = kept;
        before - self.rows.len()
    }

    /// 자연키에 NULL이 있는 행 제거.
    pub fn drop_incomplete_keys(&mut self) -> usize {
        let key_indices: Vec<usize> = self
            .schema
            .natural_key
            .iter()
            .filter_map(|k| self.schema.column_index(k))
            .collect();
        let before = self.rows.len();
        self.rows
            .retain(|row| key_indices.iter().all(|&i| !row[i].is_null()));
        before - self.rows.len()
    }

    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Row) -> bool,
    {
        let before = self.rows.len();
        self.rows.retain(|row| keep(row));
        before - self.rows.len()
    }

    /// 컬럼 값 목록.
    pub fn column_values<'a>(&'a self, column: &str) -> impl Iterator<Item = &'a Value> + 'a {
        let idx = self.schema.column_index(column);
        self.rows.iter().filter_map(move |row| idx.map(|i| &row[i]))
    }

    /// 날짜/시각 컬럼의 최솟값과 최댓값.
    pub fn datetime_span(&self, column: &str) -> Option<(NaiveDateTime, NaiveDateTime)> {
        self.column_values(column)
            .filter_map(Value::as_datetime)
            .fold(None, |acc, dt| match acc {
                None => Some((dt, dt)),
                Some((lo, hi)) => Some((lo.min(dt), hi.max(dt))),
            })
    }

    /// 워터마크 컬럼의 최댓값.
    pub fn max_watermark(&self) -> Option<NaiveDateTime> {
        self.datetime_span(self.schema.watermark_column)
            .map(|(_, hi)| hi)
    }

    /// `key_column == key` 인 첫 행의 `column` 실수 값.
    pub fn float_where(&self, column: &str, key_column: &str, key: &Value) -> Option<f64> {
        let col = self.schema.column_index(column)?;
        let key_col = self.schema.column_index(key_column)?;
        self.rows
            .iter()
            .find(|row| &row[key_col] == key)
            .and_then(|row| row[col].as_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, ColumnKind};
    use chrono::NaiveDate;
    use proptest::prelude::*;

    static SCHEMA: TableSchema = TableSchema {
        table: "report",
        columns: &[
            ColumnDef::field("code", ColumnKind::Code, &["股票代码"]),
            ColumnDef::field("notice_date", ColumnKind::Date, &["公告日期"]),
            ColumnDef::field("value", ColumnKind::Float(None), &["数值"]),
        ],
        natural_key: &["code", "notice_date"],
        watermark_column: "notice_date",
        entity_column: None,
    };

    fn row(code: &str, day: u32, value: f64) -> Row {
        vec![
            Value::Text(code.to_string()),
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, day).unwrap()),
            Value::Float(value),
        ]
    }

    #[test]
    fn test_dedupe_keeps_last_occurrence() {
        let mut batch = Batch::with_rows(
            &SCHEMA,
            vec![row("000001", 2, 1.0), row("000002", 2, 2.0), row("000001", 2, 3.0)],
        );
        assert_eq!(batch.dedupe(), 1);
        assert_eq!(batch.rows, vec![row("000002", 2, 2.0), row("000001", 2, 3.0)]);
    }

    #[test]
    fn test_drop_incomplete_keys() {
        let mut broken = row("000001", 2, 1.0);
        broken[1] = Value::Null;
        let mut batch = Batch::with_rows(&SCHEMA, vec![broken, row("000002", 3, 1.0)]);
        assert_eq!(batch.drop_incomplete_keys(), 1);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_span_and_float_lookup() {
        let batch = Batch::with_rows(
            &SCHEMA,
            vec![row("000001", 5, 1.5), row("000001", 3, 2.5), row("000001", 9, 3.5)],
        );
        let (lo, hi) = batch.datetime_span("notice_date").unwrap();
        assert_eq!(lo.date(), NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(hi.date(), NaiveDate::from_ymd_opt(2024, 1, 9).unwrap());
        assert_eq!(batch.max_watermark(), Some(hi));

        let key = Value::Date(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(batch.float_where("value", "notice_date", &key), Some(2.5));
    }

    proptest! {
        #[test]
        fn prop_dedupe_is_idempotent(entries in prop::collection::vec((0u8..4, 1u32..5, -10i32..10), 0..40)) {
            let rows = entries
                .iter()
                .map(|(c, d, v)| row(&format!("00000{}", c), *d, *v as f64))
                .collect();
            let mut once = Batch::with_rows(&SCHEMA, rows);
            once.dedupe();
            let mut twice = once.clone();
            prop_assert_eq!(twice.dedupe(), 0);
            prop_assert_eq!(once.rows, twice.rows);
        }
    }
}
