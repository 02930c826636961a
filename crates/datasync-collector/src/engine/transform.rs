//! API 레코드를 표준 스키마 배치로 변환.

use chrono::NaiveDate;
use serde_json::Value as Json;
use tracing::debug;

use datasync_core::calendar::parse_quarter_label;
use datasync_core::{Batch, ColumnDef, Entity, Source, TableSchema, Value, WorkUnit};
use datasync_provider::Record;

/// 행 변환에 필요한 수집 문맥.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub entity: Option<&'a Entity>,
    pub unit: &'a WorkUnit,
    pub run_date: NaiveDate,
    pub tags: &'a [(&'static str, &'static str)],
}

fn first_field<'r>(record: &'r Record, aliases: &[&str]) -> Option<&'r Json> {
    aliases.iter().find_map(|alias| record.get(*alias))
}

fn cell(column: &ColumnDef, record: &Record, ctx: &RowContext<'_>) -> Value {
    match column.source {
        Source::Field(aliases) => first_field(record, aliases)
            .map(|raw| Value::coerce(raw, column.kind))
            .unwrap_or(Value::Null),
        Source::Tag => ctx
            .tags
            .iter()
            .find(|(name, _)| *name == column.name)
            .map(|(_, v)| Value::coerce(&Json::String(v.to_string()), column.kind))
            .unwrap_or(Value::Null),
        Source::Entity => ctx
            .entity
            .map(|e| Value::coerce(&Json::String(e.code.clone()), column.kind))
            .unwrap_or(Value::Null),
        Source::EntityName => ctx
            .entity
            .map(|e| Value::coerce(&Json::String(e.name.clone()), column.kind))
            .unwrap_or(Value::Null),
        Source::RangeEnd => Value::from_datetime(ctx.unit.end, column.kind),
        Source::RunDate => Value::from_datetime(ctx.run_date.and_time(chrono::NaiveTime::MIN), column.kind),
        Source::QuarterLabel(aliases) => first_field(record, aliases)
            .and_then(Json::as_str)
            .and_then(parse_quarter_label)
            .map(Value::Date)
            .unwrap_or(Value::Null),
    }
}

/// 레코드 목록을 배치로 변환.
///
/// 자연키가 비어 있는 행은 버리고, 같은 자연키는 마지막 행만 남깁니다.
pub fn to_batch(schema: &'static TableSchema, records: &[Record], ctx: &RowContext<'_>) -> Batch {
    let rows = records
        .iter()
        .map(|record| schema.columns.iter().map(|c| cell(c, record, ctx)).collect())
        .collect();
    let mut batch = Batch::with_rows(schema, rows);

    let incomplete = batch.drop_incomplete_keys();
    let duplicates = batch.dedupe();
    if incomplete + duplicates > 0 {
        debug!(
            table = schema.table,
            incomplete,
            duplicates,
            "키 불완전/중복 행 제거"
        );
    }
    batch
}
