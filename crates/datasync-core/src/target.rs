//! 워터마크 대상 식별자.

use std::fmt;

use crate::schema::TableSchema;

/// 하나의 피드(테이블) 또는 피드 안의 엔티티를 식별합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncTarget {
    /// 테이블 이름
    pub table: &'static str,
    /// 엔티티 키 (종목/펀드/보드 코드), 전체 피드는 `None`
    pub entity: Option<String>,
    /// 워터마크 컬럼
    pub watermark_column: &'static str,
    /// 워터마크 조회 범위를 좁히는 엔티티 컬럼
    pub entity_column: Option<&'static str>,
}

impl SyncTarget {
    /// 피드 전체 대상.
    pub fn table(schema: &TableSchema) -> Self {
        Self {
            table: schema.table,
            entity: None,
            watermark_column: schema.watermark_column,
            entity_column: None,
        }
    }

    /// 엔티티 단위 대상.
    pub fn entity(schema: &TableSchema, entity: impl Into<String>) -> Self {
        Self {
            table: schema.table,
            entity: Some(entity.into()),
            watermark_column: schema.watermark_column,
            entity_column: schema.entity_column,
        }
    }

    /// 저장소 키로 쓰는 엔티티 문자열 (전체 피드는 빈 문자열).
    pub fn entity_key(&self) -> &str {
        self.entity.as_deref().unwrap_or("")
    }
}

impl fmt::Display for SyncTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entity {
            Some(entity) => write!(f, "{}[{}]", self.table, entity),
            None => write!(f, "{}", self.table),
        }
    }
}
