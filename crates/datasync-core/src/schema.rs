//! 테이블 및 컬럼 정의.
//!
//! 피드마다 표준 스키마를 선언하고, 각 컬럼이 외부 레코드의 어느
//! 필드(또는 요청 태그, 엔티티, 수집 구간)에서 오는지 기술합니다.

use crate::error::{CoreError, Result};

/// 컬럼 저장 타입.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    /// UTF-8 바이트 길이 제한이 있는 텍스트
    TextMax(usize),
    /// 종목/펀드 코드 (숫자로 오면 6자리 0 채움)
    Code,
    Int,
    /// 실수 (반올림 자릿수)
    Float(Option<u32>),
    Date,
    DateTime,
}

/// 컬럼 값의 출처.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// 외부 레코드 필드 (앞에서부터 처음 존재하는 별칭 사용)
    Field(&'static [&'static str]),
    /// 요청에 붙인 태그 값 (컬럼 이름으로 조회)
    Tag,
    /// 엔티티 코드
    Entity,
    /// 엔티티 이름
    EntityName,
    /// 수집 구간의 종료 시각
    RangeEnd,
    /// 실행 일자
    RunDate,
    /// `2024年1季度股票投资明细` 형태의 분기 라벨을 분기말 날짜로 변환
    QuarterLabel(&'static [&'static str]),
}

/// 컬럼 정의.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub source: Source,
}

impl ColumnDef {
    pub const fn field(name: &'static str, kind: ColumnKind, aliases: &'static [&'static str]) -> Self {
        Self {
            name,
            kind,
            source: Source::Field(aliases),
        }
    }

    pub const fn tag(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Text,
            source: Source::Tag,
        }
    }

    pub const fn entity(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Code,
            source: Source::Entity,
        }
    }

    pub const fn entity_name(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Text,
            source: Source::EntityName,
        }
    }

    pub const fn range_end(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            source: Source::RangeEnd,
        }
    }

    pub const fn run_date(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Date,
            source: Source::RunDate,
        }
    }

    pub const fn quarter_label(name: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            name,
            kind: ColumnKind::Date,
            source: Source::QuarterLabel(aliases),
        }
    }
}

/// 피드 테이블 스키마.
#[derive(Debug)]
pub struct TableSchema {
    /// 테이블 이름
    pub table: &'static str,
    /// 컬럼 목록 (저장 순서)
    pub columns: &'static [ColumnDef],
    /// 자연키 (중복 제거 및 병합 기준)
    pub natural_key: &'static [&'static str],
    /// 워터마크 컬럼
    pub watermark_column: &'static str,
    /// 엔티티 컬럼 (엔티티별 피드)
    pub entity_column: Option<&'static str>,
}

impl TableSchema {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Result<&ColumnDef> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| CoreError::UnknownColumn {
                table: self.table.to_string(),
                column: name.to_string(),
            })
    }

    pub fn watermark_kind(&self) -> ColumnKind {
        self.column(self.watermark_column)
            .map(|c| c.kind)
            .unwrap_or(ColumnKind::Date)
    }

    /// 자연키/워터마크/엔티티 컬럼이 모두 스키마에 있는지 검증.
    pub fn validate(&self) -> Result<()> {
        for key in self.natural_key {
            self.column(key)?;
        }
        self.column(self.watermark_column)?;
        if let Some(entity) = self.entity_column {
            self.column(entity)?;
        }
        Ok(())
    }
}
