//! 선언적 피드 정의와 범용 동기화 엔진.
//!
//! 피드마다 수집 요청, 표준 스키마, 구간 분할 방식, 저장 방식을
//! [`FeedDef`]로 선언하고, [`executor`]가 이를 해석해 실행합니다.
//!
//! - [`transform`]: API 레코드 → 정규화 배치
//! - [`executor`]: 피드 단위 상태 머신 (워터마크 → 계획 → 수집/저장)
//! - [`pool`]: 크기 제한 워커 풀

pub mod executor;
pub mod pool;
pub mod transform;

use std::borrow::Cow;
use std::fmt;

use chrono::{Datelike, NaiveDateTime};

use datasync_core::{Cadence, EndRule, Entity, EntitySet, Epoch, TableSchema, WorkUnit};
use datasync_provider::{ApiRequest, RetryConfig, Transport};

pub use executor::{sync_feed, FeedOutcome, SyncContext, SyncOptions};
pub use pool::run_bounded;

/// 요청 파라미터 값.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    /// 고정 값
    Const(&'static str),
    /// 구간 시작 (`YYYYMMDD`)
    Start,
    /// 구간 종료 (`YYYYMMDD`)
    End,
    /// 구간 시작 (`YYYY-MM-DD HH:MM:SS`)
    StartTime,
    /// 구간 종료 (`YYYY-MM-DD HH:MM:SS`)
    EndTime,
    /// 구간 시작 연도
    Year,
    /// 엔티티 코드
    Entity,
    /// 엔티티 이름
    EntityName,
}

impl Param {
    fn render(&self, unit: &WorkUnit, entity: Option<&Entity>) -> String {
        let compact = |dt: NaiveDateTime| dt.format("%Y%m%d").to_string();
        let full = |dt: NaiveDateTime| dt.format("%Y-%m-%d %H:%M:%S").to_string();
        match self {
            Param::Const(v) => v.to_string(),
            Param::Start => compact(unit.start),
            Param::End => compact(unit.end),
            Param::StartTime => full(unit.start),
            Param::EndTime => full(unit.end),
            Param::Year => unit.start.year().to_string(),
            Param::Entity => entity.map(|e| e.code.clone()).unwrap_or_default(),
            Param::EntityName => entity.map(|e| e.name.clone()).unwrap_or_default(),
        }
    }
}

/// 한 번의 API 호출 정의.
#[derive(Debug, Clone, Copy)]
pub struct RequestDef {
    /// API 함수 이름
    pub function: &'static str,
    pub params: &'static [(&'static str, Param)],
    /// 결과 행에 붙일 고정 컬럼 값
    pub tags: &'static [(&'static str, &'static str)],
    /// 이 날짜(`YYYYMMDD`) 이전 구간에서는 호출하지 않음
    pub since: Option<u32>,
    /// 적용할 엔티티 코드 (비어 있으면 전체)
    pub entities: &'static [&'static str],
    /// 전송 경로 강제 (프록시 차단 사이트 등)
    pub transport: Option<Transport>,
    /// 피드 재시도 설정 대신 사용할 프리셋
    pub retry: Option<RetryPreset>,
}

impl RequestDef {
    pub const fn new(function: &'static str, params: &'static [(&'static str, Param)]) -> Self {
        Self {
            function,
            params,
            tags: &[],
            since: None,
            entities: &[],
            transport: None,
            retry: None,
        }
    }

    pub const fn tagged(self, tags: &'static [(&'static str, &'static str)]) -> Self {
        Self { tags, ..self }
    }

    pub const fn since(self, date: u32) -> Self {
        Self {
            since: Some(date),
            ..self
        }
    }

    pub const fn for_entities(self, codes: &'static [&'static str]) -> Self {
        Self {
            entities: codes,
            ..self
        }
    }

    pub const fn direct(self) -> Self {
        Self {
            transport: Some(Transport::Direct),
            ..self
        }
    }

    pub const fn with_retry(self, preset: RetryPreset) -> Self {
        Self {
            retry: Some(preset),
            ..self
        }
    }

    /// 구간/엔티티에 이 요청이 적용되는지 여부.
    pub fn applies_to(&self, unit: &WorkUnit, entity: Option<&Entity>) -> bool {
        if let Some(since) = self.since {
            let start = datasync_core::value::yyyymmdd(unit.start.date());
            if start < since {
                return false;
            }
        }
        if self.entities.is_empty() {
            return true;
        }
        entity.is_some_and(|e| self.entities.contains(&e.code.as_str()))
    }

    pub fn build(&self, unit: &WorkUnit, entity: Option<&Entity>) -> ApiRequest {
        self.params
            .iter()
            .fold(ApiRequest::new(self.function), |req, (key, param)| {
                req.param(*key, param.render(unit, entity))
            })
    }

    pub fn transport_or(&self, default: Transport) -> Transport {
        self.transport.unwrap_or(default)
    }

    /// 요청에 프리셋이 있으면 그 설정, 없으면 피드 재시도 설정.
    pub fn retry_or<'a>(&self, feed: &'a RetryConfig, standard: &RetryConfig) -> Cow<'a, RetryConfig> {
        match self.retry {
            Some(preset) => Cow::Owned(preset.config(standard)),
            None => Cow::Borrowed(feed),
        }
    }
}

/// 수집 범위.
#[derive(Debug, Clone, Copy)]
pub enum Scope {
    /// 피드 전체가 하나의 워터마크
    Global,
    /// 엔티티별 워터마크, 워커 풀로 병렬 실행
    PerEntity {
        set: EntitySet,
        /// 제외할 엔티티 코드
        skip: &'static [&'static str],
    },
}

/// 배치 저장 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// 워터마크 컬럼 기준 구간(및 엔티티) 삭제 후 추가
    ReplaceRange,
    /// 엔티티 전체 삭제 후 추가
    ReplaceEntity,
    /// 테이블 전체 삭제 후 추가
    ReplaceAll,
    /// 자연키 기준 병합
    Merge,
}

/// 재시도 프리셋.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPreset {
    Standard,
    Fundamentals,
}

impl RetryPreset {
    /// `standard`는 설정 파일/환경변수에서 온 기본 재시도 설정.
    pub fn config(self, standard: &RetryConfig) -> RetryConfig {
        match self {
            RetryPreset::Standard => standard.clone(),
            RetryPreset::Fundamentals => RetryConfig::fundamentals(),
        }
    }
}

/// 실행 단계.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// 참조 데이터 피드 (순차 실행, 이후 참조 데이터 로드)
    Reference,
    /// 피드 풀에서 병렬 실행
    Pool,
}

/// 제외 목록 (예: 상장폐지 종목).
#[derive(Debug, Clone, Copy)]
pub struct Exclusion {
    pub request: RequestDef,
    /// 제외 코드가 들어 있는 응답 필드
    pub field: &'static [&'static str],
    /// 배치에서 비교할 컬럼
    pub column: &'static str,
}

/// 피드 정의.
#[derive(Debug, Clone, Copy)]
pub struct FeedDef {
    /// 동기화 로그 모듈 이름
    pub module: &'static str,
    pub description: &'static str,
    pub schema: &'static TableSchema,
    pub phase: Phase,
    pub scope: Scope,
    /// 구간마다 호출해 이어 붙일 요청 목록
    pub requests: &'static [RequestDef],
    pub cadence: Cadence,
    pub end: EndRule,
    /// 워터마크가 없을 때 시작점
    pub epoch: Epoch,
    pub write: WriteMode,
    /// 수정주가 변경 감지에 사용할 종가 컬럼
    pub revision_column: Option<&'static str>,
    pub exclusion: Option<Exclusion>,
    pub retry: RetryPreset,
    /// 구간 사이 대기 (밀리초)
    pub unit_delay_ms: u64,
    /// 엔티티별 피드의 기본 워커 수
    pub workers: Option<usize>,
    /// 전체 실행 시 프록시 경유 (프록시가 설정된 경우)
    pub proxied: bool,
}

impl FeedDef {
    pub const fn new(
        module: &'static str,
        schema: &'static TableSchema,
        requests: &'static [RequestDef],
    ) -> Self {
        Self {
            module,
            description: "",
            schema,
            phase: Phase::Pool,
            scope: Scope::Global,
            requests,
            cadence: Cadence::Snapshot,
            end: EndRule::Today,
            epoch: Epoch::Date(19900101),
            write: WriteMode::ReplaceRange,
            revision_column: None,
            exclusion: None,
            retry: RetryPreset::Standard,
            unit_delay_ms: 0,
            workers: None,
            proxied: false,
        }
    }

    pub const fn describe(self, description: &'static str) -> Self {
        Self { description, ..self }
    }

    pub const fn reference(self) -> Self {
        Self {
            phase: Phase::Reference,
            ..self
        }
    }

    pub const fn per_entity(self, set: EntitySet, skip: &'static [&'static str]) -> Self {
        Self {
            scope: Scope::PerEntity { set, skip },
            ..self
        }
    }

    pub const fn with_cadence(self, cadence: Cadence) -> Self {
        Self { cadence, ..self }
    }

    pub const fn with_end(self, end: EndRule) -> Self {
        Self { end, ..self }
    }

    pub const fn with_epoch(self, epoch: Epoch) -> Self {
        Self { epoch, ..self }
    }

    pub const fn with_write(self, write: WriteMode) -> Self {
        Self { write, ..self }
    }

    pub const fn with_revision(self, column: &'static str) -> Self {
        Self {
            revision_column: Some(column),
            ..self
        }
    }

    pub const fn with_exclusion(self, exclusion: Exclusion) -> Self {
        Self {
            exclusion: Some(exclusion),
            ..self
        }
    }

    pub const fn with_retry(self, retry: RetryPreset) -> Self {
        Self { retry, ..self }
    }

    pub const fn with_unit_delay(self, millis: u64) -> Self {
        Self {
            unit_delay_ms: millis,
            ..self
        }
    }

    pub const fn with_workers(self, workers: usize) -> Self {
        Self {
            workers: Some(workers),
            ..self
        }
    }

    pub const fn proxied(self) -> Self {
        Self {
            proxied: true,
            ..self
        }
    }

    pub fn table(&self) -> &'static str {
        self.schema.table
    }

    pub fn retry_config(&self, standard: &RetryConfig) -> RetryConfig {
        self.retry.config(standard)
    }

    pub fn is_per_entity(&self) -> bool {
        matches!(self.scope, Scope::PerEntity { .. })
    }
}

impl fmt::Display for FeedDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.schema.table)
    }
}
