//! 피드 동기화 실행기.
//!
//! 피드 하나의 상태 흐름:
//! 테이블 준비 → 워터마크 조회 → 구간 계획 → (수집 → 변환 → 저장 → 워터마크 갱신)* → 로그 기록
//!
//! 어느 단계에서든 에러가 나면 남은 구간을 버리고 동기화 로그에 FAILED를 기록합니다.
//! 실패한 구간의 워터마크는 갱신하지 않습니다.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use datasync_core::{
    plan, Batch, ColumnKind, Entity, ReferenceData, SyncTarget, Value, WorkUnit,
};
use datasync_data::{FeedStore, Filter, SyncLog, WatermarkStore, WriteOp};
use datasync_provider::{RetryConfig, RetryingFetcher, Transport};

use super::pool::run_bounded;
use super::transform::{to_batch, RowContext};
use super::{FeedDef, Scope, WriteMode};
use crate::error::Result;
use crate::stats::SyncStats;

/// 수정주가 종가 비교 허용 오차
const CLOSE_TOLERANCE: f64 = 1e-6;

/// 실행기가 공유하는 외부 자원.
pub struct SyncContext {
    pub fetcher: RetryingFetcher,
    pub feeds: Arc<dyn FeedStore>,
    pub watermarks: Arc<dyn WatermarkStore>,
    pub sync_log: Arc<dyn SyncLog>,
}

/// 피드 실행 옵션.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// 테이블 삭제 후 재생성 (워터마크 초기화)
    pub drop_existing: bool,
    /// 기본 전송 경로
    pub transport: Transport,
    /// 엔티티별 피드 워커 수 (없으면 피드 기본값)
    pub workers: Option<usize>,
    /// 피드 기본값도 없을 때의 워커 수
    pub default_workers: usize,
    /// 실행 시각 (Asia/Shanghai)
    pub now: NaiveDateTime,
}

/// 피드 실행 결과.
#[derive(Debug)]
pub struct FeedOutcome {
    pub module: &'static str,
    pub table: &'static str,
    pub stats: SyncStats,
    /// 동기화 로그에 기록한 날짜 (성공 시)
    pub last_date: Option<NaiveDate>,
    pub error: Option<String>,
}

impl FeedOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// 피드 하나를 동기화하고 결과를 동기화 로그에 기록.
///
/// 에러를 반환하지 않습니다. 실패는 로그와 `FeedOutcome::error`로만 드러납니다.
pub async fn sync_feed(
    ctx: &Arc<SyncContext>,
    feed: &'static FeedDef,
    reference: Arc<ReferenceData>,
    opts: SyncOptions,
) -> FeedOutcome {
    let started = Instant::now();
    info!(feed = feed.module, table = feed.table(), "피드 동기화 시작");

    let result = run_feed(ctx, feed, reference, &opts).await;
    let mut outcome = FeedOutcome {
        module: feed.module,
        table: feed.table(),
        stats: SyncStats::new(),
        last_date: None,
        error: None,
    };

    match result {
        Ok((mut stats, last_date)) => {
            stats.elapsed = started.elapsed();
            stats.log_summary(feed.module);
            match ctx
                .sync_log
                .record_success(feed.module, feed.table(), last_date)
                .await
            {
                Ok(()) => outcome.last_date = Some(last_date),
                Err(e) => {
                    error!(feed = feed.module, error = %e, "동기화 로그 기록 실패");
                    outcome.error = Some(e.to_string());
                }
            }
            outcome.stats = stats;
        }
        Err(e) => {
            error!(
                feed = feed.module,
                table = feed.table(),
                error = %e,
                elapsed = format!("{:.1}s", started.elapsed().as_secs_f64()),
                "피드 동기화 실패"
            );
            if let Err(log_err) = ctx.sync_log.record_failure(feed.module, feed.table()).await {
                error!(feed = feed.module, error = %log_err, "동기화 로그 기록 실패");
            }
            outcome.error = Some(e.to_string());
        }
    }
    outcome
}

async fn run_feed(
    ctx: &Arc<SyncContext>,
    feed: &'static FeedDef,
    reference: Arc<ReferenceData>,
    opts: &SyncOptions,
) -> Result<(SyncStats, NaiveDate)> {
    feed.schema.validate()?;
    ctx.feeds.ensure_table(feed.schema, opts.drop_existing).await?;
    if opts.drop_existing {
        let removed = ctx.watermarks.reset(feed.table()).await?;
        info!(feed = feed.module, removed, "테이블 재생성, 워터마크 초기화");
    }

    let end = feed.end.resolve(opts.now, &reference)?;
    let epoch = feed.epoch.resolve(opts.now)?;
    debug!(feed = feed.module, %end, %epoch, "종료 시점 계산");

    let mut job = FeedJob {
        ctx: ctx.clone(),
        feed,
        reference: reference.clone(),
        end,
        epoch,
        now: opts.now,
        transport: opts.transport,
        retry: feed.retry_config(ctx.fetcher.config()),
        excluded: HashSet::new(),
    };
    job.excluded = job.load_exclusions().await?;

    match feed.scope {
        Scope::Global => {
            let (stats, watermark) = job.sync_target(None).await?;
            Ok((stats, watermark.date()))
        }
        Scope::PerEntity { set, skip } => {
            let entities: Vec<Entity> = reference
                .entities(set)
                .into_iter()
                .filter(|e| !skip.contains(&e.code.as_str()))
                .collect();
            if entities.is_empty() {
                warn!(feed = feed.module, "동기화할 엔티티가 없습니다");
            }
            let workers = opts
                .workers
                .or(feed.workers)
                .unwrap_or(opts.default_workers);
            info!(
                feed = feed.module,
                entities = entities.len(),
                workers,
                "엔티티별 동기화 시작"
            );

            let job = Arc::new(job);
            let results = run_bounded(entities, workers, CancellationToken::new(), |entity| {
                let job = job.clone();
                async move { job.sync_target(Some(entity)).await }
            })
            .await?;

            let mut stats = SyncStats::new();
            for (entity_stats, _) in &results {
                stats.merge(entity_stats);
            }
            Ok((stats, end.date()))
        }
    }
}

/// 한 번의 피드 실행에 필요한 해석된 값.
struct FeedJob {
    ctx: Arc<SyncContext>,
    feed: &'static FeedDef,
    reference: Arc<ReferenceData>,
    end: NaiveDateTime,
    epoch: NaiveDateTime,
    now: NaiveDateTime,
    transport: Transport,
    retry: RetryConfig,
    excluded: HashSet<String>,
}

impl FeedJob {
    /// 대상 하나 동기화.
    ///
    /// # Returns
    /// (통계, 실행 후 워터마크)
    async fn sync_target(&self, entity: Option<Entity>) -> Result<(SyncStats, NaiveDateTime)> {
        let schema = self.feed.schema;
        let target = match &entity {
            Some(e) => SyncTarget::entity(schema, e.code.clone()),
            None => SyncTarget::table(schema),
        };

        let stored = self.ctx.watermarks.read(schema, &target).await?;
        let watermark = stored.unwrap_or(self.epoch);
        let units = plan(
            self.feed.cadence,
            watermark,
            self.end,
            self.now,
            &self.reference.trade_dates,
        );

        let mut stats = SyncStats {
            total: 1,
            ..Default::default()
        };
        if units.is_empty() {
            debug!(target = %target, %watermark, "이미 최신 상태");
            stats.skipped = 1;
            return Ok((stats, watermark));
        }
        debug!(target = %target, %watermark, units = units.len(), "수집 구간 계획");

        let mut current = watermark;
        for (i, unit) in units.iter().enumerate() {
            if i > 0 && self.feed.unit_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.feed.unit_delay_ms)).await;
            }
            stats.units += 1;

            let batch = match self.fetch_unit(unit, entity.as_ref()).await {
                Ok(batch) => batch,
                Err(e) if e.is_no_data() => {
                    warn!(target = %target, start = %unit.start, end = %unit.end, "데이터 없음, 구간 건너뜀");
                    Batch::new(schema)
                }
                Err(e) => return Err(e),
            };

            if batch.is_empty() {
                stats.empty += 1;
                if let Some(mark) = unit.on_empty {
                    self.ctx.watermarks.write(&target, mark).await?;
                    current = current.max(mark);
                }
                continue;
            }

            if i == 0 && stored.is_some() {
                if let Some(column) = self.feed.revision_column {
                    if self.is_revised(&target, column, watermark, &batch).await? {
                        let (rows, mark) = self.resync_history(&target, entity.as_ref()).await?;
                        if let Some(mark) = mark {
                            stats.revised += 1;
                            stats.rows += rows;
                            current = current.max(mark);
                            break;
                        }
                        // 재수집 실패 시 이번 구간만 평소대로 저장
                    }
                }
            }

            let filters = self.replace_filters(unit, &target);
            let op = match self.feed.write {
                WriteMode::Merge => WriteOp::Merge,
                WriteMode::ReplaceAll => WriteOp::ReplaceAll,
                WriteMode::ReplaceRange | WriteMode::ReplaceEntity => WriteOp::Replace(&filters),
            };
            let rows = self.ctx.feeds.write(&batch, op).await?;
            stats.rows += rows;

            if let Some(mark) = batch.max_watermark() {
                self.ctx.watermarks.write(&target, mark).await?;
                current = current.max(mark);
            }
            debug!(target = %target, start = %unit.start, end = %unit.end, rows, "구간 저장");
        }

        if stats.rows > 0 {
            stats.synced = 1;
        } else {
            stats.skipped = 1;
        }
        Ok((stats, current))
    }

    /// 구간 하나의 모든 요청을 호출해 배치로 합칩니다.
    ///
    /// 모든 요청이 "데이터 없음"이면 그 에러를 반환합니다.
    async fn fetch_unit(&self, unit: &WorkUnit, entity: Option<&Entity>) -> Result<Batch> {
        let schema = self.feed.schema;
        let mut batch = Batch::new(schema);
        let mut fetched = false;
        let mut no_data = None;

        for def in self.feed.requests.iter().filter(|r| r.applies_to(unit, entity)) {
            let request = def.build(unit, entity);
            let transport = def.transport_or(self.transport);
            let retry = def.retry_or(&self.retry, self.ctx.fetcher.config());
            match self.ctx.fetcher.fetch_with(&retry, &request, transport).await {
                Ok(records) => {
                    let row_ctx = RowContext {
                        entity,
                        unit,
                        run_date: self.now.date(),
                        tags: def.tags,
                    };
                    batch.extend(to_batch(schema, &records, &row_ctx));
                    fetched = true;
                }
                Err(e) if e.is_no_data() => {
                    debug!(request = %request, "데이터 없음");
                    no_data = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if !fetched {
            if let Some(e) = no_data {
                return Err(e.into());
            }
        }

        batch.dedupe();
        if let Some(exclusion) = &self.feed.exclusion {
            if let Some(idx) = schema.column_index(exclusion.column) {
                let removed = batch.retain(|row| {
                    row[idx]
                        .as_str()
                        .map_or(true, |code| !self.excluded.contains(code))
                });
                if removed > 0 {
                    debug!(feed = self.feed.module, removed, "제외 목록 적용");
                }
            }
        }
        Ok(batch)
    }

    /// 제외 코드 목록 조회 (상장폐지 종목 등).
    async fn load_exclusions(&self) -> Result<HashSet<String>> {
        let Some(exclusion) = &self.feed.exclusion else {
            return Ok(HashSet::new());
        };
        let unit = WorkUnit::new(self.end, self.end);
        let request = exclusion.request.build(&unit, None);
        let transport = exclusion.request.transport_or(self.transport);
        let retry = exclusion.request.retry_or(&self.retry, self.ctx.fetcher.config());
        let records = match self.ctx.fetcher.fetch_with(&retry, &request, transport).await {
            Ok(records) => records,
            Err(e) if e.is_no_data() => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let codes: HashSet<String> = records
            .iter()
            .filter_map(|r| exclusion.field.iter().find_map(|f| r.get(*f)))
            .filter_map(|raw| match Value::coerce(raw, ColumnKind::Code) {
                Value::Text(code) => Some(code),
                _ => None,
            })
            .collect();
        info!(feed = self.feed.module, excluded = codes.len(), "제외 목록 로드");
        Ok(codes)
    }

    fn entity_filter(target: &SyncTarget) -> Option<Filter> {
        match (target.entity_column, &target.entity) {
            (Some(column), Some(code)) => Some(Filter::Eq(column, Value::Text(code.clone()))),
            _ => None,
        }
    }

    /// 저장 전에 삭제할 행 조건.
    fn replace_filters(&self, unit: &WorkUnit, target: &SyncTarget) -> Vec<Filter> {
        let mut filters = Vec::new();
        if self.feed.write == WriteMode::ReplaceRange {
            filters.push(Filter::Range {
                column: self.feed.schema.watermark_column,
                from: unit.start,
                to: unit.end,
            });
        }
        if self.feed.write != WriteMode::ReplaceAll {
            filters.extend(Self::entity_filter(target));
        }
        filters
    }

    /// 저장된 경계 봉 종가와 새로 받은 종가가 다른지 확인.
    async fn is_revised(
        &self,
        target: &SyncTarget,
        column: &str,
        watermark: NaiveDateTime,
        batch: &Batch,
    ) -> Result<bool> {
        let schema = self.feed.schema;
        let key = Value::from_datetime(watermark, schema.watermark_kind());
        let mut filters = vec![Filter::Eq(schema.watermark_column, key.clone())];
        filters.extend(Self::entity_filter(target));

        let stored = self.ctx.feeds.lookup_float(schema, column, &filters).await?;
        let fresh = batch.float_where(column, schema.watermark_column, &key);
        match (stored, fresh) {
            (Some(stored), Some(fresh)) if (stored - fresh).abs() > CLOSE_TOLERANCE => {
                info!(
                    target = %target,
                    bar = %key,
                    stored,
                    fresh,
                    "수정주가 변경 감지, 전체 이력 재수집"
                );
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// epoch부터 전체 이력을 받아 엔티티 행을 교체.
    ///
    /// 재수집이 끝난 뒤에만 저장된 행을 건드립니다.
    async fn resync_history(
        &self,
        target: &SyncTarget,
        entity: Option<&Entity>,
    ) -> Result<(u64, Option<NaiveDateTime>)> {
        let full = WorkUnit::new(self.epoch, self.end);
        let batch = match self.fetch_unit(&full, entity).await {
            Ok(batch) => batch,
            Err(e) if e.is_no_data() => Batch::new(self.feed.schema),
            Err(e) => return Err(e),
        };
        if batch.is_empty() {
            warn!(target = %target, "전체 이력 재수집 결과가 비어 있어 기존 이력을 유지합니다");
            return Ok((0, None));
        }

        let mut filters = vec![Filter::Range {
            column: self.feed.schema.watermark_column,
            from: full.start,
            to: full.end,
        }];
        filters.extend(Self::entity_filter(target));
        let rows = self.ctx.feeds.write(&batch, WriteOp::Replace(&filters)).await?;
        let mark = batch.max_watermark();
        if let Some(mark) = mark {
            self.ctx.watermarks.write(target, mark).await?;
        }
        info!(target = %target, rows, "전체 이력 교체 완료");
        Ok((rows, mark))
    }
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("fetcher", &self.fetcher)
            .finish()
    }
}
