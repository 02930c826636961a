//! 전체 동기화 실행.
//!
//! 1. 참조 단계 피드를 순서대로 실행 (거래일, 종목/보드/펀드 목록)
//! 2. 참조 데이터 스냅샷 로드
//! 3. 나머지 피드를 크기 제한 풀에서 병렬 실행
//! 4. 동기화 로그를 읽어 피드별 상태를 기록하고 요약 항목 저장
//!
//! 한 피드의 실패는 다른 피드 실행을 막지 않습니다.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use datasync_core::ReferenceData;
use datasync_data::{ReferenceSource, SyncLogEntry, SyncState};
use datasync_provider::Transport;

use crate::engine::{run_bounded, sync_feed, FeedDef, FeedOutcome, Phase, SyncContext, SyncOptions};
use crate::error::{CollectorError, Result};
use crate::feeds;

/// 요약 항목의 모듈/테이블 이름
pub const SUMMARY_MODULE: &str = "datasync";
pub const SUMMARY_TABLE: &str = "summary";

/// 현재 시각 (Asia/Shanghai, 거래소 현지 시각).
pub fn shanghai_now() -> NaiveDateTime {
    Utc::now()
        .with_timezone(&chrono_tz::Asia::Shanghai)
        .naive_local()
}

/// 전체 실행 옵션.
#[derive(Debug, Clone, Copy)]
pub struct RunAllOptions {
    /// 피드 풀 크기
    pub processes: usize,
    /// 프록시 사용 피드를 프록시로 보낼지 여부
    pub use_proxy: bool,
    /// 엔티티별 피드의 기본 워커 수
    pub default_workers: usize,
    pub now: NaiveDateTime,
}

impl RunAllOptions {
    fn feed_options(&self, feed: &FeedDef) -> SyncOptions {
        let transport = if self.use_proxy && feed.proxied {
            Transport::Proxy
        } else {
            Transport::Direct
        };
        SyncOptions {
            drop_existing: false,
            transport,
            workers: None,
            default_workers: self.default_workers,
            now: self.now,
        }
    }
}

/// 전체 실행 결과.
#[derive(Debug)]
pub struct RunReport {
    /// 피드별 결과 (참조 단계 순서, 이후 풀 완료 순서)
    pub outcomes: Vec<FeedOutcome>,
    /// 실행 후 동기화 로그 스냅샷
    pub entries: Vec<SyncLogEntry>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn failed(&self) -> Vec<&FeedOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(FeedOutcome::is_success)
    }

    pub fn rows(&self) -> u64 {
        self.outcomes.iter().map(|o| o.stats.rows).sum()
    }
}

/// 피드 카탈로그 실행기.
pub struct Orchestrator {
    ctx: Arc<SyncContext>,
    reference: Arc<dyn ReferenceSource>,
    catalog: &'static [&'static FeedDef],
}

impl Orchestrator {
    pub fn new(ctx: Arc<SyncContext>, reference: Arc<dyn ReferenceSource>) -> Self {
        Self {
            ctx,
            reference,
            catalog: feeds::CATALOG,
        }
    }

    /// 기본 카탈로그 대신 다른 피드 목록 사용.
    pub fn with_catalog(mut self, catalog: &'static [&'static FeedDef]) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn context(&self) -> &Arc<SyncContext> {
        &self.ctx
    }

    /// 전체 피드 동기화.
    ///
    /// 참조 데이터 로드 실패만 에러로 반환하고, 피드 실패는
    /// [`RunReport`]와 동기화 로그로 보고합니다.
    pub async fn run_all(&self, opts: RunAllOptions) -> Result<RunReport> {
        let started = Instant::now();
        info!(
            feeds = self.catalog.len(),
            processes = opts.processes,
            use_proxy = opts.use_proxy,
            now = %opts.now,
            "=== 전체 동기화 시작 ==="
        );

        // 참조 단계: 거래일 캘린더가 아직 없으므로 빈 스냅샷으로 실행
        let bootstrap = Arc::new(ReferenceData::default());
        let mut outcomes = Vec::with_capacity(self.catalog.len());
        for feed in self.feeds_in(Phase::Reference) {
            let outcome = sync_feed(&self.ctx, feed, bootstrap.clone(), opts.feed_options(feed)).await;
            outcomes.push(outcome);
        }

        let reference = Arc::new(self.reference.load().await?);
        if reference.trade_dates.is_empty() {
            warn!("거래일 캘린더가 비어 있습니다. 거래일 기준 피드는 실패합니다");
        }

        let pool_feeds = self.feeds_in(Phase::Pool);
        info!(feeds = pool_feeds.len(), processes = opts.processes, "피드 풀 실행");
        let ctx = self.ctx.clone();
        let pooled = run_bounded(
            pool_feeds,
            opts.processes,
            CancellationToken::new(),
            move |feed: &'static FeedDef| {
                let ctx = ctx.clone();
                let reference = reference.clone();
                let feed_opts = opts.feed_options(feed);
                async move { Ok::<_, CollectorError>(sync_feed(&ctx, feed, reference, feed_opts).await) }
            },
        )
        .await?;
        outcomes.extend(pooled);

        let entries = self.summarize(&outcomes, opts.now).await;
        let report = RunReport {
            outcomes,
            entries,
            elapsed: started.elapsed(),
        };
        info!(
            feeds = report.outcomes.len(),
            failed = report.failed().len(),
            rows = report.rows(),
            elapsed = format!("{:.1}s", report.elapsed.as_secs_f64()),
            "=== 전체 동기화 완료 ==="
        );
        Ok(report)
    }

    /// 피드 하나 동기화.
    ///
    /// 참조 단계 피드가 아니면 먼저 참조 데이터를 로드합니다.
    pub async fn sync_one(&self, feed: &'static FeedDef, opts: SyncOptions) -> Result<FeedOutcome> {
        let reference = match feed.phase {
            Phase::Reference => ReferenceData::default(),
            Phase::Pool => self.reference.load().await?,
        };
        Ok(sync_feed(&self.ctx, feed, Arc::new(reference), opts).await)
    }

    fn feeds_in(&self, phase: Phase) -> Vec<&'static FeedDef> {
        self.catalog
            .iter()
            .copied()
            .filter(|f| f.phase == phase)
            .collect()
    }

    /// 동기화 로그 스냅샷을 기록하고 요약 항목 저장.
    async fn summarize(&self, outcomes: &[FeedOutcome], now: NaiveDateTime) -> Vec<SyncLogEntry> {
        let entries = match self.ctx.sync_log.snapshot().await {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "동기화 로그 조회 실패");
                Vec::new()
            }
        };
        for entry in &entries {
            info!(
                module = %entry.module,
                table = %entry.table_name,
                state = entry.state.as_str(),
                last_date = ?entry.last_date,
                "피드 상태"
            );
        }

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        let recorded = if failed == 0 {
            self.ctx
                .sync_log
                .record_success(SUMMARY_MODULE, SUMMARY_TABLE, now.date())
                .await
        } else {
            warn!(failed, total = outcomes.len(), "일부 피드 동기화 실패");
            self.ctx
                .sync_log
                .record_failure(SUMMARY_MODULE, SUMMARY_TABLE)
                .await
        };
        if let Err(e) = recorded {
            error!(error = %e, "요약 항목 기록 실패");
        }

        entries
            .into_iter()
            .filter(|e| !(e.module == SUMMARY_MODULE && e.table_name == SUMMARY_TABLE))
            .collect()
    }
}

/// 실패 상태인 로그 항목만.
pub fn failed_entries(entries: &[SyncLogEntry]) -> impl Iterator<Item = &SyncLogEntry> {
    entries.iter().filter(|e| e.state == SyncState::Failed)
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("ctx", &self.ctx)
            .field("feeds", &self.catalog.len())
            .finish()
    }
}
