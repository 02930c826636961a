//! 메모리 저장소와 모의 데이터 소스로 피드 동기화 흐름을 검증합니다.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;

use datasync_collector::engine::{
    sync_feed, FeedDef, Param, RequestDef, SyncContext, SyncOptions, WriteMode,
};
use datasync_collector::orchestrator::{RunAllOptions, SUMMARY_MODULE, SUMMARY_TABLE};
use datasync_collector::Orchestrator;
use datasync_core::{
    Cadence, ColumnDef, ColumnKind, EndRule, Entity, EntitySet, Epoch, ReferenceData, TableSchema,
    Value,
};
use datasync_data::{
    MemoryFeedStore, MemorySyncLog, MemoryWatermarkStore, StaticReference, SyncState,
};
use datasync_provider::{
    ApiRequest, DataSource, MockDataSource, ProviderError, Record, RetryConfig, RetryingFetcher,
    Transport,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
    date.and_hms_opt(h, m, 0).unwrap()
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    at(date, 0, 0)
}

fn records(rows: serde_json::Value) -> Vec<Record> {
    rows.as_array()
        .unwrap()
        .iter()
        .map(|r| r.as_object().unwrap().clone())
        .collect()
}

fn no_data(request: &ApiRequest) -> ProviderError {
    ProviderError::NoData {
        function: request.function.clone(),
    }
}

fn trade_dates() -> Vec<NaiveDate> {
    vec![
        d(2024, 1, 2),
        d(2024, 1, 3),
        d(2024, 1, 4),
        d(2024, 1, 5),
        d(2024, 1, 8),
        d(2024, 1, 9),
    ]
}

fn reference(codes: &[&str]) -> ReferenceData {
    let mut data = ReferenceData::default().with_trade_dates(trade_dates());
    data.a_shares = codes
        .iter()
        .map(|code| Entity::new(*code, format!("测试{}", code)))
        .collect();
    data
}

fn options(now: NaiveDateTime) -> SyncOptions {
    SyncOptions {
        drop_existing: false,
        transport: Transport::Direct,
        workers: None,
        default_workers: 5,
        now,
    }
}

struct Harness {
    source: Arc<MockDataSource>,
    feeds: Arc<MemoryFeedStore>,
    watermarks: Arc<MemoryWatermarkStore>,
    sync_log: Arc<MemorySyncLog>,
    ctx: Arc<SyncContext>,
}

fn harness<F>(responder: F) -> Harness
where
    F: Fn(&ApiRequest, Transport) -> datasync_provider::Result<Vec<Record>> + Send + Sync + 'static,
{
    let source = Arc::new(MockDataSource::new(responder));
    let feeds = Arc::new(MemoryFeedStore::new());
    let watermarks = Arc::new(MemoryWatermarkStore::with_fallback(feeds.clone()));
    let sync_log = Arc::new(MemorySyncLog::new());
    let ctx = Arc::new(SyncContext {
        fetcher: RetryingFetcher::new(
            source.clone() as Arc<dyn DataSource>,
            RetryConfig::no_retry(),
        ),
        feeds: feeds.clone(),
        watermarks: watermarks.clone(),
        sync_log: sync_log.clone(),
    });
    Harness {
        source,
        feeds,
        watermarks,
        sync_log,
        ctx,
    }
}

// ==================== 테스트 피드 ====================

static QUARTER_SCHEMA: TableSchema = TableSchema {
    table: "test_quarterly",
    columns: &[
        ColumnDef::field("code", ColumnKind::Code, &["股票代码"]),
        ColumnDef::range_end("report_date", ColumnKind::Date),
        ColumnDef::field("revenue", ColumnKind::Float(None), &["营业收入"]),
    ],
    natural_key: &["code", "report_date"],
    watermark_column: "report_date",
    entity_column: None,
};

static QUARTERLY: FeedDef = FeedDef::new(
    "test_quarterly",
    &QUARTER_SCHEMA,
    &[RequestDef::new("stock_lrb_em", &[("date", Param::End)])],
)
.with_cadence(Cadence::Quarterly { revisit: 0 })
.with_epoch(Epoch::Date(20100331));

static QUARTERLY_REVISIT: FeedDef = FeedDef::new(
    "test_quarterly",
    &QUARTER_SCHEMA,
    &[RequestDef::new("stock_lrb_em", &[("date", Param::End)])],
)
.with_cadence(Cadence::Quarterly { revisit: 1 })
.with_epoch(Epoch::Date(20100331));

static DAILY_SCHEMA: TableSchema = TableSchema {
    table: "test_daily_qfq",
    columns: &[
        ColumnDef::entity("code"),
        ColumnDef::field("trade_date", ColumnKind::Date, &["日期"]),
        ColumnDef::field("close", ColumnKind::Float(Some(2)), &["收盘"]),
    ],
    natural_key: &["code", "trade_date"],
    watermark_column: "trade_date",
    entity_column: Some("code"),
};

const DAILY_REQUEST: &[RequestDef] = &[RequestDef::new(
    "stock_zh_a_hist",
    &[
        ("symbol", Param::Entity),
        ("start_date", Param::Start),
        ("end_date", Param::End),
        ("adjust", Param::Const("qfq")),
    ],
)];

static DAILY_REVISED: FeedDef = FeedDef::new("test_daily", &DAILY_SCHEMA, DAILY_REQUEST)
    .per_entity(EntitySet::AShares, &[])
    .with_cadence(Cadence::Daily { inclusive: true })
    .with_end(EndRule::last_trading_day())
    .with_epoch(Epoch::Date(20240101))
    .with_revision("close")
    .with_workers(1);

static DAILY_PLAIN: FeedDef = FeedDef::new("test_daily", &DAILY_SCHEMA, DAILY_REQUEST)
    .per_entity(EntitySet::AShares, &[])
    .with_cadence(Cadence::Daily { inclusive: false })
    .with_end(EndRule::last_trading_day())
    .with_epoch(Epoch::Date(20240101))
    .with_workers(1)
    .proxied();

static MARGIN_SCHEMA: TableSchema = TableSchema {
    table: "test_margin",
    columns: &[
        ColumnDef::range_end("trade_date", ColumnKind::Date),
        ColumnDef::field("balance", ColumnKind::Float(None), &["融资余额"]),
    ],
    natural_key: &["trade_date"],
    watermark_column: "trade_date",
    entity_column: None,
};

static MARGIN: FeedDef = FeedDef::new(
    "test_margin",
    &MARGIN_SCHEMA,
    &[RequestDef::new("stock_margin_szse", &[("date", Param::End)])],
)
.with_cadence(Cadence::TradingDays)
.with_end(EndRule::Yesterday)
.with_epoch(Epoch::Date(20240101));

static CALENDAR_SCHEMA: TableSchema = TableSchema {
    table: "test_trade_date",
    columns: &[ColumnDef::field("trade_date", ColumnKind::Date, &["trade_date"])],
    natural_key: &["trade_date"],
    watermark_column: "trade_date",
    entity_column: None,
};

static CALENDAR: FeedDef = FeedDef::new(
    "test_trade_date",
    &CALENDAR_SCHEMA,
    &[RequestDef::new("tool_trade_date_hist_sina", &[])],
)
.reference()
.with_write(WriteMode::ReplaceAll);

static BROKEN_SCHEMA: TableSchema = TableSchema {
    table: "test_broken",
    columns: &[
        ColumnDef::range_end("trade_date", ColumnKind::Date),
        ColumnDef::field("value", ColumnKind::Float(None), &["值"]),
    ],
    natural_key: &["trade_date"],
    watermark_column: "trade_date",
    entity_column: None,
};

static BROKEN: FeedDef = FeedDef::new(
    "test_broken",
    &BROKEN_SCHEMA,
    &[RequestDef::new("broken_feed", &[("date", Param::End)])],
)
.with_cadence(Cadence::TradingDays)
.with_end(EndRule::Yesterday)
.with_epoch(Epoch::Date(20240101));

static TEST_CATALOG: [&FeedDef; 3] = [&CALENDAR, &DAILY_PLAIN, &BROKEN];

// ==================== 시나리오 ====================

#[tokio::test]
async fn test_quarterly_feed_without_new_quarter_is_noop() {
    let h = harness(|_, _| Ok(Vec::new()));
    h.watermarks
        .set("test_quarterly", "", midnight(d(2023, 12, 31)));

    let outcome = sync_feed(
        &h.ctx,
        &QUARTERLY,
        Arc::new(ReferenceData::default()),
        options(at(d(2024, 1, 10), 10, 0)),
    )
    .await;

    assert!(outcome.is_success());
    assert_eq!(h.source.call_count(), 0);
    assert_eq!(outcome.stats.skipped, 1);
    let entry = h.sync_log.entry("test_quarterly", "test_quarterly").unwrap();
    assert_eq!(entry.state, SyncState::Success);
    assert_eq!(entry.last_date, Some(d(2023, 12, 31)));
}

#[tokio::test]
async fn test_up_to_date_feed_logs_success_without_fetching() {
    let h = harness(|_, _| Ok(Vec::new()));
    h.watermarks.set("test_margin", "", midnight(d(2024, 1, 5)));

    // 토요일 실행: 어제(금요일)까지 이미 동기화됨
    let outcome = sync_feed(
        &h.ctx,
        &MARGIN,
        Arc::new(reference(&[])),
        options(at(d(2024, 1, 6), 10, 0)),
    )
    .await;

    assert!(outcome.is_success());
    assert_eq!(h.source.call_count(), 0);
    assert_eq!(outcome.last_date, Some(d(2024, 1, 5)));
    assert!(h.feeds.has_table("test_margin"));
}

#[tokio::test]
async fn test_adjusted_close_change_replaces_entity_history() {
    let h = harness(|req, _| {
        let symbol = req.get("symbol").unwrap_or_default();
        let start = req.get("start_date").unwrap_or_default();
        let rows = match (symbol, start) {
            // 경계 봉 종가가 저장된 값(11.0)과 다름
            ("000001", "20240105") => json!([
                {"日期": "2024-01-05", "收盘": 10.5},
                {"日期": "2024-01-08", "收盘": 10.8},
                {"日期": "2024-01-09", "收盘": 10.9},
            ]),
            ("000001", "20240101") => json!([
                {"日期": "2024-01-04", "收盘": 9.5},
                {"日期": "2024-01-05", "收盘": 10.5},
                {"日期": "2024-01-08", "收盘": 10.8},
                {"日期": "2024-01-09", "收盘": 10.9},
            ]),
            ("000002", "20240105") => json!([
                {"日期": "2024-01-05", "收盘": 20.0},
                {"日期": "2024-01-08", "收盘": 20.5},
            ]),
            _ => return Err(no_data(req)),
        };
        Ok(records(rows))
    });

    let row = |code: &str, day: u32, close: f64| {
        vec![
            Value::Text(code.to_string()),
            Value::Date(d(2024, 1, day)),
            Value::Float(close),
        ]
    };
    h.feeds.seed(
        &DAILY_SCHEMA,
        vec![
            row("000001", 4, 10.0),
            row("000001", 5, 11.0),
            row("000002", 4, 19.0),
            row("000002", 5, 20.0),
        ],
    );

    let outcome = sync_feed(
        &h.ctx,
        &DAILY_REVISED,
        Arc::new(reference(&["000001", "000002"])),
        options(at(d(2024, 1, 9), 18, 0)),
    )
    .await;
    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.stats.revised, 1);
    assert_eq!(outcome.last_date, Some(d(2024, 1, 9)));

    let rows = h.feeds.rows("test_daily_qfq");
    let close_of = |code: &str, day: u32| {
        rows.iter()
            .find(|r| r[0] == Value::Text(code.into()) && r[1] == Value::Date(d(2024, 1, day)))
            .and_then(|r| r[2].as_f64())
    };
    // 000001: 전체 이력 교체
    assert_eq!(close_of("000001", 4), Some(9.5));
    assert_eq!(close_of("000001", 5), Some(10.5));
    assert_eq!(close_of("000001", 9), Some(10.9));
    // 000002: 종가 동일, 구간만 교체하고 이전 행 유지
    assert_eq!(close_of("000002", 4), Some(19.0));
    assert_eq!(close_of("000002", 8), Some(20.5));
    assert_eq!(rows.len(), 7);

    let full_history_calls = h
        .source
        .calls()
        .iter()
        .filter(|(req, _)| req.get("start_date") == Some("20240101"))
        .count();
    assert_eq!(full_history_calls, 1);
    assert_eq!(
        h.watermarks.get("test_daily_qfq", "000001"),
        Some(midnight(d(2024, 1, 9)))
    );
    assert_eq!(
        h.watermarks.get("test_daily_qfq", "000002"),
        Some(midnight(d(2024, 1, 8)))
    );
}

#[tokio::test]
async fn test_adjusted_close_change_without_history_writes_boundary_unit() {
    let h = harness(|req, _| match req.get("start_date") {
        Some("20240105") => Ok(records(json!([
            {"日期": "2024-01-05", "收盘": 10.5},
            {"日期": "2024-01-08", "收盘": 10.8},
            {"日期": "2024-01-09", "收盘": 10.9},
        ]))),
        _ => Err(no_data(req)),
    });
    h.feeds.seed(
        &DAILY_SCHEMA,
        vec![
            vec![Value::from("000001"), Value::Date(d(2024, 1, 4)), Value::Float(10.0)],
            vec![Value::from("000001"), Value::Date(d(2024, 1, 5)), Value::Float(11.0)],
        ],
    );

    let outcome = sync_feed(
        &h.ctx,
        &DAILY_REVISED,
        Arc::new(reference(&["000001"])),
        options(at(d(2024, 1, 9), 18, 0)),
    )
    .await;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.stats.revised, 0);
    // 경계 구간 요청 + 실패한 전체 이력 요청
    assert_eq!(h.source.call_count(), 2);

    let closes: Vec<(Value, Value)> = h
        .feeds
        .rows("test_daily_qfq")
        .into_iter()
        .map(|r| (r[1].clone(), r[2].clone()))
        .collect();
    assert_eq!(
        closes,
        vec![
            (Value::Date(d(2024, 1, 4)), Value::Float(10.0)),
            (Value::Date(d(2024, 1, 5)), Value::Float(10.5)),
            (Value::Date(d(2024, 1, 8)), Value::Float(10.8)),
            (Value::Date(d(2024, 1, 9)), Value::Float(10.9)),
        ]
    );
    assert_eq!(
        h.watermarks.get("test_daily_qfq", "000001"),
        Some(midnight(d(2024, 1, 9)))
    );
}

#[tokio::test]
async fn test_quarterly_revisit_rewrites_last_quarter() {
    let h = harness(|req, _| match req.get("date") {
        Some("20240331") => Ok(records(json!([{"股票代码": "000001", "营业收入": 2.0}]))),
        Some("20240630") => Ok(records(json!([{"股票代码": "000001", "营业收入": 3.0}]))),
        _ => Err(no_data(req)),
    });
    let row = |code: &str, date: NaiveDate, revenue: f64| {
        vec![Value::from(code), Value::Date(date), Value::Float(revenue)]
    };
    h.feeds.seed(
        &QUARTER_SCHEMA,
        vec![
            row("000001", d(2023, 12, 31), 0.5),
            row("000001", d(2024, 3, 31), 1.0),
            // 정정 공시로 사라진 행
            row("000009", d(2024, 3, 31), 5.0),
        ],
    );
    h.watermarks
        .set("test_quarterly", "", midnight(d(2024, 3, 31)));

    let outcome = sync_feed(
        &h.ctx,
        &QUARTERLY_REVISIT,
        Arc::new(ReferenceData::default()),
        options(at(d(2024, 8, 15), 10, 0)),
    )
    .await;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    let dates: Vec<Option<String>> = h
        .source
        .calls()
        .iter()
        .map(|(req, _)| req.get("date").map(str::to_string))
        .collect();
    assert_eq!(
        dates,
        vec![Some("20240331".to_string()), Some("20240630".to_string())]
    );

    assert_eq!(
        h.feeds.rows("test_quarterly"),
        vec![
            row("000001", d(2023, 12, 31), 0.5),
            row("000001", d(2024, 3, 31), 2.0),
            row("000001", d(2024, 6, 30), 3.0),
        ]
    );
    assert_eq!(
        h.watermarks.get("test_quarterly", ""),
        Some(midnight(d(2024, 6, 30)))
    );
}

#[tokio::test]
async fn test_entity_failure_stops_remaining_entities() {
    let h = harness(|req, _| {
        if req.get("symbol") == Some("000003") {
            return Err(ProviderError::Http {
                status: 400,
                body: "bad symbol".to_string(),
            });
        }
        Ok(records(json!([{"日期": "2024-01-08", "收盘": 1.0}])))
    });
    let codes: Vec<String> = (1..=10).map(|n| format!("{:06}", n)).collect();
    let code_refs: Vec<&str> = codes.iter().map(String::as_str).collect();

    let outcome = sync_feed(
        &h.ctx,
        &DAILY_PLAIN,
        Arc::new(reference(&code_refs)),
        options(at(d(2024, 1, 9), 18, 0)),
    )
    .await;

    assert!(!outcome.is_success());
    let requested: Vec<String> = h
        .source
        .calls()
        .iter()
        .filter_map(|(req, _)| req.get("symbol").map(str::to_string))
        .collect();
    assert_eq!(requested, vec!["000001", "000002", "000003"]);

    let stored: Vec<Value> = h
        .feeds
        .rows("test_daily_qfq")
        .into_iter()
        .map(|r| r[0].clone())
        .collect();
    assert_eq!(stored, vec![Value::from("000001"), Value::from("000002")]);
    assert!(h.watermarks.get("test_daily_qfq", "000003").is_none());
    assert!(h.watermarks.get("test_daily_qfq", "000004").is_none());

    let entry = h.sync_log.entry("test_daily", "test_daily_qfq").unwrap();
    assert_eq!(entry.state, SyncState::Failed);
}

#[tokio::test]
async fn test_no_data_unit_is_skipped() {
    let h = harness(|req, _| match req.get("date") {
        Some("20240104") => Err(no_data(req)),
        Some(_) => Ok(records(json!([{"融资余额": 100.0}]))),
        None => Err(no_data(req)),
    });
    h.watermarks.set("test_margin", "", midnight(d(2024, 1, 2)));

    let outcome = sync_feed(
        &h.ctx,
        &MARGIN,
        Arc::new(reference(&[])),
        options(at(d(2024, 1, 6), 10, 0)),
    )
    .await;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(h.source.call_count(), 3);
    assert_eq!(outcome.stats.empty, 1);
    let dates: Vec<Value> = h
        .feeds
        .rows("test_margin")
        .into_iter()
        .map(|r| r[0].clone())
        .collect();
    assert_eq!(dates, vec![Value::Date(d(2024, 1, 3)), Value::Date(d(2024, 1, 5))]);
    assert_eq!(h.watermarks.get("test_margin", ""), Some(midnight(d(2024, 1, 5))));
}

#[tokio::test]
async fn test_write_failure_keeps_watermark() {
    let h = harness(|_, _| Ok(records(json!([{"融资余额": 100.0}]))));
    h.watermarks.set("test_margin", "", midnight(d(2024, 1, 2)));
    h.feeds.fail_writes("test_margin");

    let outcome = sync_feed(
        &h.ctx,
        &MARGIN,
        Arc::new(reference(&[])),
        options(at(d(2024, 1, 6), 10, 0)),
    )
    .await;

    assert!(!outcome.is_success());
    // 첫 구간에서 실패하면 남은 구간은 요청하지 않음
    assert_eq!(h.source.call_count(), 1);
    assert_eq!(h.watermarks.get("test_margin", ""), Some(midnight(d(2024, 1, 2))));
    let entry = h.sync_log.entry("test_margin", "test_margin").unwrap();
    assert_eq!(entry.state, SyncState::Failed);
    assert_eq!(entry.last_date, None);
}

#[tokio::test]
async fn test_drop_existing_resyncs_from_epoch() {
    let h = harness(|req, _| match req.get("date") {
        Some("20240102") => Ok(records(json!([{"融资余额": 1.0}]))),
        _ => Err(no_data(req)),
    });
    h.watermarks.set("test_margin", "", midnight(d(2024, 1, 5)));

    let opts = SyncOptions {
        drop_existing: true,
        ..options(at(d(2024, 1, 6), 10, 0))
    };
    let outcome = sync_feed(&h.ctx, &MARGIN, Arc::new(reference(&[])), opts).await;

    assert!(outcome.is_success());
    // epoch(2024-01-01) 다음 거래일부터 다시 요청
    assert_eq!(h.source.calls()[0].0.get("date"), Some("20240102"));
    assert_eq!(h.watermarks.get("test_margin", ""), Some(midnight(d(2024, 1, 2))));
}

#[tokio::test]
async fn test_run_all_runs_reference_phase_first_and_isolates_failures() {
    let h = harness(|req, _| match req.function.as_str() {
        "tool_trade_date_hist_sina" => Ok(records(json!([
            {"trade_date": "2024-01-08"},
            {"trade_date": "2024-01-09"},
        ]))),
        "stock_zh_a_hist" => Ok(records(json!([{"日期": "2024-01-08", "收盘": 5.0}]))),
        _ => Err(ProviderError::Http {
            status: 400,
            body: "unsupported".to_string(),
        }),
    });
    let orchestrator = Orchestrator::new(
        h.ctx.clone(),
        Arc::new(StaticReference(reference(&["000001", "000002"]))),
    )
    .with_catalog(&TEST_CATALOG);

    let report = orchestrator
        .run_all(RunAllOptions {
            processes: 2,
            use_proxy: true,
            default_workers: 5,
            now: at(d(2024, 1, 9), 18, 0),
        })
        .await
        .unwrap();

    let calls = h.source.calls();
    assert_eq!(calls[0].0.function, "tool_trade_date_hist_sina");
    assert_eq!(calls[0].1, Transport::Direct);
    assert!(calls
        .iter()
        .filter(|(req, _)| req.function == "stock_zh_a_hist")
        .all(|(_, transport)| *transport == Transport::Proxy));

    assert_eq!(report.outcomes.len(), 3);
    let failed: Vec<&str> = report.failed().iter().map(|o| o.table).collect();
    assert_eq!(failed, vec!["test_broken"]);
    assert_eq!(h.feeds.rows("test_daily_qfq").len(), 2);
    assert_eq!(h.feeds.rows("test_trade_date").len(), 2);

    assert_eq!(report.entries.len(), 3);
    let summary = h.sync_log.entry(SUMMARY_MODULE, SUMMARY_TABLE).unwrap();
    assert_eq!(summary.state, SyncState::Failed);
}

#[tokio::test]
async fn test_run_all_success_records_summary() {
    let h = harness(|req, _| match req.function.as_str() {
        "tool_trade_date_hist_sina" => Ok(records(json!([{"trade_date": "2024-01-09"}]))),
        _ => Ok(records(json!([{"日期": "2024-01-09", "收盘": 5.0}]))),
    });
    static CATALOG: [&FeedDef; 2] = [&CALENDAR, &DAILY_PLAIN];
    let orchestrator = Orchestrator::new(
        h.ctx.clone(),
        Arc::new(StaticReference(reference(&["000001"]))),
    )
    .with_catalog(&CATALOG);

    let report = orchestrator
        .run_all(RunAllOptions {
            processes: 4,
            use_proxy: false,
            default_workers: 5,
            now: at(d(2024, 1, 9), 18, 0),
        })
        .await
        .unwrap();

    assert!(report.is_success());
    assert!(h
        .source
        .calls()
        .iter()
        .all(|(_, transport)| *transport == Transport::Direct));
    let summary = h.sync_log.entry(SUMMARY_MODULE, SUMMARY_TABLE).unwrap();
    assert_eq!(summary.state, SyncState::Success);
    assert_eq!(summary.last_date, Some(d(2024, 1, 9)));
}
