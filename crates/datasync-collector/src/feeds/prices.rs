//! 시세 이력 피드.
//!
//! A주 일/주/월봉(무복권, 전복권, 후복권), 30분봉, 개념/업종 보드 일봉.
//! 모두 엔티티(종목 또는 보드)별 워터마크로 동기화합니다.
//!
//! 전복권(qfq) 피드는 배당/분할 후 과거 가격이 바뀌므로 경계 봉 종가를
//! 비교해 달라졌으면 해당 종목 이력 전체를 다시 받습니다.

use datasync_core::{Cadence, ColumnDef, ColumnKind, EndRule, EntitySet, Epoch, Source, TableSchema};

use crate::engine::{FeedDef, Param, RequestDef};

/// 일/주/월봉 공통 시세 컬럼 (엔티티/시각 컬럼 제외).
macro_rules! bar_columns {
    ($($head:expr),* $(,)?) => {
        &[
            $($head,)*
            ColumnDef::field("open", ColumnKind::Float(None), &["开盘"]),
            ColumnDef::field("close", ColumnKind::Float(None), &["收盘"]),
            ColumnDef::field("high", ColumnKind::Float(None), &["最高"]),
            ColumnDef::field("low", ColumnKind::Float(None), &["最低"]),
            ColumnDef::field("volume", ColumnKind::Int, &["成交量"]),
            ColumnDef::field("amount", ColumnKind::Float(None), &["成交额"]),
            ColumnDef::field("amplitude", ColumnKind::Float(None), &["振幅"]),
            ColumnDef::field("pct_change", ColumnKind::Float(None), &["涨跌幅"]),
            ColumnDef::field("change", ColumnKind::Float(None), &["涨跌额"]),
            ColumnDef::field("turnover", ColumnKind::Float(None), &["换手率"]),
        ]
    };
}

const STOCK_BAR_COLUMNS: &[ColumnDef] = bar_columns![
    ColumnDef::entity("code"),
    ColumnDef::field("trade_date", ColumnKind::Date, &["日期"]),
];

const STOCK_MINUTE_COLUMNS: &[ColumnDef] = bar_columns![
    ColumnDef::entity("code"),
    ColumnDef::field("trade_time", ColumnKind::DateTime, &["时间"]),
];

const BOARD_BAR_COLUMNS: &[ColumnDef] = bar_columns![
    ColumnDef {
        name: "board_code",
        kind: ColumnKind::Text,
        source: Source::Entity,
    },
    ColumnDef::entity_name("board_name"),
    ColumnDef::field("trade_date", ColumnKind::Date, &["日期"]),
];

const fn stock_bar_schema(table: &'static str) -> TableSchema {
    TableSchema {
        table,
        columns: STOCK_BAR_COLUMNS,
        natural_key: &["code", "trade_date"],
        watermark_column: "trade_date",
        entity_column: Some("code"),
    }
}

const fn stock_minute_schema(table: &'static str) -> TableSchema {
    TableSchema {
        table,
        columns: STOCK_MINUTE_COLUMNS,
        natural_key: &["code", "trade_time"],
        watermark_column: "trade_time",
        entity_column: Some("code"),
    }
}

const fn board_bar_schema(table: &'static str) -> TableSchema {
    TableSchema {
        table,
        columns: BOARD_BAR_COLUMNS,
        natural_key: &["board_code", "trade_date"],
        watermark_column: "trade_date",
        entity_column: Some("board_code"),
    }
}

/// A주 일/주/월봉 피드.
const fn stock_bar_feed(
    schema: &'static TableSchema,
    requests: &'static [RequestDef],
    inclusive: bool,
) -> FeedDef {
    FeedDef::new("stock_zh_a_hist", schema, requests)
        .per_entity(EntitySet::AShares, &[])
        .with_cadence(Cadence::Daily { inclusive })
        .with_end(EndRule::last_trading_day())
        .with_workers(5)
        .proxied()
}

/// A주 30분봉 피드. 최근 50일만 제공되므로 epoch도 50일 전.
const fn stock_minute_feed(schema: &'static TableSchema, requests: &'static [RequestDef]) -> FeedDef {
    FeedDef::new("stock_zh_a_hist_min_em", schema, requests)
        .per_entity(EntitySet::AShares, &[])
        .with_cadence(Cadence::Intraday)
        .with_end(EndRule::IntradayBar)
        .with_epoch(Epoch::DaysAgo(50))
        .with_workers(5)
        .proxied()
}

// ---- 일봉 ----

static DAILY_BFQ_SCHEMA: TableSchema = stock_bar_schema("stock_zh_a_hist_daily_bfq");
static DAILY_QFQ_SCHEMA: TableSchema = stock_bar_schema("stock_zh_a_hist_daily_qfq");
static DAILY_HFQ_SCHEMA: TableSchema = stock_bar_schema("stock_zh_a_hist_daily_hfq");

pub static STOCK_ZH_A_HIST_DAILY_BFQ: FeedDef = stock_bar_feed(
    &DAILY_BFQ_SCHEMA,
    &[RequestDef::new(
        "stock_zh_a_hist",
        &[
            ("symbol", Param::Entity),
            ("period", Param::Const("daily")),
            ("start_date", Param::Start),
            ("end_date", Param::End),
            ("adjust", Param::Const("")),
            ("timeout", Param::Const("20")),
        ],
    )],
    false,
)
.describe("东方财富-沪深京 A 股日频率数据 - 不复权");

pub static STOCK_ZH_A_HIST_DAILY_QFQ: FeedDef = stock_bar_feed(
    &DAILY_QFQ_SCHEMA,
    &[RequestDef::new(
        "stock_zh_a_hist",
        &[
            ("symbol", Param::Entity),
            ("period", Param::Const("daily")),
            ("start_date", Param::Start),
            ("end_date", Param::End),
            ("adjust", Param::Const("qfq")),
            ("timeout", Param::Const("20")),
        ],
    )],
    true,
)
.describe("东方财富-沪深京 A 股日频率数据 - 前复权")
.with_revision("close");

pub static STOCK_ZH_A_HIST_DAILY_HFQ: FeedDef = stock_bar_feed(
    &DAILY_HFQ_SCHEMA,
    &[RequestDef::new(
        "stock_zh_a_hist",
        &[
            ("symbol", Param::Entity),
            ("period", Param::Const("daily")),
            ("start_date", Param::Start),
            ("end_date", Param::End),
            ("adjust", Param::Const("hfq")),
            ("timeout", Param::Const("20")),
        ],
    )],
    false,
)
.describe("东方财富-沪深京 A 股日频率数据 - 后复权");

// ---- 주/월봉 ----
// 주/월봉은 마지막 봉이 기간 중에 계속 바뀌므로 워터마크 봉부터 다시 받습니다.

static WEEKLY_QFQ_SCHEMA: TableSchema = stock_bar_schema("stock_zh_a_hist_weekly_qfq");
static WEEKLY_HFQ_SCHEMA: TableSchema = stock_bar_schema("stock_zh_a_hist_weekly_hfq");
static MONTHLY_QFQ_SCHEMA: TableSchema = stock_bar_schema("stock_zh_a_hist_monthly_qfq");
static MONTHLY_HFQ_SCHEMA: TableSchema = stock_bar_schema("stock_zh_a_hist_monthly_hfq");

pub static STOCK_ZH_A_HIST_WEEKLY_QFQ: FeedDef = stock_bar_feed(
    &WEEKLY_QFQ_SCHEMA,
    &[RequestDef::new(
        "stock_zh_a_hist",
        &[
            ("symbol", Param::Entity),
            ("period", Param::Const("weekly")),
            ("start_date", Param::Start),
            ("end_date", Param::End),
            ("adjust", Param::Const("qfq")),
            ("timeout", Param::Const("20")),
        ],
    )],
    true,
)
.describe("东方财富-沪深京 A 股周频率数据 - 前复权")
.with_revision("close");

pub static STOCK_ZH_A_HIST_WEEKLY_HFQ: FeedDef = stock_bar_feed(
    &WEEKLY_HFQ_SCHEMA,
    &[RequestDef::new(
        "stock_zh_a_hist",
        &[
            ("symbol", Param::Entity),
            ("period", Param::Const("weekly")),
            ("start_date", Param::Start),
            ("end_date", Param::End),
            ("adjust", Param::Const("hfq")),
            ("timeout", Param::Const("20")),
        ],
    )],
    true,
)
.describe("东方财富-沪深京 A 股周频率数据 - 后复权");

pub static STOCK_ZH_A_HIST_MONTHLY_QFQ: FeedDef = stock_bar_feed(
    &MONTHLY_QFQ_SCHEMA,
    &[RequestDef::new(
        "stock_zh_a_hist",
        &[
            ("symbol", Param::Entity),
            ("period", Param::Const("monthly")),
            ("start_date", Param::Start),
            ("end_date", Param::End),
            ("adjust", Param::Const("qfq")),
            ("timeout", Param::Const("20")),
        ],
    )],
    true,
)
.describe("东方财富-沪深京 A 股月频率数据 - 前复权")
.with_revision("close");

pub static STOCK_ZH_A_HIST_MONTHLY_HFQ: FeedDef = stock_bar_feed(
    &MONTHLY_HFQ_SCHEMA,
    &[RequestDef::new(
        "stock_zh_a_hist",
        &[
            ("symbol", Param::Entity),
            ("period", Param::Const("monthly")),
            ("start_date", Param::Start),
            ("end_date", Param::End),
            ("adjust", Param::Const("hfq")),
            ("timeout", Param::Const("20")),
        ],
    )],
    true,
)
.describe("东方财富-沪深京 A 股月频率数据 - 后复权");

// ---- 30분봉 ----

static MIN30_QFQ_SCHEMA: TableSchema = stock_minute_schema("stock_zh_a_hist_30min_qfq");
static MIN30_HFQ_SCHEMA: TableSchema = stock_minute_schema("stock_zh_a_hist_30min_hfq");

pub static STOCK_ZH_A_HIST_30MIN_QFQ: FeedDef = stock_minute_feed(
    &MIN30_QFQ_SCHEMA,
    &[RequestDef::new(
        "stock_zh_a_hist_min_em",
        &[
            ("symbol", Param::Entity),
            ("start_date", Param::StartTime),
            ("end_date", Param::EndTime),
            ("period", Param::Const("30")),
            ("adjust", Param::Const("qfq")),
        ],
    )],
)
.describe("东方财富网-沪深京 A 股分时行情-30分钟-前复权")
.with_revision("close");

pub static STOCK_ZH_A_HIST_30MIN_HFQ: FeedDef = stock_minute_feed(
    &MIN30_HFQ_SCHEMA,
    &[RequestDef::new(
        "stock_zh_a_hist_min_em",
        &[
            ("symbol", Param::Entity),
            ("start_date", Param::StartTime),
            ("end_date", Param::EndTime),
            ("period", Param::Const("30")),
            ("adjust", Param::Const("hfq")),
        ],
    )],
)
.describe("东方财富网-沪深京 A 股分时行情-30分钟-后复权");

// ---- 보드 일봉 ----

static CONCEPT_HIST_SCHEMA: TableSchema = board_bar_schema("stock_board_concept_hist_em");
static INDUSTRY_HIST_SCHEMA: TableSchema = board_bar_schema("stock_board_industry_hist_em");

/// 일부 개념 보드는 이력 API가 응답하지 않음
const BROKEN_CONCEPT_BOARDS: &[&str] = &["BK1631", "BK1632", "BK1633", "BK1634"];

/// 보드 일봉 종료일: 15:30 이후면 오늘 전 거래일까지.
const BOARD_END: EndRule = EndRule::LastTradingDay {
    cutoff: (15, 30),
    strict: true,
};

pub static STOCK_BOARD_CONCEPT_HIST_EM: FeedDef = FeedDef::new(
    "stock_board_concept_hist_em",
    &CONCEPT_HIST_SCHEMA,
    &[RequestDef::new(
        "stock_board_concept_hist_em",
        &[
            ("symbol", Param::EntityName),
            ("period", Param::Const("daily")),
            ("start_date", Param::Start),
            ("end_date", Param::End),
            ("adjust", Param::Const("")),
        ],
    )],
)
.describe("东方财富-沪深板块-概念板块-历史行情数据")
.per_entity(EntitySet::ConceptBoards, BROKEN_CONCEPT_BOARDS)
.with_cadence(Cadence::Daily { inclusive: false })
.with_end(BOARD_END)
.with_epoch(Epoch::Date(20200101))
.with_workers(1)
.proxied();

pub static STOCK_BOARD_INDUSTRY_HIST_EM: FeedDef = FeedDef::new(
    "stock_board_industry_hist_em",
    &INDUSTRY_HIST_SCHEMA,
    &[RequestDef::new(
        "stock_board_industry_hist_em",
        &[
            ("symbol", Param::EntityName),
            ("period", Param::Const("日k")),
            ("start_date", Param::Start),
            ("end_date", Param::End),
            ("adjust", Param::Const("")),
        ],
    )],
)
.describe("东方财富-沪深板块-行业板块-历史行情数据")
.per_entity(EntitySet::IndustryBoards, &[])
.with_cadence(Cadence::Daily { inclusive: false })
.with_end(BOARD_END)
.with_epoch(Epoch::Date(20200101))
.with_workers(1)
.proxied();

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::WriteMode;
    use chrono::NaiveDate;
    use datasync_core::{Entity, WorkUnit};

    #[test]
    fn test_bar_columns_share_layout() {
        assert_eq!(STOCK_BAR_COLUMNS.len(), 12);
        assert_eq!(STOCK_MINUTE_COLUMNS.len(), 12);
        assert_eq!(BOARD_BAR_COLUMNS.len(), 13);
        assert_eq!(DAILY_QFQ_SCHEMA.column_index("close"), Some(3));
    }

    #[test]
    fn test_only_forward_adjusted_feeds_check_revisions() {
        let revised: Vec<_> = [
            &STOCK_ZH_A_HIST_DAILY_BFQ,
            &STOCK_ZH_A_HIST_DAILY_QFQ,
            &STOCK_ZH_A_HIST_DAILY_HFQ,
            &STOCK_ZH_A_HIST_WEEKLY_QFQ,
            &STOCK_ZH_A_HIST_MONTHLY_QFQ,
            &STOCK_ZH_A_HIST_30MIN_QFQ,
            &STOCK_ZH_A_HIST_30MIN_HFQ,
        ]
        .into_iter()
        .filter(|f| f.revision_column.is_some())
        .map(|f| f.table())
        .collect();
        assert_eq!(
            revised,
            vec![
                "stock_zh_a_hist_daily_qfq",
                "stock_zh_a_hist_weekly_qfq",
                "stock_zh_a_hist_monthly_qfq",
                "stock_zh_a_hist_30min_qfq",
            ]
        );
    }

    #[test]
    fn test_price_feeds_replace_ranges() {
        for feed in [&STOCK_ZH_A_HIST_DAILY_BFQ, &STOCK_ZH_A_HIST_30MIN_HFQ, &STOCK_BOARD_CONCEPT_HIST_EM] {
            assert_eq!(feed.write, WriteMode::ReplaceRange);
            assert!(feed.proxied);
        }
    }

    #[test]
    fn test_board_request_uses_board_name() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let board = Entity::new("BK0477", "酿酒行业");
        let req = STOCK_BOARD_INDUSTRY_HIST_EM.requests[0].build(&WorkUnit::new(day, day), Some(&board));
        assert_eq!(req.get("symbol"), Some("酿酒行业"));
        assert_eq!(req.get("start_date"), Some("20240102"));
    }
}
