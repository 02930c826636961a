//! 신용거래(融资融券) 및 홍콩 공매도 피드.

use datasync_core::{Cadence, ColumnDef, ColumnKind, EndRule, Epoch, TableSchema};

use crate::engine::{FeedDef, Param, RequestDef};

const AMOUNT: ColumnKind = ColumnKind::Float(None);

static MARGIN_SSE_SCHEMA: TableSchema = TableSchema {
    table: "stock_margin_sse",
    columns: &[
        ColumnDef::field("trade_date", ColumnKind::Date, &["信用交易日期", "日期"]),
        ColumnDef::field("financing_balance", AMOUNT, &["融资余额"]),
        ColumnDef::field("financing_buy", AMOUNT, &["融资买入额"]),
        ColumnDef::field("securities_lent", AMOUNT, &["融券余量"]),
        ColumnDef::field("securities_lent_amount", AMOUNT, &["融券余量金额"]),
        ColumnDef::field("securities_sold", AMOUNT, &["融券卖出量"]),
        ColumnDef::field("margin_balance", AMOUNT, &["融资融券余额"]),
    ],
    natural_key: &["trade_date"],
    watermark_column: "trade_date",
    entity_column: None,
};

/// 상해 신용거래 합계 (365일 구간, 거래일로 잘라 요청)
pub static STOCK_MARGIN_SSE: FeedDef = FeedDef::new(
    "stock_margin_sse",
    &MARGIN_SSE_SCHEMA,
    &[RequestDef::new(
        "stock_margin_sse",
        &[("start_date", Param::Start), ("end_date", Param::End)],
    )],
)
.describe("上海证券交易所-融资融券数据-融资融券汇总数据")
.with_cadence(Cadence::Windowed {
    days: 365,
    start_offset_days: 1,
    clip_to_trading: true,
})
.with_epoch(Epoch::Date(20130101));

static MARGIN_DETAIL_SSE_SCHEMA: TableSchema = TableSchema {
    table: "stock_margin_detail_sse",
    columns: &[
        ColumnDef::range_end("trade_date", ColumnKind::Date),
        ColumnDef::field("code", ColumnKind::Code, &["证券代码", "标的证券代码"]),
        ColumnDef::field("name", ColumnKind::Text, &["证券简称", "标的证券简称"]),
        ColumnDef::field("financing_balance", AMOUNT, &["融资余额"]),
        ColumnDef::field("financing_buy", AMOUNT, &["融资买入额"]),
        ColumnDef::field("financing_repay", AMOUNT, &["融资偿还额"]),
        ColumnDef::field("securities_lent", AMOUNT, &["融券余量"]),
        ColumnDef::field("securities_sold", AMOUNT, &["融券卖出量"]),
        ColumnDef::field("securities_repaid", AMOUNT, &["融券偿还量"]),
    ],
    natural_key: &["trade_date", "code"],
    watermark_column: "trade_date",
    entity_column: None,
};

/// 상해 신용거래 종목별 명세 (거래일 단위)
pub static STOCK_MARGIN_DETAIL_SSE: FeedDef = FeedDef::new(
    "stock_margin_detail_sse",
    &MARGIN_DETAIL_SSE_SCHEMA,
    &[RequestDef::new("stock_margin_detail_sse", &[("date", Param::End)])],
)
.describe("上海证券交易所-融资融券数据-融资融券明细数据")
.with_cadence(Cadence::TradingDays)
.with_end(EndRule::Yesterday)
.with_epoch(Epoch::Date(20140101))
.with_unit_delay(2000);

static MARGIN_SZSE_SCHEMA: TableSchema = TableSchema {
    table: "stock_margin_szse",
    columns: &[
        ColumnDef::range_end("trade_date", ColumnKind::Date),
        ColumnDef::field("financing_buy", AMOUNT, &["融资买入额"]),
        ColumnDef::field("financing_balance", AMOUNT, &["融资余额"]),
        ColumnDef::field("securities_sold", AMOUNT, &["融券卖出量"]),
        ColumnDef::field("securities_lent", AMOUNT, &["融券余量"]),
        ColumnDef::field("securities_lent_amount", AMOUNT, &["融券余额"]),
        ColumnDef::field("margin_balance", AMOUNT, &["融资融券余额"]),
    ],
    natural_key: &["trade_date"],
    watermark_column: "trade_date",
    entity_column: None,
};

/// 심천 신용거래 합계. 심천 사이트는 프록시를 거부함
pub static STOCK_MARGIN_SZSE: FeedDef = FeedDef::new(
    "stock_margin_szse",
    &MARGIN_SZSE_SCHEMA,
    &[RequestDef::new("stock_margin_szse", &[("date", Param::End)]).direct()],
)
.describe("深圳证券交易所-融资融券数据-融资融券汇总数据")
.with_cadence(Cadence::TradingDays)
.with_end(EndRule::Yesterday)
.with_epoch(Epoch::Date(20130101))
.with_unit_delay(1000);

static MARGIN_DETAIL_SZSE_SCHEMA: TableSchema = TableSchema {
    table: "stock_margin_detail_szse",
    columns: &[
        ColumnDef::range_end("trade_date", ColumnKind::Date),
        ColumnDef::field("code", ColumnKind::Code, &["证券代码"]),
        ColumnDef::field("name", ColumnKind::TextMax(32), &["证券简称"]),
        ColumnDef::field("financing_buy", AMOUNT, &["融资买入额"]),
        ColumnDef::field("financing_balance", AMOUNT, &["融资余额"]),
        ColumnDef::field("securities_sold", AMOUNT, &["融券卖出量"]),
        ColumnDef::field("securities_lent", AMOUNT, &["融券余量"]),
        ColumnDef::field("securities_lent_amount", AMOUNT, &["融券余额"]),
        ColumnDef::field("margin_balance", AMOUNT, &["融资融券余额"]),
    ],
    natural_key: &["trade_date", "code"],
    watermark_column: "trade_date",
    entity_column: None,
};

pub static STOCK_MARGIN_DETAIL_SZSE: FeedDef = FeedDef::new(
    "stock_margin_detail_szse",
    &MARGIN_DETAIL_SZSE_SCHEMA,
    &[RequestDef::new("stock_margin_detail_szse", &[("date", Param::End)]).direct()],
)
.describe("深圳证券交易所-融资融券数据-融资融券交易明细数据")
.with_cadence(Cadence::TradingDays)
.with_end(EndRule::Yesterday)
.with_epoch(Epoch::Date(20140101))
.with_unit_delay(2000);

static HK_SHORT_SALE_SCHEMA: TableSchema = TableSchema {
    table: "stock_hk_short_sale",
    columns: &[
        ColumnDef::field("trade_date", ColumnKind::Date, &["日期"]),
        ColumnDef::field("code", ColumnKind::Text, &["证券代码"]),
        ColumnDef::field("name", ColumnKind::Text, &["证券简称"]),
        ColumnDef::field("short_shares", AMOUNT, &["淡仓股数"]),
        ColumnDef::field("short_amount", AMOUNT, &["淡仓金额"]),
    ],
    natural_key: &["trade_date", "code"],
    watermark_column: "trade_date",
    entity_column: None,
};

/// 홍콩 淡仓 신고 (주 단위 공시, 지난주 금요일까지)
pub static STOCK_HK_SHORT_SALE: FeedDef = FeedDef::new(
    "stock_hk_short_sale",
    &HK_SHORT_SALE_SCHEMA,
    &[RequestDef::new(
        "stock_hk_short_sale",
        &[("start_date", Param::Start), ("end_date", Param::End)],
    )],
)
.describe("香港证监会-淡仓申报")
.with_cadence(Cadence::Windowed {
    days: 70,
    start_offset_days: 7,
    clip_to_trading: false,
})
.with_end(EndRule::PreviousWeekFriday)
.with_epoch(Epoch::Date(20120820));
