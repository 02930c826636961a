//! 분기 재무 데이터 피드 (재무제표, 실적 보고/속보/예고, 공시 예정일).
//!
//! 분기말마다 시장 전체를 한 번에 받으며, 이미 받은 분기 중 최근
//! `revisit`개를 다시 받아 늦게 올라온 공시를 반영합니다.

use datasync_core::{Cadence, ColumnDef, ColumnKind, Epoch, TableSchema};

use crate::engine::{FeedDef, Param, RequestDef, RetryPreset};

const AMOUNT: ColumnKind = ColumnKind::Float(Some(2));

/// 분기 재무 피드 공통 설정.
const fn quarterly_feed(
    module: &'static str,
    schema: &'static TableSchema,
    requests: &'static [RequestDef],
    revisit: i32,
    epoch: u32,
) -> FeedDef {
    FeedDef::new(module, schema, requests)
        .with_cadence(Cadence::Quarterly { revisit })
        .with_epoch(Epoch::Date(epoch))
        .with_retry(RetryPreset::Fundamentals)
        .proxied()
}

// ---- 재무제표 ----

static ZCFZ_SCHEMA: TableSchema = TableSchema {
    table: "stock_zcfz_em",
    columns: &[
        ColumnDef::range_end("report_date", ColumnKind::Date),
        ColumnDef::field("code", ColumnKind::Code, &["股票代码"]),
        ColumnDef::field("name", ColumnKind::Text, &["股票简称"]),
        ColumnDef::tag("exchange"),
        ColumnDef::field("cash", AMOUNT, &["资产-货币资金"]),
        ColumnDef::field("accounts_receivable", AMOUNT, &["资产-应收账款"]),
        ColumnDef::field("inventory", AMOUNT, &["资产-存货"]),
        ColumnDef::field("total_assets", AMOUNT, &["资产-总资产"]),
        ColumnDef::field("total_assets_yoy", AMOUNT, &["资产-总资产同比"]),
        ColumnDef::field("accounts_payable", AMOUNT, &["负债-应付账款"]),
        ColumnDef::field("total_liabilities", AMOUNT, &["负债-总负债"]),
        ColumnDef::field("advance_receipts", AMOUNT, &["负债-预收账款"]),
        ColumnDef::field("total_liabilities_yoy", AMOUNT, &["负债-总负债同比"]),
        ColumnDef::field("debt_ratio", AMOUNT, &["资产负债率"]),
        ColumnDef::field("total_equity", AMOUNT, &["股东权益合计"]),
        ColumnDef::field("notice_date", ColumnKind::Date, &["公告日期"]),
    ],
    natural_key: &["report_date", "code"],
    watermark_column: "report_date",
    entity_column: None,
};

/// 자산부채표 (상해/심천 + 북경)
pub static STOCK_ZCFZ_EM: FeedDef = quarterly_feed(
    "stock_zcfz_em",
    &ZCFZ_SCHEMA,
    &[
        RequestDef::new("stock_zcfz_em", &[("date", Param::End)]).tagged(&[("exchange", "SHSZ")]),
        // 북경 거래소 요청은 피드 프리셋 대신 기본 재시도(10회)
        RequestDef::new("stock_zcfz_bj_em", &[("date", Param::End)])
            .tagged(&[("exchange", "BJ")])
            .with_retry(RetryPreset::Standard),
    ],
    1,
    20130630,
)
.describe("东方财富-数据中心-年报季报-资产负债表");

static LRB_SCHEMA: TableSchema = TableSchema {
    table: "stock_lrb_em",
    columns: &[
        ColumnDef::range_end("report_date", ColumnKind::Date),
        ColumnDef::field("code", ColumnKind::Code, &["股票代码"]),
        ColumnDef::field("name", ColumnKind::Text, &["股票简称"]),
        ColumnDef::field("net_profit", AMOUNT, &["净利润"]),
        ColumnDef::field("net_profit_yoy", AMOUNT, &["净利润同比"]),
        ColumnDef::field("total_revenue", AMOUNT, &["营业总收入"]),
        ColumnDef::field("total_revenue_yoy", AMOUNT, &["营业总收入同比"]),
        ColumnDef::field("operating_expense", AMOUNT, &["营业总支出-营业支出"]),
        ColumnDef::field("selling_expense", AMOUNT, &["营业总支出-销售费用"]),
        ColumnDef::field("admin_expense", AMOUNT, &["营业总支出-管理费用"]),
        ColumnDef::field("finance_expense", AMOUNT, &["营业总支出-财务费用"]),
        ColumnDef::field("total_expense", AMOUNT, &["营业总支出-营业总支出"]),
        ColumnDef::field("operating_profit", AMOUNT, &["营业利润"]),
        ColumnDef::field("total_profit", AMOUNT, &["利润总额"]),
        ColumnDef::field("notice_date", ColumnKind::Date, &["公告日期"]),
    ],
    natural_key: &["report_date", "code"],
    watermark_column: "report_date",
    entity_column: None,
};

/// 손익계산서
pub static STOCK_LRB_EM: FeedDef = quarterly_feed(
    "stock_lrb_em",
    &LRB_SCHEMA,
    &[RequestDef::new("stock_lrb_em", &[("date", Param::End)])],
    2,
    20120630,
)
.describe("东方财富-数据中心-年报季报-利润表");

static XJLL_SCHEMA: TableSchema = TableSchema {
    table: "stock_xjll_em",
    columns: &[
        ColumnDef::range_end("report_date", ColumnKind::Date),
        ColumnDef::field("code", ColumnKind::Code, &["股票代码"]),
        ColumnDef::field("name", ColumnKind::Text, &["股票简称"]),
        ColumnDef::field("net_cash_flow", AMOUNT, &["净现金流-净现金流"]),
        ColumnDef::field("net_cash_flow_yoy", AMOUNT, &["净现金流-同比增长"]),
        ColumnDef::field("operating_cash_flow", AMOUNT, &["经营性现金流-现金流量净额"]),
        ColumnDef::field("operating_cash_flow_ratio", AMOUNT, &["经营性现金流-净现金流占比"]),
        ColumnDef::field("investing_cash_flow", AMOUNT, &["投资性现金流-现金流量净额"]),
        ColumnDef::field("investing_cash_flow_ratio", AMOUNT, &["投资性现金流-净现金流占比"]),
        ColumnDef::field("financing_cash_flow", AMOUNT, &["融资性现金流-现金流量净额"]),
        ColumnDef::field("financing_cash_flow_ratio", AMOUNT, &["融资性现金流-净现金流占比"]),
        ColumnDef::field("notice_date", ColumnKind::Date, &["公告日期"]),
    ],
    natural_key: &["report_date", "code"],
    watermark_column: "report_date",
    entity_column: None,
};

/// 현금흐름표
pub static STOCK_XJLL_EM: FeedDef = quarterly_feed(
    "stock_xjll_em",
    &XJLL_SCHEMA,
    &[RequestDef::new("stock_xjll_em", &[("date", Param::End)])],
    2,
    20120630,
)
.describe("东方财富-数据中心-年报季报-现金流量表");

// ---- 실적 ----

static YJBB_SCHEMA: TableSchema = TableSchema {
    table: "stock_yjbb_em",
    columns: &[
        ColumnDef::range_end("report_date", ColumnKind::Date),
        ColumnDef::field("code", ColumnKind::Code, &["股票代码"]),
        ColumnDef::field("name", ColumnKind::Text, &["股票简称"]),
        ColumnDef::field("eps", AMOUNT, &["每股收益"]),
        ColumnDef::field("revenue", AMOUNT, &["营业总收入-营业总收入"]),
        ColumnDef::field("revenue_yoy", AMOUNT, &["营业总收入-同比增长"]),
        ColumnDef::field("revenue_qoq", AMOUNT, &["营业总收入-季度环比增长"]),
        ColumnDef::field("net_profit", AMOUNT, &["净利润-净利润"]),
        ColumnDef::field("net_profit_yoy", AMOUNT, &["净利润-同比增长"]),
        ColumnDef::field("net_profit_qoq", AMOUNT, &["净利润-季度环比增长"]),
        ColumnDef::field("bvps", AMOUNT, &["每股净资产"]),
        ColumnDef::field("roe", AMOUNT, &["净资产收益率"]),
        ColumnDef::field("ocf_per_share", AMOUNT, &["每股经营现金流量"]),
        ColumnDef::field("gross_margin", AMOUNT, &["销售毛利率"]),
        ColumnDef::field("industry", ColumnKind::Text, &["所处行业"]),
        ColumnDef::field("notice_date", ColumnKind::Date, &["最新公告日期"]),
    ],
    natural_key: &["report_date", "code"],
    watermark_column: "report_date",
    entity_column: None,
};

/// 실적 보고
pub static STOCK_YJBB_EM: FeedDef = quarterly_feed(
    "stock_yjbb_em",
    &YJBB_SCHEMA,
    &[RequestDef::new("stock_yjbb_em", &[("date", Param::End)])],
    2,
    20150630,
)
.describe("东方财富-数据中心-年报季报-业绩报表");

static YJKB_SCHEMA: TableSchema = TableSchema {
    table: "stock_yjkb_em",
    columns: &[
        ColumnDef::range_end("report_date", ColumnKind::Date),
        ColumnDef::field("code", ColumnKind::Code, &["股票代码"]),
        ColumnDef::field("name", ColumnKind::Text, &["股票简称"]),
        ColumnDef::field("eps", AMOUNT, &["每股收益"]),
        ColumnDef::field("revenue", AMOUNT, &["营业收入-营业收入"]),
        ColumnDef::field("revenue_last_year", AMOUNT, &["营业收入-去年同期"]),
        ColumnDef::field("revenue_yoy", AMOUNT, &["营业收入-同比增长"]),
        ColumnDef::field("revenue_qoq", AMOUNT, &["营业收入-季度环比增长"]),
        ColumnDef::field("net_profit", AMOUNT, &["净利润-净利润"]),
        ColumnDef::field("net_profit_last_year", AMOUNT, &["净利润-去年同期"]),
        ColumnDef::field("net_profit_yoy", AMOUNT, &["净利润-同比增长"]),
        ColumnDef::field("net_profit_qoq", AMOUNT, &["净利润-季度环比增长"]),
        ColumnDef::field("bvps", AMOUNT, &["每股净资产"]),
        ColumnDef::field("roe", AMOUNT, &["净资产收益率"]),
        ColumnDef::field("industry", ColumnKind::Text, &["所处行业"]),
        ColumnDef::field("notice_date", ColumnKind::Date, &["公告日期"]),
    ],
    natural_key: &["report_date", "code"],
    watermark_column: "report_date",
    entity_column: None,
};

/// 실적 속보
pub static STOCK_YJKB_EM: FeedDef = quarterly_feed(
    "stock_yjkb_em",
    &YJKB_SCHEMA,
    &[RequestDef::new("stock_yjkb_em", &[("date", Param::End)])],
    2,
    20100630,
)
.describe("东方财富-数据中心-年报季报-业绩快报");

static YJYG_SCHEMA: TableSchema = TableSchema {
    table: "stock_yjyg_em",
    columns: &[
        ColumnDef::range_end("report_date", ColumnKind::Date),
        ColumnDef::field("code", ColumnKind::Code, &["股票代码"]),
        ColumnDef::field("name", ColumnKind::Text, &["股票简称"]),
        ColumnDef::field("indicator", ColumnKind::Text, &["预测指标"]),
        ColumnDef::field("change_summary", ColumnKind::Text, &["业绩变动"]),
        ColumnDef::field("forecast_value", AMOUNT, &["预测数值"]),
        ColumnDef::field("change_pct", AMOUNT, &["业绩变动幅度"]),
        ColumnDef::field("change_reason", ColumnKind::Text, &["业绩变动原因"]),
        ColumnDef::field("forecast_type", ColumnKind::Text, &["预告类型"]),
        ColumnDef::field("last_year_value", AMOUNT, &["上年同期值"]),
        ColumnDef::field("notice_date", ColumnKind::Date, &["公告日期"]),
    ],
    natural_key: &["report_date", "code", "indicator"],
    watermark_column: "report_date",
    entity_column: None,
};

/// 실적 예고
pub static STOCK_YJYG_EM: FeedDef = quarterly_feed(
    "stock_yjyg_em",
    &YJYG_SCHEMA,
    &[RequestDef::new("stock_yjyg_em", &[("date", Param::End)])],
    2,
    20100630,
)
.describe("东方财富-数据中心-年报季报-业绩预告");

// ---- 공시 예정일 ----

static YYSJ_SCHEMA: TableSchema = TableSchema {
    table: "stock_yysj_em",
    columns: &[
        ColumnDef::range_end("report_date", ColumnKind::Date),
        ColumnDef::field("code", ColumnKind::Code, &["股票代码"]),
        ColumnDef::field("name", ColumnKind::Text, &["股票简称"]),
        ColumnDef::field("first_scheduled", ColumnKind::Date, &["首次预约时间"]),
        ColumnDef::field("first_change", ColumnKind::Date, &["一次变更日期"]),
        ColumnDef::field("second_change", ColumnKind::Date, &["二次变更日期"]),
        ColumnDef::field("third_change", ColumnKind::Date, &["三次变更日期"]),
        ColumnDef::field("actual_disclosure", ColumnKind::Date, &["实际披露时间"]),
    ],
    natural_key: &["report_date", "code"],
    watermark_column: "report_date",
    entity_column: None,
};

/// 과학혁신판/북경 시장은 2020년 1분기부터 제공
const STAR_MARKET_SINCE: u32 = 20200331;

/// 공시 예정일 (시장별 요청을 합침)
pub static STOCK_YYSJ_EM: FeedDef = quarterly_feed(
    "stock_yysj_em",
    &YYSJ_SCHEMA,
    &[
        RequestDef::new("stock_yysj_em", &[("symbol", Param::Const("沪市A股")), ("date", Param::End)]),
        RequestDef::new("stock_yysj_em", &[("symbol", Param::Const("科创板")), ("date", Param::End)])
            .since(STAR_MARKET_SINCE),
        RequestDef::new("stock_yysj_em", &[("symbol", Param::Const("深市A股")), ("date", Param::End)]),
        RequestDef::new("stock_yysj_em", &[("symbol", Param::Const("创业板")), ("date", Param::End)]),
        RequestDef::new("stock_yysj_em", &[("symbol", Param::Const("京市A股")), ("date", Param::End)])
            .since(STAR_MARKET_SINCE),
    ],
    2,
    20120630,
)
.describe("东方财富-数据中心-年报季报-预约披露时间");
