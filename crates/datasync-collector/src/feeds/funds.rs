//! 펀드 피드 (보유 종목 명세, ETF 실시간 시세 스냅샷).

use datasync_core::{Cadence, ColumnDef, ColumnKind, EndRule, EntitySet, Epoch, TableSchema};

use crate::engine::{FeedDef, Param, RequestDef};

static PORTFOLIO_HOLD_SCHEMA: TableSchema = TableSchema {
    table: "fund_portfolio_hold_em",
    columns: &[
        ColumnDef::entity("fund_code"),
        ColumnDef::field("stock_code", ColumnKind::Code, &["股票代码"]),
        ColumnDef::field("stock_name", ColumnKind::TextMax(32), &["股票名称"]),
        ColumnDef::field("nav_ratio", ColumnKind::Float(Some(2)), &["占净值比例"]),
        ColumnDef::field("shares", ColumnKind::Float(Some(2)), &["持股数"]),
        ColumnDef::field("market_value", ColumnKind::Float(Some(2)), &["持仓市值"]),
        ColumnDef::quarter_label("report_date", &["季度"]),
    ],
    natural_key: &["fund_code", "stock_code", "report_date"],
    watermark_column: "report_date",
    entity_column: Some("fund_code"),
};

/// 펀드별 연간 보유 종목.
///
/// 연 단위로 받아 해당 연도 행을 교체합니다. 마지막 분기 공시 후
/// 4개월이 지나기 전에는 새 공시가 없으므로 건너뜁니다.
pub static FUND_PORTFOLIO_HOLD_EM: FeedDef = FeedDef::new(
    "fund_portfolio_hold_em",
    &PORTFOLIO_HOLD_SCHEMA,
    &[RequestDef::new(
        "fund_portfolio_hold_em",
        &[("symbol", Param::Entity), ("date", Param::Year)],
    )],
)
.describe("东方财富网-天天基金网-基金数据-基金持仓")
.per_entity(EntitySet::Funds, &[])
.with_cadence(Cadence::Yearly { gate_months: 4 })
.with_epoch(Epoch::Date(20100331))
.with_workers(15)
.proxied();

const QUOTE: ColumnKind = ColumnKind::Float(None);

static ETF_SPOT_SCHEMA: TableSchema = TableSchema {
    table: "fund_etf_spot_em",
    columns: &[
        ColumnDef::field("code", ColumnKind::Code, &["代码"]),
        ColumnDef::field("name", ColumnKind::Text, &["名称"]),
        ColumnDef::field("price", QUOTE, &["最新价"]),
        ColumnDef::field("iopv", QUOTE, &["IOPV实时估值"]),
        ColumnDef::field("discount_rate", QUOTE, &["基金折价率"]),
        ColumnDef::field("change", QUOTE, &["涨跌额"]),
        ColumnDef::field("pct_change", QUOTE, &["涨跌幅"]),
        ColumnDef::field("volume", QUOTE, &["成交量"]),
        ColumnDef::field("amount", QUOTE, &["成交额"]),
        ColumnDef::field("open", QUOTE, &["开盘价"]),
        ColumnDef::field("high", QUOTE, &["最高价"]),
        ColumnDef::field("low", QUOTE, &["最低价"]),
        ColumnDef::field("prev_close", QUOTE, &["昨收"]),
        ColumnDef::field("amplitude", QUOTE, &["振幅"]),
        ColumnDef::field("turnover", QUOTE, &["换手率"]),
        ColumnDef::field("volume_ratio", QUOTE, &["量比"]),
        ColumnDef::field("order_ratio", QUOTE, &["委比"]),
        ColumnDef::field("outer_volume", QUOTE, &["外盘"]),
        ColumnDef::field("inner_volume", QUOTE, &["内盘"]),
        ColumnDef::field("main_net_inflow", QUOTE, &["主力净流入-净额"]),
        ColumnDef::field("main_net_inflow_pct", QUOTE, &["主力净流入-净占比"]),
        ColumnDef::field("xl_net_inflow", QUOTE, &["超大单净流入-净额"]),
        ColumnDef::field("xl_net_inflow_pct", QUOTE, &["超大单净流入-净占比"]),
        ColumnDef::field("l_net_inflow", QUOTE, &["大单净流入-净额"]),
        ColumnDef::field("l_net_inflow_pct", QUOTE, &["大单净流入-净占比"]),
        ColumnDef::field("m_net_inflow", QUOTE, &["中单净流入-净额"]),
        ColumnDef::field("m_net_inflow_pct", QUOTE, &["中单净流入-净占比"]),
        ColumnDef::field("s_net_inflow", QUOTE, &["小单净流入-净额"]),
        ColumnDef::field("s_net_inflow_pct", QUOTE, &["小单净流入-净占比"]),
        ColumnDef::field("shares", QUOTE, &["最新份额"]),
        ColumnDef::field("float_market_cap", QUOTE, &["流通市值"]),
        ColumnDef::field("total_market_cap", QUOTE, &["总市值"]),
        ColumnDef::field("data_date", ColumnKind::Date, &["数据日期"]),
        ColumnDef::field("updated_at", ColumnKind::DateTime, &["更新时间"]),
    ],
    natural_key: &["data_date", "code"],
    watermark_column: "data_date",
    entity_column: None,
};

/// ETF 장 마감 스냅샷 (15:00 이후 하루 한 번)
pub static FUND_ETF_SPOT_EM: FeedDef = FeedDef::new(
    "fund_etf_spot_em",
    &ETF_SPOT_SCHEMA,
    &[RequestDef::new("fund_etf_spot_em", &[])],
)
.describe("东方财富-ETF 实时行情")
.with_end(EndRule::LastTradingDay {
    cutoff: (15, 0),
    strict: false,
})
.with_epoch(Epoch::Date(20260101))
.proxied();

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use datasync_core::{Entity, WorkUnit};

    #[test]
    fn test_holdings_request_uses_year() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let end = NaiveDate::from_ymd_opt(2023, 12, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let fund = Entity::new("000001", "华夏成长混合");
        let req = FUND_PORTFOLIO_HOLD_EM.requests[0].build(&WorkUnit::new(start, end), Some(&fund));
        assert_eq!(req.to_string(), "fund_portfolio_hold_em(symbol=000001, date=2023)");
    }

    #[test]
    fn test_etf_spot_is_daily_snapshot() {
        assert_eq!(FUND_ETF_SPOT_EM.cadence, Cadence::Snapshot);
        assert_eq!(ETF_SPOT_SCHEMA.watermark_kind(), ColumnKind::Date);
        assert!(!FUND_ETF_SPOT_EM.is_per_entity());
    }
}
