//! 피드 카탈로그.
//!
//! 도메인별로 피드 정의를 모아 둡니다.
//!
//! - [`reference`]: 거래일, 종목/보드/펀드 목록 (참조 단계)
//! - [`prices`]: A주/보드 일·주·월·30분봉
//! - [`fundamentals`]: 재무제표, 실적 공시
//! - [`margin`]: 신용거래, 홍콩 공매도
//! - [`funds`]: 펀드 보유 종목, ETF 시세

pub mod fundamentals;
pub mod funds;
pub mod margin;
pub mod prices;
pub mod reference;

use datasync_data::{EntityQuery, ReferenceTables};

use crate::engine::FeedDef;
use crate::error::{CollectorError, Result};

/// 전체 피드 (실행 순서).
///
/// 참조 단계 피드는 이 순서대로 하나씩 실행되고,
/// 나머지는 피드 풀에서 병렬로 실행됩니다.
pub static CATALOG: &[&FeedDef] = &[
    &reference::STOCK_TRADE_DATE,
    &reference::STOCK_BASIC_INFO,
    &reference::STOCK_HK_GGT_COMPONENTS_EM,
    &reference::STOCK_BOARD_CONCEPT_NAME_EM,
    &reference::STOCK_BOARD_INDUSTRY_NAME_EM,
    &reference::FUND_NAME_EM,
    &margin::STOCK_HK_SHORT_SALE,
    &prices::STOCK_BOARD_CONCEPT_HIST_EM,
    &prices::STOCK_BOARD_INDUSTRY_HIST_EM,
    &fundamentals::STOCK_YJBB_EM,
    &fundamentals::STOCK_YJKB_EM,
    &fundamentals::STOCK_YJYG_EM,
    &fundamentals::STOCK_YYSJ_EM,
    &fundamentals::STOCK_ZCFZ_EM,
    &fundamentals::STOCK_LRB_EM,
    &fundamentals::STOCK_XJLL_EM,
    &prices::STOCK_ZH_A_HIST_30MIN_QFQ,
    &prices::STOCK_ZH_A_HIST_30MIN_HFQ,
    &prices::STOCK_ZH_A_HIST_DAILY_BFQ,
    &prices::STOCK_ZH_A_HIST_DAILY_QFQ,
    &prices::STOCK_ZH_A_HIST_DAILY_HFQ,
    &prices::STOCK_ZH_A_HIST_WEEKLY_QFQ,
    &prices::STOCK_ZH_A_HIST_WEEKLY_HFQ,
    &prices::STOCK_ZH_A_HIST_MONTHLY_QFQ,
    &prices::STOCK_ZH_A_HIST_MONTHLY_HFQ,
    &funds::FUND_PORTFOLIO_HOLD_EM,
    &funds::FUND_ETF_SPOT_EM,
    &margin::STOCK_MARGIN_SSE,
    &margin::STOCK_MARGIN_DETAIL_SSE,
    &margin::STOCK_MARGIN_SZSE,
    &margin::STOCK_MARGIN_DETAIL_SZSE,
];

/// 테이블 이름으로 피드 조회.
pub fn find(name: &str) -> Result<&'static FeedDef> {
    CATALOG
        .iter()
        .copied()
        .find(|feed| feed.table() == name)
        .ok_or_else(|| CollectorError::UnknownFeed(name.to_string()))
}

/// 참조 단계 피드가 채우는 테이블에서 참조 데이터를 읽는 구성.
pub fn reference_tables() -> ReferenceTables {
    ReferenceTables {
        trade_dates: (reference::STOCK_TRADE_DATE.table(), "trade_date"),
        a_shares: EntityQuery::new(reference::STOCK_BASIC_INFO.table(), "code", "name")
            .filtered("exchange", &["SSE", "SZSE", "BSE"]),
        hk_connect: EntityQuery::new(reference::STOCK_HK_GGT_COMPONENTS_EM.table(), "code", "name"),
        concept_boards: EntityQuery::new(
            reference::STOCK_BOARD_CONCEPT_NAME_EM.table(),
            "board_code",
            "board_name",
        ),
        industry_boards: EntityQuery::new(
            reference::STOCK_BOARD_INDUSTRY_NAME_EM.table(),
            "board_code",
            "board_name",
        ),
        funds: EntityQuery::new(reference::FUND_NAME_EM.table(), "fund_code", "fund_name"),
    }
}
