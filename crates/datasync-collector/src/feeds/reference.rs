//! 참조 데이터 피드.
//!
//! 주 1회(직전 금요일 기준) 스냅샷으로 갱신되며, 피드 풀 실행 전에
//! 순차 실행됩니다. 결과 테이블은 [`super::reference_tables`]로 다시 읽혀
//! 엔티티별 피드의 대상 목록이 됩니다.

use datasync_core::{Cadence, ColumnDef, ColumnKind, EndRule, EntitySet, Source, TableSchema};

use crate::engine::{Exclusion, FeedDef, Param, RequestDef, WriteMode};

static TRADE_DATE_SCHEMA: TableSchema = TableSchema {
    table: "stock_trade_date",
    columns: &[
        ColumnDef::field("trade_date", ColumnKind::Date, &["trade_date"]),
        ColumnDef::run_date("sync_date"),
    ],
    natural_key: &["trade_date"],
    watermark_column: "sync_date",
    entity_column: None,
};

/// 거래일 캘린더
pub static STOCK_TRADE_DATE: FeedDef = FeedDef::new(
    "stock_trade_date",
    &TRADE_DATE_SCHEMA,
    &[RequestDef::new("tool_trade_date_hist_sina", &[])],
)
.describe("新浪财经-股票交易日历")
.reference()
.with_end(EndRule::LastFriday)
.with_write(WriteMode::ReplaceAll);

/// 거래소별 종목 목록 (코드, 거래소).
const EXCHANGE_BOARDS: &[(&str, &str)] = &[
    ("主板A股", "SSE"),
    ("主板B股", "SSE"),
    ("科创板", "SSE"),
    ("北交所", "BSE"),
    ("港交所", "HKSE"),
    ("A股列表", "SZSE"),
    ("B股列表", "SZSE"),
];

static BASIC_INFO_SCHEMA: TableSchema = TableSchema {
    table: "stock_basic_info",
    columns: &[
        ColumnDef::field("code", ColumnKind::Code, &["证券代码", "A股代码", "B股代码", "代码"]),
        ColumnDef::field("name", ColumnKind::Text, &["证券简称", "A股简称", "B股简称", "中文名称"]),
        ColumnDef::entity_name("exchange"),
        ColumnDef {
            name: "board",
            kind: ColumnKind::Text,
            source: Source::Entity,
        },
        ColumnDef::field("segment", ColumnKind::Text, &["板块"]),
        ColumnDef::field("list_date", ColumnKind::Date, &["上市日期", "A股上市日期", "B股上市日期"]),
        ColumnDef::range_end("data_date", ColumnKind::Date),
    ],
    natural_key: &["board", "code"],
    watermark_column: "data_date",
    entity_column: Some("board"),
};

/// 종목 기본 정보: 코드, 이름, 거래소, 보드.
///
/// 보드마다 API 함수가 다르며, 북경/홍콩/심천 사이트는 프록시를 거부해
/// 항상 직접 연결합니다. 상해 상장폐지 종목은 제외합니다.
pub static STOCK_BASIC_INFO: FeedDef = FeedDef::new(
    "stock_basic_info",
    &BASIC_INFO_SCHEMA,
    &[
        RequestDef::new("stock_info_sh_name_code", &[("symbol", Param::Entity)])
            .for_entities(&["主板A股", "主板B股", "科创板"]),
        RequestDef::new("stock_info_bj_name_code", &[])
            .for_entities(&["北交所"])
            .direct(),
        RequestDef::new("stock_hk_spot", &[])
            .for_entities(&["港交所"])
            .direct(),
        RequestDef::new("stock_info_sz_name_code", &[("symbol", Param::Entity)])
            .for_entities(&["A股列表", "B股列表"])
            .direct(),
    ],
)
.describe("沪深京港股票基本信息")
.reference()
.per_entity(EntitySet::Fixed(EXCHANGE_BOARDS), &[])
.with_end(EndRule::LastFriday)
.with_write(WriteMode::ReplaceEntity)
.with_exclusion(Exclusion {
    request: RequestDef::new("stock_info_sh_delist", &[("symbol", Param::Const("全部"))]),
    field: &["公司代码"],
    column: "code",
})
.with_workers(1);

static HK_GGT_SCHEMA: TableSchema = TableSchema {
    table: "stock_hk_ggt_components_em",
    columns: &[
        // 홍콩 코드는 5자리이므로 0 채움 없이 저장
        ColumnDef::field("code", ColumnKind::Text, &["代码"]),
        ColumnDef::field("name", ColumnKind::Text, &["名称"]),
        ColumnDef::range_end("data_date", ColumnKind::Date),
    ],
    natural_key: &["code"],
    watermark_column: "data_date",
    entity_column: None,
};

pub static STOCK_HK_GGT_COMPONENTS_EM: FeedDef = FeedDef::new(
    "stock_hk_ggt_components_em",
    &HK_GGT_SCHEMA,
    &[RequestDef::new("stock_hk_ggt_components_em", &[])],
)
.describe("东方财富网-行情中心-港股市场-港股通成份股")
.reference()
.with_end(EndRule::LastFriday)
.with_write(WriteMode::ReplaceAll);

const BOARD_NAME_COLUMNS: &[ColumnDef] = &[
    ColumnDef::field("board_code", ColumnKind::Text, &["板块代码"]),
    ColumnDef::field("board_name", ColumnKind::Text, &["板块名称"]),
    ColumnDef::range_end("data_date", ColumnKind::Date),
];

const fn board_name_schema(table: &'static str) -> TableSchema {
    TableSchema {
        table,
        columns: BOARD_NAME_COLUMNS,
        natural_key: &["board_code"],
        watermark_column: "data_date",
        entity_column: None,
    }
}

static CONCEPT_NAME_SCHEMA: TableSchema = board_name_schema("stock_board_concept_name_em");
static INDUSTRY_NAME_SCHEMA: TableSchema = board_name_schema("stock_board_industry_name_em");

pub static STOCK_BOARD_CONCEPT_NAME_EM: FeedDef = FeedDef::new(
    "stock_board_concept_name_em",
    &CONCEPT_NAME_SCHEMA,
    &[RequestDef::new("stock_board_concept_name_em", &[])],
)
.describe("东方财富网-行情中心-沪深京板块-概念板块")
.reference()
.with_end(EndRule::LastFriday)
.with_write(WriteMode::ReplaceAll);

pub static STOCK_BOARD_INDUSTRY_NAME_EM: FeedDef = FeedDef::new(
    "stock_board_industry_name_em",
    &INDUSTRY_NAME_SCHEMA,
    &[RequestDef::new("stock_board_industry_name_em", &[])],
)
.describe("东方财富网-行情中心-沪深京板块-行业板块")
.reference()
.with_end(EndRule::LastFriday)
.with_write(WriteMode::ReplaceAll);

static FUND_NAME_SCHEMA: TableSchema = TableSchema {
    table: "fund_name_em",
    columns: &[
        ColumnDef::field("fund_code", ColumnKind::Code, &["基金代码"]),
        ColumnDef::field("pinyin_abbr", ColumnKind::Text, &["拼音缩写"]),
        ColumnDef::field("fund_name", ColumnKind::Text, &["基金简称"]),
        ColumnDef::field("fund_type", ColumnKind::Text, &["基金类型"]),
        ColumnDef::field("pinyin_full", ColumnKind::Text, &["拼音全称"]),
        ColumnDef::run_date("import_date"),
    ],
    natural_key: &["fund_code"],
    watermark_column: "import_date",
    entity_column: None,
};

/// 전체 펀드 목록 (기존 펀드는 이름/유형 갱신).
pub static FUND_NAME_EM: FeedDef = FeedDef::new(
    "fund_name_em",
    &FUND_NAME_SCHEMA,
    &[RequestDef::new("fund_name_em", &[])],
)
.describe("东方财富网-天天基金网-基金数据-所有基金的基本信息数据")
.reference()
.with_end(EndRule::LastFriday)
.with_write(WriteMode::Merge);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use datasync_core::{Entity, WorkUnit};

    fn unit() -> WorkUnit {
        let day = NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        WorkUnit::new(day, day)
    }

    #[test]
    fn test_basic_info_picks_one_request_per_board() {
        let unit = unit();
        for (code, exchange) in EXCHANGE_BOARDS {
            let board = Entity::new(*code, *exchange);
            let applicable: Vec<_> = STOCK_BASIC_INFO
                .requests
                .iter()
                .filter(|r| r.applies_to(&unit, Some(&board)))
                .collect();
            assert_eq!(applicable.len(), 1, "{}", code);
        }
    }

    #[test]
    fn test_basic_info_board_keeps_raw_text() {
        // 보드 이름은 코드 컬럼이 아니므로 0 채움 대상이 아님
        let board = BASIC_INFO_SCHEMA.column("board").unwrap();
        assert_eq!(board.kind, ColumnKind::Text);
        assert_eq!(BASIC_INFO_SCHEMA.entity_column, Some("board"));
    }

    #[test]
    fn test_reference_feeds_are_weekly_snapshots() {
        for feed in [
            &STOCK_TRADE_DATE,
            &STOCK_BASIC_INFO,
            &STOCK_HK_GGT_COMPONENTS_EM,
            &STOCK_BOARD_CONCEPT_NAME_EM,
            &STOCK_BOARD_INDUSTRY_NAME_EM,
            &FUND_NAME_EM,
        ] {
            assert_eq!(feed.cadence, Cadence::Snapshot);
            assert_eq!(feed.end, EndRule::LastFriday);
        }
    }
}
