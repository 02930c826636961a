//! 실행 단위 참조 데이터 스냅샷.
//!
//! 거래일 캘린더와 종목/보드/펀드 목록을 실행 시작 시 한 번 로드해
//! 각 피드 실행에 읽기 전용으로 전달합니다.

use chrono::NaiveDate;

use crate::calendar;

/// 동기화 엔티티 (종목, 보드, 펀드 등).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub code: String,
    pub name: String,
}

impl Entity {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// 엔티티별 피드가 순회하는 엔티티 집합.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitySet {
    /// 상해/심천/북경 A주 (ST 및 B주 코드 제외)
    AShares,
    /// 홍콩 강구통 구성 종목
    HkConnect,
    /// 개념 보드
    ConceptBoards,
    /// 업종 보드
    IndustryBoards,
    /// 전체 펀드
    Funds,
    /// 고정 목록 (코드, 이름)
    Fixed(&'static [(&'static str, &'static str)]),
}

/// 참조 데이터 스냅샷.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    /// 오름차순 정렬된 거래일
    pub trade_dates: Vec<NaiveDate>,
    pub a_shares: Vec<Entity>,
    pub hk_connect: Vec<Entity>,
    pub concept_boards: Vec<Entity>,
    pub industry_boards: Vec<Entity>,
    pub funds: Vec<Entity>,
}

impl ReferenceData {
    /// 거래일 목록을 정렬·중복 제거해 설정.
    pub fn with_trade_dates(mut self, mut dates: Vec<NaiveDate>) -> Self {
        dates.sort_unstable();
        dates.dedup();
        self.trade_dates = dates;
        self
    }

    pub fn entities(&self, set: EntitySet) -> Vec<Entity> {
        match set {
            EntitySet::AShares => self.a_shares.clone(),
            EntitySet::HkConnect => self.hk_connect.clone(),
            EntitySet::ConceptBoards => self.concept_boards.clone(),
            EntitySet::IndustryBoards => self.industry_boards.clone(),
            EntitySet::Funds => self.funds.clone(),
            EntitySet::Fixed(items) => items
                .iter()
                .map(|(code, name)| Entity::new(*code, *name))
                .collect(),
        }
    }

    pub fn last_trading_day_on_or_before(&self, date: NaiveDate) -> Option<NaiveDate> {
        calendar::last_trading_day_on_or_before(&self.trade_dates, date)
    }

    pub fn trading_days_between(&self, start: NaiveDate, end: NaiveDate) -> &[NaiveDate] {
        calendar::trading_days_between(&self.trade_dates, start, end)
    }
}

/// A주 동기화 대상 여부: ST 종목과 900000~920000 구간(B주) 제외.
pub fn is_tradable_a_share(code: &str, name: &str) -> bool {
    let upper = name.trim_start();
    if upper.starts_with("ST") || upper.starts_with("*ST") {
        return false;
    }
    match code.parse::<u32>() {
        Ok(n) => !(900_000..=920_000).contains(&n),
        Err(_) => true,
    }
}
