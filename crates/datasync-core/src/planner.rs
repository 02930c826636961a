//! 워터마크 기반 수집 구간 계획.
//!
//! 피드마다 워터마크(마지막 동기화 시각)와 종료 기준으로부터
//! 수집할 구간 목록을 만듭니다. 구간은 오름차순이며 서로 겹치지 않고,
//! 시작이 종료보다 늦으면 빈 목록을 반환합니다.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::calendar;
use crate::error::{CoreError, Result};
use crate::reference::ReferenceData;
use crate::value::{parse_yyyymmdd, yyyymmdd};

/// 워터마크가 없을 때 사용하는 시작점.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Epoch {
    /// 고정 날짜 (`YYYYMMDD`)
    Date(u32),
    /// 실행 시각 기준 N일 전
    DaysAgo(i64),
}

impl Epoch {
    pub fn resolve(&self, now: NaiveDateTime) -> Result<NaiveDateTime> {
        match *self {
            Epoch::Date(n) => parse_yyyymmdd(n)
                .map(|d| d.and_time(NaiveTime::MIN))
                .ok_or(CoreError::InvalidEpoch(n)),
            Epoch::DaysAgo(days) => {
                Ok((now.date() - Duration::days(days)).and_time(NaiveTime::MIN))
            }
        }
    }
}

/// 수집 종료 시점 규칙.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndRule {
    Today,
    Yesterday,
    /// 장 마감 `cutoff`(시, 분) 이후면 오늘, 아니면 어제까지의 마지막 거래일.
    /// `strict`면 기준일 자체는 제외합니다.
    LastTradingDay { cutoff: (u32, u32), strict: bool },
    /// 직전 금요일 (토요일 16:30 이후면 이번 주 금요일)
    LastFriday,
    /// 지난주 금요일
    PreviousWeekFriday,
    /// 전월 말일
    PreviousMonthEnd,
    /// 30분봉 종료 시각
    IntradayBar,
}

const MARKET_OPEN: (u32, u32) = (9, 30);
const MARKET_CLOSE: (u32, u32) = (15, 0);
/// 일봉 데이터 확정 시각
pub const SETTLE_CUTOFF: (u32, u32) = (16, 30);

fn hm(t: (u32, u32)) -> NaiveTime {
    NaiveTime::from_hms_opt(t.0, t.1, 0).unwrap_or(NaiveTime::MIN)
}

impl EndRule {
    /// 16:30 마감 기준 마지막 거래일.
    pub const fn last_trading_day() -> Self {
        EndRule::LastTradingDay {
            cutoff: SETTLE_CUTOFF,
            strict: false,
        }
    }

    pub fn resolve(&self, now: NaiveDateTime, reference: &ReferenceData) -> Result<NaiveDateTime> {
        let today = now.date();
        let midnight = |d: NaiveDate| d.and_time(NaiveTime::MIN);
        let trading_day_until = |date: NaiveDate| {
            reference
                .last_trading_day_on_or_before(date)
                .ok_or(CoreError::NoTradingDay(date))
        };

        match *self {
            EndRule::Today => Ok(midnight(today)),
            EndRule::Yesterday => Ok(midnight(today - Duration::days(1))),
            EndRule::LastTradingDay { cutoff, strict } => {
                let base = if now.time() > hm(cutoff) {
                    today
                } else {
                    today - Duration::days(1)
                };
                let limit = if strict { base - Duration::days(1) } else { base };
                trading_day_until(limit).map(midnight)
            }
            EndRule::LastFriday => Ok(midnight(calendar::last_friday(now, hm(SETTLE_CUTOFF)))),
            EndRule::PreviousWeekFriday => Ok(midnight(calendar::previous_week_friday(today))),
            EndRule::PreviousMonthEnd => Ok(midnight(calendar::previous_month_end(today))),
            EndRule::IntradayBar => {
                let close = hm(MARKET_CLOSE);
                if now.time() > hm(SETTLE_CUTOFF) {
                    trading_day_until(today).map(|d| d.and_time(close))
                } else if now.time() < hm(MARKET_OPEN) {
                    trading_day_until(today - Duration::days(1)).map(|d| d.and_time(close))
                } else {
                    let minute = if now.minute() > 30 { 30 } else { 0 };
                    let bar = NaiveTime::from_hms_opt(now.hour(), minute, 0).unwrap_or(close);
                    Ok(today.and_time(bar))
                }
            }
        }
    }
}

/// 구간 분할 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// 워터마크 다음 날부터 종료일까지 한 구간.
    /// `inclusive`면 워터마크 날짜를 다시 포함합니다 (수정주가 비교용).
    Daily { inclusive: bool },
    /// 고정 폭 구간. 거래일 클리핑 시 거래일이 없는 구간은 건너뜁니다.
    Windowed {
        days: i64,
        start_offset_days: i64,
        clip_to_trading: bool,
    },
    /// 거래일 하나씩
    TradingDays,
    /// 분기말 하나씩. 이미 동기화한 분기를 `revisit`개 다시 수집합니다.
    Quarterly { revisit: i32 },
    /// 연 단위. 워터마크 + `gate_months` 이전에는 수집하지 않습니다.
    Yearly { gate_months: u32 },
    /// 종료일 스냅샷 한 번
    Snapshot,
    /// 워터마크 시각부터 종료 시각까지 (경계 봉 포함)
    Intraday,
}

/// 한 번의 수집 단위.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkUnit {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// 수집 결과가 비었을 때 기록할 워터마크
    pub on_empty: Option<NaiveDateTime>,
}

impl WorkUnit {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start,
            end,
            on_empty: None,
        }
    }

    fn days(start: NaiveDate, end: NaiveDate) -> Self {
        Self::new(start.and_time(NaiveTime::MIN), end.and_time(NaiveTime::MIN))
    }
}

/// 수집 구간 계획.
///
/// # Arguments
/// * `watermark` - 마지막 동기화 시각 (없으면 epoch)
/// * `end` - 종료 규칙으로 계산한 종료 시각
/// * `now` - 실행 시각
/// * `trade_dates` - 오름차순 거래일 목록
pub fn plan(
    cadence: Cadence,
    watermark: NaiveDateTime,
    end: NaiveDateTime,
    now: NaiveDateTime,
    trade_dates: &[NaiveDate],
) -> Vec<WorkUnit> {
    let wm = watermark.date();
    let end_date = end.date();
    let today = now.date();

    match cadence {
        Cadence::Daily { inclusive } => {
            if inclusive {
                if wm < end_date {
                    return vec![WorkUnit::new(wm.and_time(NaiveTime::MIN), end)];
                }
                return Vec::new();
            }
            let start = wm + Duration::days(1);
            if start <= end_date {
                vec![WorkUnit::new(start.and_time(NaiveTime::MIN), end)]
            } else {
                Vec::new()
            }
        }
        Cadence::Windowed {
            days,
            start_offset_days,
            clip_to_trading,
        } => {
            let start = wm + Duration::days(start_offset_days);
            calendar::split_windows(start, end_date, days)
                .into_iter()
                .filter_map(|(lo, hi)| {
                    if !clip_to_trading {
                        return Some(WorkUnit::days(lo, hi));
                    }
                    let days = calendar::trading_days_between(trade_dates, lo, hi);
                    match (days.first(), days.last()) {
                        (Some(&first), Some(&last)) => Some(WorkUnit::days(first, last)),
                        _ => None,
                    }
                })
                .collect()
        }
        Cadence::TradingDays => {
            calendar::trading_days_between(trade_dates, wm + Duration::days(1), end_date)
                .iter()
                .map(|&d| WorkUnit::days(d, d))
                .collect()
        }
        Cadence::Quarterly { revisit } => {
            let month_key = |d: NaiveDate| d.year() * 100 + d.month() as i32;
            let mut quarter = calendar::shift_quarter_end(wm, 1 - revisit);
            let mut units = Vec::new();
            while month_key(quarter) < month_key(today) {
                units.push(WorkUnit::days(quarter, quarter));
                quarter = calendar::shift_quarter_end(quarter, 1);
            }
            units
        }
        Cadence::Yearly { gate_months } => {
            if today < calendar::add_months(wm, gate_months) {
                return Vec::new();
            }
            let start_year = if (wm.month(), wm.day()) == (12, 31) {
                wm.year() + 1
            } else {
                wm.year()
            };
            let end_year = if yyyymmdd(today) % 10_000 < 131 {
                today.year() - 1
            } else {
                today.year()
            };
            (start_year..=end_year)
                .filter_map(|year| {
                    let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
                    let last = NaiveDate::from_ymd_opt(year, 12, 31)?;
                    let prev_end = NaiveDate::from_ymd_opt(year - 1, 12, 31)?;
                    let mut unit = WorkUnit::days(first, last);
                    unit.on_empty = Some(prev_end.and_time(NaiveTime::MIN));
                    Some(unit)
                })
                .collect()
        }
        Cadence::Snapshot => {
            if wm < end_date {
                vec![WorkUnit::days(end_date, end_date)]
            } else {
                Vec::new()
            }
        }
        Cadence::Intraday => {
            if watermark < end {
                vec![WorkUnit::new(watermark, end)]
            } else {
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        date.and_hms_opt(h, m, 0).unwrap()
    }

    fn midnight(date: NaiveDate) -> NaiveDateTime {
        date.and_time(NaiveTime::MIN)
    }

    fn reference() -> ReferenceData {
        ReferenceData::default().with_trade_dates(vec![
            d(2024, 1, 2),
            d(2024, 1, 3),
            d(2024, 1, 4),
            d(2024, 1, 5),
            d(2024, 1, 8),
            d(2024, 1, 9),
        ])
    }

    #[test]
    fn test_epoch_resolve() {
        let now = at(d(2024, 3, 1), 10, 0);
        assert_eq!(Epoch::Date(20130630).resolve(now).unwrap(), midnight(d(2013, 6, 30)));
        assert_eq!(Epoch::DaysAgo(50).resolve(now).unwrap(), midnight(d(2024, 1, 11)));
        assert!(matches!(
            Epoch::Date(20131340).resolve(now),
            Err(CoreError::InvalidEpoch(20131340))
        ));
    }

    #[test]
    fn test_last_trading_day_respects_cutoff() {
        let reference = reference();
        let rule = EndRule::last_trading_day();
        // 2024-01-08 월요일 16:00 → 마감 전이므로 전 거래일
        assert_eq!(
            rule.resolve(at(d(2024, 1, 8), 16, 0), &reference).unwrap(),
            midnight(d(2024, 1, 5))
        );
        assert_eq!(
            rule.resolve(at(d(2024, 1, 8), 17, 0), &reference).unwrap(),
            midnight(d(2024, 1, 8))
        );

        let strict = EndRule::LastTradingDay {
            cutoff: (15, 30),
            strict: true,
        };
        assert_eq!(
            strict.resolve(at(d(2024, 1, 8), 17, 0), &reference).unwrap(),
            midnight(d(2024, 1, 5))
        );
    }

    #[test]
    fn test_no_trading_day_is_an_error() {
        let reference = ReferenceData::default();
        assert!(matches!(
            EndRule::last_trading_day().resolve(at(d(2024, 1, 8), 17, 0), &reference),
            Err(CoreError::NoTradingDay(_))
        ));
    }

    #[test]
    fn test_intraday_bar_end() {
        let reference = reference();
        let rule = EndRule::IntradayBar;
        assert_eq!(
            rule.resolve(at(d(2024, 1, 9), 10, 45), &reference).unwrap(),
            at(d(2024, 1, 9), 10, 30)
        );
        assert_eq!(
            rule.resolve(at(d(2024, 1, 9), 11, 10), &reference).unwrap(),
            at(d(2024, 1, 9), 11, 0)
        );
        assert_eq!(
            rule.resolve(at(d(2024, 1, 9), 18, 0), &reference).unwrap(),
            at(d(2024, 1, 9), 15, 0)
        );
        // 월요일 개장 전 → 직전 금요일 15:00
        assert_eq!(
            rule.resolve(at(d(2024, 1, 8), 8, 0), &reference).unwrap(),
            at(d(2024, 1, 5), 15, 0)
        );
    }

    #[test]
    fn test_quarterly_no_new_quarter() {
        let units = plan(
            Cadence::Quarterly { revisit: 0 },
            midnight(d(2023, 12, 31)),
            midnight(d(2024, 1, 10)),
            at(d(2024, 1, 10), 10, 0),
            &[],
        );
        assert!(units.is_empty());
    }

    #[test]
    fn test_quarterly_revisit() {
        let now = at(d(2024, 8, 15), 10, 0);
        let quarters = |revisit| -> Vec<NaiveDate> {
            plan(
                Cadence::Quarterly { revisit },
                midnight(d(2024, 3, 31)),
                midnight(now.date()),
                now,
                &[],
            )
            .into_iter()
            .map(|u| u.start.date())
            .collect()
        };
        assert_eq!(quarters(0), vec![d(2024, 6, 30)]);
        assert_eq!(quarters(1), vec![d(2024, 3, 31), d(2024, 6, 30)]);
        assert_eq!(quarters(2), vec![d(2023, 12, 31), d(2024, 3, 31), d(2024, 6, 30)]);
    }

    #[test]
    fn test_daily_inclusive_and_exclusive() {
        let now = at(d(2024, 1, 9), 18, 0);
        let end = midnight(d(2024, 1, 9));
        let wm = midnight(d(2024, 1, 5));

        let exclusive = plan(Cadence::Daily { inclusive: false }, wm, end, now, &[]);
        assert_eq!(exclusive, vec![WorkUnit::new(midnight(d(2024, 1, 6)), end)]);

        let inclusive = plan(Cadence::Daily { inclusive: true }, wm, end, now, &[]);
        assert_eq!(inclusive, vec![WorkUnit::new(wm, end)]);

        assert!(plan(Cadence::Daily { inclusive: false }, end, end, now, &[]).is_empty());
        assert!(plan(Cadence::Daily { inclusive: true }, end, end, now, &[]).is_empty());
    }

    #[test]
    fn test_windowed_clips_to_trading_days() {
        let reference = reference();
        let units = plan(
            Cadence::Windowed {
                days: 3,
                start_offset_days: 1,
                clip_to_trading: true,
            },
            midnight(d(2023, 12, 31)),
            midnight(d(2024, 1, 9)),
            at(d(2024, 1, 9), 18, 0),
            &reference.trade_dates,
        );
        // [1-1,1-3] [1-4,1-6] [1-7,1-9]
        assert_eq!(
            units,
            vec![
                WorkUnit::days(d(2024, 1, 2), d(2024, 1, 3)),
                WorkUnit::days(d(2024, 1, 4), d(2024, 1, 5)),
                WorkUnit::days(d(2024, 1, 8), d(2024, 1, 9)),
            ]
        );
    }

    #[test]
    fn test_trading_days_one_unit_each() {
        let reference = reference();
        let units = plan(
            Cadence::TradingDays,
            midnight(d(2024, 1, 4)),
            midnight(d(2024, 1, 8)),
            at(d(2024, 1, 9), 9, 0),
            &reference.trade_dates,
        );
        let starts: Vec<_> = units.iter().map(|u| u.start.date()).collect();
        assert_eq!(starts, vec![d(2024, 1, 5), d(2024, 1, 8)]);
    }

    #[test]
    fn test_yearly_gate_and_year_range() {
        let cadence = Cadence::Yearly { gate_months: 4 };
        // 워터마크 + 4개월 이전이면 건너뜀
        let now = at(d(2024, 3, 1), 10, 0);
        assert!(plan(cadence, midnight(d(2023, 12, 31)), midnight(now.date()), now, &[]).is_empty());

        let now = at(d(2024, 10, 16), 10, 0);
        let units = plan(cadence, midnight(d(2023, 9, 30)), midnight(now.date()), now, &[]);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].start.date(), d(2023, 1, 1));
        assert_eq!(units[0].on_empty, Some(midnight(d(2022, 12, 31))));
        assert_eq!(units[1].end.date(), d(2024, 12, 31));

        // 1월 말 이전에는 전년도까지만
        let now = at(d(2025, 1, 20), 10, 0);
        let units = plan(cadence, midnight(d(2023, 12, 31)), midnight(now.date()), now, &[]);
        assert_eq!(units.iter().map(|u| u.start.year()).collect::<Vec<_>>(), vec![2024]);
    }

    #[test]
    fn test_snapshot_and_intraday() {
        let now = at(d(2024, 1, 9), 11, 0);
        let end = midnight(d(2024, 1, 9));
        assert_eq!(plan(Cadence::Snapshot, midnight(d(2024, 1, 8)), end, now, &[]).len(), 1);
        assert!(plan(Cadence::Snapshot, end, end, now, &[]).is_empty());

        let bar = at(d(2024, 1, 9), 11, 0);
        let units = plan(Cadence::Intraday, at(d(2024, 1, 8), 15, 0), bar, now, &[]);
        assert_eq!(units, vec![WorkUnit::new(at(d(2024, 1, 8), 15, 0), bar)]);
        assert!(plan(Cadence::Intraday, bar, bar, now, &[]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_start_after_end_plans_nothing(gap in 1i64..400, width in 1i64..400) {
            let end = d(2024, 1, 1);
            let watermark = midnight(end + Duration::days(gap));
            let now = at(end, 18, 0);
            for cadence in [
                Cadence::Daily { inclusive: false },
                Cadence::Windowed { days: width, start_offset_days: 1, clip_to_trading: false },
                Cadence::TradingDays,
                Cadence::Snapshot,
                Cadence::Intraday,
            ] {
                prop_assert!(plan(cadence, watermark, midnight(end), now, &reference().trade_dates).is_empty());
            }
        }

        #[test]
        fn prop_quarterly_units_are_ascending_quarter_ends(
            offset in 0i64..4000,
            revisit in 0i32..3,
        ) {
            let watermark = d(2010, 3, 31) + Duration::days(offset);
            let now = at(d(2024, 6, 15), 10, 0);
            let units = plan(Cadence::Quarterly { revisit }, midnight(watermark), midnight(now.date()), now, &[]);
            for pair in units.windows(2) {
                prop_assert!(pair[0].start < pair[1].start);
            }
            for unit in &units {
                prop_assert_eq!(calendar::quarter_end_of(unit.start.date()), unit.start.date());
            }
        }
    }
}
