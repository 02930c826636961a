//! 날짜 계산 유틸리티.
//!
//! 분기말, 고정 폭 구간 분할, 주 단위 기준일(금요일),
//! 거래일 캘린더 조회를 담당합니다.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

/// 분기말 날짜 (3·12월은 31일, 6·9월은 30일).
///
/// 분기말 월이 아니면 `None`.
pub fn quarter_end(year: i32, month: u32) -> Option<NaiveDate> {
    let day = match month {
        3 | 12 => 31,
        6 | 9 => 30,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// 날짜가 속한 분기의 분기말.
pub fn quarter_end_of(date: NaiveDate) -> NaiveDate {
    let month = ((date.month() - 1) / 3 + 1) * 3;
    quarter_end(date.year(), month).unwrap_or(date)
}

/// 분기말 날짜를 `quarters`만큼 이동 (음수는 과거 방향).
pub fn shift_quarter_end(date: NaiveDate, quarters: i32) -> NaiveDate {
    let q = quarter_end_of(date);
    let total = q.year() * 12 + q.month() as i32 - 1 + quarters * 3;
    let (year, month) = (total.div_euclid(12), total.rem_euclid(12) as u32 + 1);
    quarter_end(year, month).unwrap_or(q)
}

/// 분기 라벨(`2024年1季度股票投资明细`)을 분기말 날짜로 변환.
pub fn parse_quarter_label(label: &str) -> Option<NaiveDate> {
    let year_end = label.find('年')?;
    let year: i32 = label[..year_end].trim().parse().ok()?;
    let rest = &label[year_end + '年'.len_utf8()..];
    let quarter = rest
        .find("季度")
        .and_then(|pos| rest[..pos].chars().last())
        .and_then(|c| c.to_digit(10))?;
    match quarter {
        1..=4 => quarter_end(year, quarter * 3),
        _ => None,
    }
}

/// `[start, end]`를 `days`일 폭 구간으로 분할.
///
/// 기준점은 `start, start+days, ...` 이며 각 구간은 다음 기준점 전날에 끝나고,
/// 마지막 구간은 `end`에서 끝납니다. `start > end`면 빈 목록.
pub fn split_windows(
    start: NaiveDate,
    end: NaiveDate,
    days: i64,
) -> Vec<(NaiveDate, NaiveDate)> {
    if start > end || days <= 0 {
        return Vec::new();
    }
    let mut points = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        points.push(cursor);
        cursor += Duration::days(days);
    }

    let mut windows: Vec<(NaiveDate, NaiveDate)> = points
        .windows(2)
        .map(|w| (w[0], w[1] - Duration::days(1)))
        .collect();
    if let Some(&last) = points.last() {
        windows.push((last, end));
    }
    windows
}

/// 직전 금요일 (이번 주 토요일 `cutoff` 이후면 이번 주 금요일).
pub fn last_friday(now: NaiveDateTime, cutoff: NaiveTime) -> NaiveDate {
    let date = now.date();
    let weekday = date.weekday().num_days_from_monday() as i64;
    if weekday < 5 || (date.weekday() == Weekday::Sat && now.time() < cutoff) {
        date - Duration::days(weekday + 3)
    } else {
        date - Duration::days(weekday - 4)
    }
}

/// 지난주 금요일.
pub fn previous_week_friday(today: NaiveDate) -> NaiveDate {
    let weekday = today.weekday().num_days_from_monday() as i64;
    today - Duration::days(weekday + 3)
}

/// 전월 말일.
pub fn previous_month_end(today: NaiveDate) -> NaiveDate {
    today.with_day(1).unwrap_or(today) - Duration::days(1)
}

/// 날짜에 개월 수 더하기 (말일 보정).
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months)).unwrap_or(date)
}

/// 정렬된 거래일 목록에서 `date` 이하의 마지막 거래일.
pub fn last_trading_day_on_or_before(
    trade_dates: &[NaiveDate],
    date: NaiveDate,
) -> Option<NaiveDate> {
    let idx = trade_dates.partition_point(|d| *d <= date);
    idx.checked_sub(1).map(|i| trade_dates[i])
}

/// 정렬된 거래일 목록에서 `[start, end]` 구간의 거래일.
pub fn trading_days_between(
    trade_dates: &[NaiveDate],
    start: NaiveDate,
    end: NaiveDate,
) -> &[NaiveDate] {
    if start > end {
        return &[];
    }
    let lo = trade_dates.partition_point(|d| *d < start);
    let hi = trade_dates.partition_point(|d| *d <= end);
    &trade_dates[lo..hi.max(lo)]
}
