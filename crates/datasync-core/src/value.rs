//! 셀 값과 외부 레코드 타입 변환.
//!
//! 데이터 API는 JSON 행을 반환하며, 숫자가 문자열로 오거나
//! 날짜가 여러 형식으로 섞여 오는 경우가 많습니다.
//! 변환 실패는 에러 대신 `Null`로 처리합니다.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value as Json;

use crate::schema::ColumnKind;

/// 정규화된 셀 값.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// 결측값으로 취급하는 문자열
const MISSING_MARKERS: [&str; 6] = ["", "-", "--", "nan", "NaN", "None"];

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// JSON 값을 컬럼 타입에 맞게 변환.
    pub fn coerce(raw: &Json, kind: ColumnKind) -> Value {
        match kind {
            ColumnKind::Text => text_of(raw).map(Value::Text).unwrap_or(Value::Null),
            ColumnKind::TextMax(max_bytes) => text_of(raw)
                .map(|s| Value::Text(truncate_by_bytes(&s, max_bytes).to_string()))
                .unwrap_or(Value::Null),
            ColumnKind::Code => code_of(raw).map(Value::Text).unwrap_or(Value::Null),
            ColumnKind::Int => float_of(raw)
                .map(|f| Value::Int(f.round() as i64))
                .unwrap_or(Value::Null),
            ColumnKind::Float(scale) => float_of(raw)
                .map(|f| Value::Float(scale.map_or(f, |s| round_to(f, s))))
                .unwrap_or(Value::Null),
            ColumnKind::Date => datetime_of(raw)
                .map(|dt| Value::Date(dt.date()))
                .unwrap_or(Value::Null),
            ColumnKind::DateTime => datetime_of(raw).map(Value::DateTime).unwrap_or(Value::Null),
        }
    }

    /// 워터마크 시각을 컬럼 타입의 값으로 표현.
    pub fn from_datetime(dt: NaiveDateTime, kind: ColumnKind) -> Value {
        match kind {
            ColumnKind::DateTime => Value::DateTime(dt),
            ColumnKind::Date => Value::Date(dt.date()),
            ColumnKind::Int => Value::Int(yyyymmdd(dt.date()) as i64),
            _ => Value::Text(dt.format("%Y%m%d").to_string()),
        }
    }

    /// 날짜/시각 값을 `NaiveDateTime`으로 변환 (날짜는 00:00).
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => Some(d.and_time(NaiveTime::MIN)),
            Value::DateTime(dt) => Some(*dt),
            Value::Int(n) => u32::try_from(*n)
                .ok()
                .and_then(parse_yyyymmdd)
                .map(|d| d.and_time(NaiveTime::MIN)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// 중복 제거 키 구성용 문자열.
    pub(crate) fn key_fragment(&self) -> String {
        match self {
            Value::Null => "\u{0}".to_string(),
            Value::Int(n) => format!("i{}", n),
            Value::Float(f) => format!("f{}", f),
            Value::Text(s) => format!("s{}", s),
            Value::Date(d) => format!("d{}", d),
            Value::DateTime(dt) => format!("t{}", dt),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.format("%Y%m%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

/// UTF-8 문자 경계를 지키며 바이트 길이 기준으로 자르기.
///
/// 결과의 인코딩 길이는 항상 `max_bytes` 이하입니다.
pub fn truncate_by_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// 소수점 `scale` 자리 반올림.
pub fn round_to(value: f64, scale: u32) -> f64 {
    let factor = 10f64.powi(scale as i32);
    (value * factor).round() / factor
}

/// `YYYYMMDD` 정수를 날짜로 변환.
pub fn parse_yyyymmdd(n: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt((n / 10_000) as i32, (n / 100) % 100, n % 100)
}

/// 날짜를 `YYYYMMDD` 정수로 변환.
pub fn yyyymmdd(date: NaiveDate) -> u32 {
    use chrono::Datelike;
    date.year() as u32 * 10_000 + date.month() * 100 + date.day()
}

fn text_of(raw: &Json) -> Option<String> {
    match raw {
        Json::String(s) => {
            let trimmed = s.trim();
            (!MISSING_MARKERS.contains(&trimmed)).then(|| trimmed.to_string())
        }
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// 종목 코드: 숫자로 온 코드는 6자리로 0 채움.
fn code_of(raw: &Json) -> Option<String> {
    match raw {
        Json::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as u64))
            .map(|v| format!("{:06}", v)),
        other => text_of(other),
    }
}

fn float_of(raw: &Json) -> Option<f64> {
    match raw {
        Json::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Json::String(s) => {
            let cleaned = s.trim().trim_end_matches('%').replace(',', "");
            if MISSING_MARKERS.contains(&cleaned.as_str()) {
                return None;
            }
            cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
        }
        Json::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d"];

fn datetime_of(raw: &Json) -> Option<NaiveDateTime> {
    match raw {
        Json::String(s) => {
            let s = s.trim().trim_end_matches('Z');
            if MISSING_MARKERS.contains(&s) {
                return None;
            }
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .or_else(|| {
                    DATE_FORMATS
                        .iter()
                        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                        .map(|d| d.and_time(NaiveTime::MIN))
                })
        }
        Json::Number(n) => {
            let v = n.as_i64()?;
            if (19_000_101..=29_991_231).contains(&v) {
                parse_yyyymmdd(v as u32).map(|d| d.and_time(NaiveTime::MIN))
            } else if v > 100_000_000_000 {
                // epoch 밀리초
                chrono::DateTime::from_timestamp_millis(v).map(|dt| dt.naive_utc())
            } else {
                None
            }
        }
        _ => None,
    }
}
