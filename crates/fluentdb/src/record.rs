//! Records and value normalization.

use crate::value::SqlValue;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Map, Number, Value};

/// One result row: alias → normalized value, in projection order.
pub type Record = Map<String, Value>;

/// `yyyy-MM-dd HH:mm:ss`
pub const PATTERN_DATE_HOUR: &str = "%Y-%m-%d %H:%M:%S";
/// `yyyy-MM-dd'T'HH:mm:ss`
pub const PATTERN_DATE_T_HOUR: &str = "%Y-%m-%dT%H:%M:%S";
/// `yyyy-MM-dd HH:mm:ss.SSS`, the canonical form for dates in records.
pub const PATTERN_DATE_HOUR_MILLISECONDS: &str = "%Y-%m-%d %H:%M:%S%.3f";
/// `yyyy-MM-dd'T'HH:mm:ss.SSS`
pub const PATTERN_DATE_T_HOUR_MILLISECONDS: &str = "%Y-%m-%dT%H:%M:%S%.3f";
/// `yyyy-MM-dd`
pub const PATTERN_DATE_ONLY: &str = "%Y-%m-%d";

/// Format a timestamp with the canonical record pattern.
pub fn format_datetime(ts: &NaiveDateTime) -> String {
    ts.format(PATTERN_DATE_HOUR_MILLISECONDS).to_string()
}

/// Parse a timestamp written with either a space or a `T` separator,
/// with or without milliseconds.
pub fn parse_datetime(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let s = s.trim().replacen('T', " ", 1);
    NaiveDateTime::parse_from_str(&s, PATTERN_DATE_HOUR_MILLISECONDS)
        .or_else(|_| NaiveDateTime::parse_from_str(&s, PATTERN_DATE_HOUR))
        .or_else(|err| {
            NaiveDate::parse_from_str(&s, PATTERN_DATE_ONLY)
                .map(|d| d.and_time(NaiveTime::MIN))
                .map_err(|_| err)
        })
}

/// Normalize a cursor value for a record.
///
/// NULL becomes an explicit `null`, dates and timestamps become canonical
/// strings, large text becomes its string contents, everything else keeps
/// its JSON shape.
pub fn normalize(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Bool(b),
        SqlValue::Int(i) => Value::Number(i.into()),
        SqlValue::Float(f) => {
            Number::from_f64(f).map_or_else(|| Value::String(f.to_string()), Value::Number)
        }
        SqlValue::Decimal(d) => {
            let text = d.normalize().to_string();
            text.parse::<Number>().map_or(Value::String(text), Value::Number)
        }
        SqlValue::Text(s) | SqlValue::Clob(s) => Value::String(s),
        SqlValue::Date(d) => Value::String(format_datetime(&d.and_time(NaiveTime::MIN))),
        SqlValue::Timestamp(ts) => Value::String(format_datetime(&ts)),
        SqlValue::TimestampTz(ts) => Value::String(format_datetime(&ts.naive_utc())),
        SqlValue::Time(t) => Value::String(t.format("%H:%M:%S%.3f").to_string()),
        SqlValue::Bytes(b) => Value::Array(b.into_iter().map(Value::from).collect()),
        SqlValue::Json(v) => v,
    }
}
