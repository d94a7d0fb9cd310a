//! Dynamically-typed SQL values.
//!
//! [`SqlValue`] is what travels across the connectivity boundary in both
//! directions: positional parameters are bound as `SqlValue`s and cursor
//! columns are read back as `SqlValue`s before being normalized into
//! [`Record`](crate::Record) values.

use crate::driver::SqlType;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::error::Error;
use std::fmt;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};

/// A scalar SQL value, including `NULL`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SqlValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    /// Large text (CLOB / TEXT columns reported as character large objects).
    Clob(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Borrow the textual content of `Text`/`Clob` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) | SqlValue::Clob(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view of numeric (and numeric-looking text) values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            SqlValue::Bool(v) => Some(i64::from(*v)),
            SqlValue::Float(v) => Some(*v as i64),
            SqlValue::Decimal(v) => v.trunc().to_i64(),
            SqlValue::Text(s) | SqlValue::Clob(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Int(v) => Some(*v as f64),
            SqlValue::Float(v) => Some(*v),
            SqlValue::Decimal(v) => v.to_f64(),
            SqlValue::Text(s) | SqlValue::Clob(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(v) => Some(*v),
            SqlValue::Int(v) => Some(*v != 0),
            SqlValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "t" | "true" | "1" | "y" | "yes" => Some(true),
                "f" | "false" | "0" | "n" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            SqlValue::Date(d) => Some(*d),
            SqlValue::Timestamp(ts) => Some(ts.date()),
            SqlValue::TimestampTz(ts) => Some(ts.date_naive()),
            SqlValue::Text(s) => crate::record::parse_datetime(s)
                .map(|ts| ts.date())
                .ok()
                .or_else(|| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()),
            _ => None,
        }
    }

    /// Convert to the kind of value a driver type code describes, the way an
    /// out parameter registered with that code reads back. NULL and values
    /// that do not convert are returned unchanged.
    pub fn convert_to(self, sql_type: SqlType) -> SqlValue {
        let converted = match sql_type {
            _ if self.is_null() => None,
            SqlType::BIT | SqlType::BOOLEAN => self.as_bool().map(SqlValue::Bool),
            SqlType::TINYINT | SqlType::SMALLINT | SqlType::INTEGER | SqlType::BIGINT => {
                self.as_i64().map(SqlValue::Int)
            }
            SqlType::FLOAT | SqlType::REAL | SqlType::DOUBLE => self.as_f64().map(SqlValue::Float),
            SqlType::NUMERIC | SqlType::DECIMAL => match &self {
                SqlValue::Decimal(_) => None,
                other => other
                    .as_f64()
                    .and_then(Decimal::from_f64_retain)
                    .map(SqlValue::Decimal),
            },
            SqlType::CHAR | SqlType::VARCHAR | SqlType::NCHAR | SqlType::NVARCHAR => {
                self.to_text().map(SqlValue::Text)
            }
            SqlType::CLOB | SqlType::NCLOB | SqlType::LONGVARCHAR | SqlType::LONGNVARCHAR => {
                self.to_text().map(SqlValue::Clob)
            }
            SqlType::DATE => self.as_date().map(SqlValue::Date),
            SqlType::TIME => match &self {
                SqlValue::Timestamp(ts) => Some(SqlValue::Time(ts.time())),
                SqlValue::Text(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
                    .ok()
                    .map(SqlValue::Time),
                _ => None,
            },
            SqlType::TIMESTAMP => match &self {
                SqlValue::Date(d) => Some(SqlValue::Timestamp(d.and_time(NaiveTime::MIN))),
                SqlValue::TimestampTz(ts) => Some(SqlValue::Timestamp(ts.naive_utc())),
                SqlValue::Text(s) => crate::record::parse_datetime(s).ok().map(SqlValue::Timestamp),
                _ => None,
            },
            _ => None,
        };
        converted.unwrap_or(self)
    }

    /// Render the value as text, the way a driver's `getString` would.
    pub fn to_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Text(s) | SqlValue::Clob(s) => Some(s.clone()),
            SqlValue::Json(v) => Some(v.to_string()),
            SqlValue::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Bool(v) => write!(f, "{v}"),
            SqlValue::Int(v) => write!(f, "{v}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Decimal(v) => write!(f, "{v}"),
            SqlValue::Text(s) | SqlValue::Clob(s) => f.write_str(s),
            SqlValue::Date(d) => write!(f, "{d}"),
            SqlValue::Time(t) => write!(f, "{t}"),
            SqlValue::Timestamp(ts) => write!(f, "{ts}"),
            SqlValue::TimestampTz(ts) => write!(f, "{ts}"),
            SqlValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            SqlValue::Json(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for SqlValue {
                fn from(v: $t) -> Self {
                    SqlValue::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<f32> for SqlValue {
    fn from(v: f32) -> Self {
        SqlValue::Float(f64::from(v))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveTime> for SqlValue {
    fn from(v: NaiveTime) -> Self {
        SqlValue::Time(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::TimestampTz(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<uuid::Uuid> for SqlValue {
    fn from(v: uuid::Uuid) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

impl From<&serde_json::Value> for SqlValue {
    fn from(v: &serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Int(i),
                None => SqlValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Json(other.clone()),
        }
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(v: serde_json::Value) -> Self {
        SqlValue::from(&v)
    }
}

type BoxError = Box<dyn Error + Sync + Send>;

/// Binds a dynamic value to whatever parameter type the server inferred.
///
/// Postgres infers a concrete type for every `$n`; integers, floats and text
/// are coerced to it so callers can bind `param(1000)` against a `bigint`
/// column or `param("42")` against an `integer` one.
impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(v) => match *ty {
                Type::BOOL => v.to_sql(ty, out),
                _ => SqlValue::Int(i64::from(*v)).to_sql(ty, out),
            },
            SqlValue::Int(v) => int_to_sql(*v, ty, out),
            SqlValue::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::NUMERIC => Decimal::from_f64_retain(*v)
                    .ok_or_else(|| format!("cannot represent {v} as numeric"))?
                    .to_sql(ty, out),
                Type::INT2 | Type::INT4 | Type::INT8 => int_to_sql(*v as i64, ty, out),
                _ => v.to_sql(ty, out),
            },
            SqlValue::Decimal(v) => match *ty {
                Type::FLOAT4 | Type::FLOAT8 => v
                    .to_f64()
                    .ok_or_else(|| format!("cannot represent {v} as float"))?
                    .to_sql(ty, out),
                Type::INT2 | Type::INT4 | Type::INT8 => int_to_sql(
                    v.trunc()
                        .to_i64()
                        .ok_or_else(|| format!("cannot represent {v} as integer"))?,
                    ty,
                    out,
                ),
                _ => v.to_sql(ty, out),
            },
            SqlValue::Text(s) | SqlValue::Clob(s) => text_to_sql(s, ty, out),
            SqlValue::Date(d) => match *ty {
                Type::TIMESTAMP => d.and_time(NaiveTime::MIN).to_sql(ty, out),
                Type::TIMESTAMPTZ => d.and_time(NaiveTime::MIN).and_utc().to_sql(ty, out),
                _ => d.to_sql(ty, out),
            },
            SqlValue::Time(t) => t.to_sql(ty, out),
            SqlValue::Timestamp(ts) => match *ty {
                Type::DATE => ts.date().to_sql(ty, out),
                Type::TIMESTAMPTZ => ts.and_utc().to_sql(ty, out),
                _ => ts.to_sql(ty, out),
            },
            SqlValue::TimestampTz(ts) => match *ty {
                Type::DATE => ts.date_naive().to_sql(ty, out),
                Type::TIMESTAMP => ts.naive_utc().to_sql(ty, out),
                _ => ts.to_sql(ty, out),
            },
            SqlValue::Bytes(b) => b.to_sql(ty, out),
            SqlValue::Json(v) => match *ty {
                Type::JSON | Type::JSONB => v.to_sql(ty, out),
                _ => v.to_string().to_sql(ty, out),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn int_to_sql(v: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(v)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(v)?.to_sql(ty, out),
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::FLOAT8 => (v as f64).to_sql(ty, out),
        Type::NUMERIC => Decimal::from(v).to_sql(ty, out),
        Type::BOOL => (v != 0).to_sql(ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => v.to_string().to_sql(ty, out),
        _ => v.to_sql(ty, out),
    }
}

fn text_to_sql(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 | Type::INT4 | Type::INT8 => int_to_sql(s.trim().parse::<i64>()?, ty, out),
        Type::FLOAT4 | Type::FLOAT8 => s.trim().parse::<f64>()?.to_sql(ty, out),
        Type::NUMERIC => s.trim().parse::<Decimal>()?.to_sql(ty, out),
        Type::BOOL => SqlValue::Text(s.to_string())
            .as_bool()
            .ok_or_else(|| format!("cannot represent '{s}' as boolean"))?
            .to_sql(ty, out),
        Type::UUID => uuid::Uuid::parse_str(s.trim())?.to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
        Type::DATE => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")?.to_sql(ty, out),
        Type::TIMESTAMP => crate::record::parse_datetime(s)?.to_sql(ty, out),
        Type::TIMESTAMPTZ => crate::record::parse_datetime(s)?.and_utc().to_sql(ty, out),
        _ => s.to_sql(ty, out),
    }
}
