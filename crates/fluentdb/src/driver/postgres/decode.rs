use crate::driver::ResultSet;
use crate::error::{DbError, DbResult};
use crate::record::normalize;
use crate::value::SqlValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::error::Error;
use std::net::{Ipv4Addr, Ipv6Addr};
use tokio_postgres::types::{FromSql, Kind, Type};
use tokio_postgres::{Column, Row};

type BoxError = Box<dyn Error + Sync + Send>;

/// Extension trait for reading metadata rows by column name.
pub(crate) trait RowExt {
    fn try_get_column<'a, T>(&'a self, column: &str) -> DbResult<T>
    where
        T: FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<'a, T>(&'a self, column: &str) -> DbResult<T>
    where
        T: FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| DbError::decode(column, e.to_string()))
    }
}

/// Buffer `rows` into a cursor labelled with `columns`.
pub(crate) fn result_set(columns: &[Column], rows: &[Row]) -> DbResult<ResultSet> {
    let labels = columns.iter().map(|c| c.name().to_string()).collect();
    let rows = rows.iter().map(decode_row).collect::<DbResult<Vec<_>>>()?;
    Ok(ResultSet::new(labels, rows))
}

fn decode_row(row: &Row) -> DbResult<Vec<SqlValue>> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            row.try_get::<_, Option<Cell>>(idx)
                .map(|cell| cell.map(|c| c.0).unwrap_or_default())
                .map_err(|e| DbError::decode(column.name(), e.to_string()))
        })
        .collect()
}

/// A column value of any server type.
///
/// Scalars the crate models map to their `SqlValue` variant, arrays become
/// JSON arrays of normalized elements, domains decode as their base type and
/// anything else is kept as text (or bytes when it is not UTF-8).
pub(crate) struct Cell(pub(crate) SqlValue);

impl<'a> FromSql<'a> for Cell {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        let value = match *ty {
            Type::BOOL => SqlValue::Bool(bool::from_sql(ty, raw)?),
            Type::CHAR => SqlValue::Int(i8::from_sql(ty, raw)?.into()),
            Type::INT2 => SqlValue::Int(i16::from_sql(ty, raw)?.into()),
            Type::INT4 => SqlValue::Int(i32::from_sql(ty, raw)?.into()),
            Type::INT8 => SqlValue::Int(i64::from_sql(ty, raw)?),
            Type::OID => SqlValue::Int(u32::from_sql(ty, raw)?.into()),
            Type::FLOAT4 => SqlValue::Float(f32::from_sql(ty, raw)?.into()),
            Type::FLOAT8 => SqlValue::Float(f64::from_sql(ty, raw)?),
            Type::NUMERIC => SqlValue::Decimal(Decimal::from_sql(ty, raw)?),
            Type::MONEY => SqlValue::Decimal(Decimal::new(i64::from_be_bytes(raw.try_into()?), 2)),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
                SqlValue::Text(String::from_sql(ty, raw)?)
            }
            Type::DATE => SqlValue::Date(NaiveDate::from_sql(ty, raw)?),
            Type::TIME => SqlValue::Time(NaiveTime::from_sql(ty, raw)?),
            Type::TIMESTAMP => SqlValue::Timestamp(NaiveDateTime::from_sql(ty, raw)?),
            Type::TIMESTAMPTZ => SqlValue::TimestampTz(DateTime::<Utc>::from_sql(ty, raw)?),
            Type::INTERVAL => SqlValue::Text(interval_text(raw)?),
            Type::INET | Type::CIDR => SqlValue::Text(inet_text(raw)?),
            Type::BYTEA => SqlValue::Bytes(Vec::<u8>::from_sql(ty, raw)?),
            Type::JSON | Type::JSONB => SqlValue::Json(Value::from_sql(ty, raw)?),
            Type::UUID => SqlValue::Text(uuid::Uuid::from_sql(ty, raw)?.to_string()),
            _ => match ty.kind() {
                Kind::Array(_) => {
                    let items = Vec::<Option<Cell>>::from_sql(ty, raw)?;
                    SqlValue::Json(Value::Array(
                        items
                            .into_iter()
                            .map(|item| item.map_or(Value::Null, |c| normalize(c.0)))
                            .collect(),
                    ))
                }
                Kind::Domain(base) => Cell::from_sql(base, raw)?.0,
                _ => match std::str::from_utf8(raw) {
                    Ok(text) => SqlValue::Text(text.to_string()),
                    Err(_) => SqlValue::Bytes(raw.to_vec()),
                },
            },
        };
        Ok(Cell(value))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Render a binary interval the way the server's default output style does,
/// e.g. `1 year 2 mons 3 days 04:05:06.5`.
fn interval_text(raw: &[u8]) -> Result<String, BoxError> {
    if raw.len() != 16 {
        return Err(format!("invalid interval length {}", raw.len()).into());
    }
    let micros = i64::from_be_bytes(raw[0..8].try_into()?);
    let days = i32::from_be_bytes(raw[8..12].try_into()?);
    let months = i32::from_be_bytes(raw[12..16].try_into()?);

    let mut parts = Vec::new();
    for (n, unit, units) in [
        (months / 12, "year", "years"),
        (months % 12, "mon", "mons"),
        (days, "day", "days"),
    ] {
        if n != 0 {
            parts.push(format!("{n} {}", if n == 1 { unit } else { units }));
        }
    }
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let abs = micros.unsigned_abs();
        let secs = abs / 1_000_000;
        let mut clock = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        let fraction = abs % 1_000_000;
        if fraction != 0 {
            clock.push('.');
            clock.push_str(format!("{fraction:06}").trim_end_matches('0'));
        }
        parts.push(clock);
    }
    Ok(parts.join(" "))
}

/// `inet`/`cidr` wire form: family, netmask bits, cidr flag, length, address.
fn inet_text(raw: &[u8]) -> Result<String, BoxError> {
    let [family, bits, is_cidr, len, addr @ ..] = raw else {
        return Err("invalid inet value".into());
    };
    if addr.len() != usize::from(*len) {
        return Err("invalid inet address length".into());
    }
    let (text, full) = match (*family, addr.len()) {
        (2, 4) => (Ipv4Addr::new(addr[0], addr[1], addr[2], addr[3]).to_string(), 32),
        (3, 16) => {
            let octets: [u8; 16] = addr.try_into()?;
            (Ipv6Addr::from(octets).to_string(), 128)
        }
        _ => return Err(format!("unknown inet family {family}").into()),
    };
    if *is_cidr != 0 || *bits != full {
        return Ok(format!("{text}/{bits}"));
    }
    Ok(text)
}
