//! Connectivity-layer type codes.
//!
//! The codes are the portable SQL type numbers every relational driver
//! reports in column metadata and accepts when registering out parameters.

/// A driver type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SqlType(pub i32);

impl SqlType {
    pub const BIT: SqlType = SqlType(-7);
    pub const TINYINT: SqlType = SqlType(-6);
    pub const SMALLINT: SqlType = SqlType(5);
    pub const INTEGER: SqlType = SqlType(4);
    pub const BIGINT: SqlType = SqlType(-5);
    pub const FLOAT: SqlType = SqlType(6);
    pub const REAL: SqlType = SqlType(7);
    pub const DOUBLE: SqlType = SqlType(8);
    pub const NUMERIC: SqlType = SqlType(2);
    pub const DECIMAL: SqlType = SqlType(3);
    pub const CHAR: SqlType = SqlType(1);
    pub const VARCHAR: SqlType = SqlType(12);
    pub const LONGVARCHAR: SqlType = SqlType(-1);
    pub const DATE: SqlType = SqlType(91);
    pub const TIME: SqlType = SqlType(92);
    pub const TIMESTAMP: SqlType = SqlType(93);
    pub const BINARY: SqlType = SqlType(-2);
    pub const VARBINARY: SqlType = SqlType(-3);
    pub const LONGVARBINARY: SqlType = SqlType(-4);
    pub const NULL: SqlType = SqlType(0);
    pub const OTHER: SqlType = SqlType(1111);
    pub const OBJECT: SqlType = SqlType(2000);
    pub const DISTINCT: SqlType = SqlType(2001);
    pub const STRUCT: SqlType = SqlType(2002);
    pub const ARRAY: SqlType = SqlType(2003);
    pub const BLOB: SqlType = SqlType(2004);
    pub const CLOB: SqlType = SqlType(2005);
    pub const REF: SqlType = SqlType(2006);
    pub const BOOLEAN: SqlType = SqlType(16);
    pub const NCHAR: SqlType = SqlType(-15);
    pub const NVARCHAR: SqlType = SqlType(-9);
    pub const LONGNVARCHAR: SqlType = SqlType(-16);
    pub const NCLOB: SqlType = SqlType(2011);
    pub const SQLXML: SqlType = SqlType(2009);
    pub const TIME_WITH_TIMEZONE: SqlType = SqlType(2013);
    pub const TIMESTAMP_WITH_TIMEZONE: SqlType = SqlType(2014);

    pub fn code(self) -> i32 {
        self.0
    }
}

/// Declared type of a stored-procedure out parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutType {
    Boolean,
    Clob,
    Date,
    Decimal,
    Integer,
    Long,
    Bit,
    Char,
    Float,
    Time,
    Timestamp,
    Varchar,
}

/// Out-parameter type → driver type code. Types without an entry register
/// as variable-length text.
const OUT_TYPE_CODES: &[(OutType, SqlType)] = &[
    (OutType::Boolean, SqlType::BOOLEAN),
    (OutType::Clob, SqlType::CLOB),
    (OutType::Date, SqlType::DATE),
    (OutType::Decimal, SqlType::DOUBLE),
    (OutType::Integer, SqlType::INTEGER),
    (OutType::Long, SqlType::BIGINT),
    (OutType::Bit, SqlType::BIT),
    (OutType::Char, SqlType::CHAR),
    (OutType::Float, SqlType::FLOAT),
    (OutType::Time, SqlType::TIME),
    (OutType::Timestamp, SqlType::TIMESTAMP),
];

impl OutType {
    pub fn sql_type(self) -> SqlType {
        OUT_TYPE_CODES
            .iter()
            .find(|(out, _)| *out == self)
            .map_or(SqlType::VARCHAR, |(_, code)| *code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_types_map_to_codes() {
        assert_eq!(OutType::Long.sql_type(), SqlType::BIGINT);
        assert_eq!(OutType::Decimal.sql_type(), SqlType::DOUBLE);
        assert_eq!(OutType::Timestamp.sql_type().code(), 93);
        assert_eq!(OutType::Varchar.sql_type(), SqlType::VARCHAR);
    }
}
