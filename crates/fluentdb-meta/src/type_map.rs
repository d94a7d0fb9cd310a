//! Driver type code → semantic column type.

use fluentdb::SqlType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The coarse value type a column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SemanticType {
    #[default]
    String,
    Integer,
    Long,
    BigDecimal,
    Boolean,
    Date,
    List,
    Object,
}

impl SemanticType {
    pub fn as_str(self) -> &'static str {
        match self {
            SemanticType::String => "String",
            SemanticType::Integer => "Integer",
            SemanticType::Long => "Long",
            SemanticType::BigDecimal => "BigDecimal",
            SemanticType::Boolean => "Boolean",
            SemanticType::Date => "Date",
            SemanticType::List => "List",
            SemanticType::Object => "Object",
        }
    }

    /// The JSON-facing type name; dates travel as strings.
    pub fn json_type(self) -> &'static str {
        match self {
            SemanticType::Integer => "Int",
            SemanticType::BigDecimal => "Double",
            SemanticType::Long => "Long",
            SemanticType::Boolean => "Boolean",
            _ => "String",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const TYPE_CODES: &[(SqlType, SemanticType)] = &[
    (SqlType::BIGINT, SemanticType::Long),
    (SqlType::INTEGER, SemanticType::Integer),
    (SqlType::SMALLINT, SemanticType::Integer),
    (SqlType::TINYINT, SemanticType::Integer),
    (SqlType::DECIMAL, SemanticType::BigDecimal),
    (SqlType::DOUBLE, SemanticType::BigDecimal),
    (SqlType::FLOAT, SemanticType::BigDecimal),
    (SqlType::NUMERIC, SemanticType::BigDecimal),
    (SqlType::REAL, SemanticType::BigDecimal),
    (SqlType::CHAR, SemanticType::String),
    (SqlType::VARCHAR, SemanticType::String),
    (SqlType::LONGNVARCHAR, SemanticType::String),
    (SqlType::LONGVARCHAR, SemanticType::String),
    (SqlType::NCHAR, SemanticType::String),
    (SqlType::CLOB, SemanticType::String),
    (SqlType::BINARY, SemanticType::Boolean),
    (SqlType::BIT, SemanticType::Boolean),
    (SqlType::VARBINARY, SemanticType::Boolean),
    (SqlType::DATE, SemanticType::Date),
    (SqlType::TIME, SemanticType::Date),
    (SqlType::TIMESTAMP, SemanticType::Date),
    (SqlType::TIME_WITH_TIMEZONE, SemanticType::Date),
    (SqlType::TIMESTAMP_WITH_TIMEZONE, SemanticType::Date),
    (SqlType::ARRAY, SemanticType::List),
    (SqlType::OBJECT, SemanticType::Object),
];

/// Vendor type names recognised when the code is not in [`TYPE_CODES`].
const TYPE_NAMES: &[(&str, SemanticType)] = &[
    ("int", SemanticType::Integer),
    ("date", SemanticType::Date),
    ("varchar", SemanticType::String),
    ("bit", SemanticType::Boolean),
    ("enum", SemanticType::String),
];

/// Resolve a column's semantic type from its driver type code, then its
/// (case-insensitive) type name; anything else is a `String`.
pub fn semantic_type(code: i32, type_name: &str) -> SemanticType {
    let by_code = TYPE_CODES
        .iter()
        .find(|(sql_type, _)| sql_type.code() == code)
        .map(|(_, semantic)| *semantic);
    by_code
        .or_else(|| {
            let type_name = type_name.trim();
            TYPE_NAMES
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(type_name))
                .map(|(_, semantic)| *semantic)
        })
        .unwrap_or_default()
}
