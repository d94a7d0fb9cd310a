//! Table and column descriptions.

use crate::error::MetaResult;
use crate::type_map::SemanticType;
use heck::{ToLowerCamelCase, ToUpperCamelCase};
use serde::{Deserialize, Serialize};

/// A described table with its columns in ordinal order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Table {
    pub catalog: String,
    pub schema: String,
    pub table_name: String,
    pub table_type: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(
        catalog: impl Into<String>,
        schema: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            schema: schema.into(),
            table_name: table_name.into(),
            table_type: "TABLE".to_string(),
            columns: Vec::new(),
        }
    }

    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.column_name == name)
    }

    pub fn primary_key_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    pub fn to_json(&self) -> MetaResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> MetaResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> MetaResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One column of a [`Table`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Column {
    pub column_name: String,
    pub column_type: SemanticType,
    pub column_size: i64,
    pub nullable: bool,
    pub primary_key: bool,
    pub indexed: bool,
    /// Table this column is assumed to reference, from the `<table>_id` naming convention.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fk_table_name: Option<String>,
}

impl Column {
    pub fn new(column_name: impl Into<String>, column_type: SemanticType) -> Self {
        Self {
            column_name: column_name.into(),
            column_type,
            ..Self::default()
        }
    }

    /// lowerCamelCase variable name; `class` becomes `clazz`.
    pub fn var_name(&self) -> String {
        let name = self.column_name.to_lower_camel_case();
        if name == "class" {
            "clazz".to_string()
        } else {
            name
        }
    }

    /// [`Column::var_name`] without a trailing `Id` (`publisherId` → `publisher`).
    pub fn var_name_without_id(&self) -> String {
        let mut name = self.var_name();
        if let Some(p) = name.rfind("Id").filter(|p| *p > 0) {
            name.truncate(p);
        }
        name
    }

    /// UpperCamelCase form of the column name.
    pub fn type_name_camel(&self) -> String {
        self.column_name.to_upper_camel_case()
    }

    /// UpperCamelCase form of the referenced table, if any.
    pub fn fk_table_camel(&self) -> Option<String> {
        self.fk_table_name.as_deref().map(|t| t.to_upper_camel_case())
    }

    /// Short prefix for the referenced table: the first four characters of a
    /// single-word name, or the first two of each `_`-separated word.
    pub fn nested_id(&self) -> Option<String> {
        let table = self.fk_table_name.as_deref()?;
        let words: Vec<&str> = table.split('_').collect();
        Some(match words.as_slice() {
            [single] => single.chars().take(4).collect(),
            many => many.iter().flat_map(|w| w.chars().take(2)).collect(),
        })
    }

    pub fn json_type(&self) -> &'static str {
        self.column_type.json_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fk_column(name: &str, table: &str) -> Column {
        Column {
            fk_table_name: Some(table.to_string()),
            ..Column::new(name, SemanticType::Long)
        }
    }

    #[test]
    fn naming_helpers() {
        let column = fk_column("publisher_id", "publisher");
        assert_eq!(column.var_name(), "publisherId");
        assert_eq!(column.var_name_without_id(), "publisher");
        assert_eq!(column.type_name_camel(), "PublisherId");
        assert_eq!(column.fk_table_camel().as_deref(), Some("Publisher"));
        assert_eq!(column.json_type(), "Long");

        assert_eq!(Column::new("class", SemanticType::String).var_name(), "clazz");
        assert_eq!(Column::new("id", SemanticType::Long).var_name_without_id(), "id");
        assert_eq!(Column::new("TITLE", SemanticType::String).var_name(), "title");
    }

    #[test]
    fn nested_ids() {
        assert_eq!(fk_column("publisher_id", "publisher").nested_id().as_deref(), Some("publ"));
        assert_eq!(fk_column("book_id", "book").nested_id().as_deref(), Some("book"));
        assert_eq!(
            fk_column("book_author_id", "book_author").nested_id().as_deref(),
            Some("boau")
        );
        assert_eq!(Column::new("title", SemanticType::String).nested_id(), None);
    }

    #[test]
    fn table_json_shape() {
        let mut table = Table::new("TESTDB", "PUBLIC", "BOOK");
        table.add_column(Column {
            column_size: 64,
            nullable: true,
            ..Column::new("TITLE", SemanticType::String)
        });

        let json: serde_json::Value = serde_json::from_str(&table.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "catalog": "TESTDB",
                "schema": "PUBLIC",
                "tableName": "BOOK",
                "tableType": "TABLE",
                "columns": [{
                    "columnName": "TITLE",
                    "columnType": "String",
                    "columnSize": 64,
                    "nullable": true,
                    "primaryKey": false,
                    "indexed": false
                }]
            })
        );
    }

    #[test]
    fn partial_json_fills_defaults() {
        let table = Table::from_json(
            r#"{"tableName":"BOOK","columns":[{"columnName":"ID","columnType":"Long"}]}"#,
        )
        .unwrap();
        assert_eq!(table.table_name, "BOOK");
        assert_eq!(table.columns[0].column_type, SemanticType::Long);
        assert!(!table.columns[0].nullable);
        assert!(table.column("ID").is_some());
    }
}
