use super::*;
use crate::type_map::SemanticType;
use async_trait::async_trait;
use fluentdb::{DbResult, SqlType, SqlValue};

struct ColumnRow {
    name: &'static str,
    sql_type: SqlType,
    type_name: &'static str,
    size: i64,
    nullable: bool,
}

fn col(
    name: &'static str,
    sql_type: SqlType,
    type_name: &'static str,
    size: i64,
    nullable: bool,
) -> ColumnRow {
    ColumnRow {
        name,
        sql_type,
        type_name,
        size,
        nullable,
    }
}

/// An in-memory catalog shaped like the one a driver reports.
struct FakeCatalog {
    tables: Vec<(&'static str, &'static str)>,
    columns: Vec<(&'static str, ColumnRow)>,
    primary_keys: Vec<(&'static str, &'static str)>,
    indexes: Vec<(&'static str, Option<&'static str>)>,
}

fn text(v: &str) -> SqlValue {
    SqlValue::Text(v.to_string())
}

fn result(columns: &[&str], rows: Vec<Vec<SqlValue>>) -> ResultSet {
    ResultSet::new(columns.iter().map(|c| c.to_string()).collect(), rows)
}

#[async_trait]
impl MetadataSource for FakeCatalog {
    async fn catalogs(&self) -> DbResult<ResultSet> {
        Ok(result(&[labels::TABLE_CAT], vec![vec![text("TESTDB")]]))
    }

    async fn schemas(&self) -> DbResult<ResultSet> {
        Ok(result(
            &[labels::TABLE_SCHEM, "TABLE_CATALOG"],
            vec![
                vec![text("INFORMATION_SCHEMA"), text("TESTDB")],
                vec![text("PUBLIC"), text("TESTDB")],
            ],
        ))
    }

    async fn tables(&self, _: Option<&str>, _: Option<&str>) -> DbResult<ResultSet> {
        let rows = self
            .tables
            .iter()
            .map(|(name, kind)| vec![text("TESTDB"), text("PUBLIC"), text(name), text(kind)])
            .collect();
        Ok(result(
            &[
                labels::TABLE_CAT,
                labels::TABLE_SCHEM,
                labels::TABLE_NAME,
                labels::TABLE_TYPE,
            ],
            rows,
        ))
    }

    async fn columns(&self, _: Option<&str>, _: Option<&str>, table: &str) -> DbResult<ResultSet> {
        let rows = self
            .columns
            .iter()
            .filter(|(t, _)| *t == table)
            .map(|(_, c)| {
                vec![
                    text(c.name),
                    SqlValue::Int(i64::from(c.sql_type.code())),
                    text(c.type_name),
                    SqlValue::Int(c.size),
                    text(if c.nullable { "YES" } else { "NO" }),
                ]
            })
            .collect();
        Ok(result(
            &[
                labels::COLUMN_NAME,
                labels::DATA_TYPE,
                labels::TYPE_NAME,
                labels::COLUMN_SIZE,
                labels::IS_NULLABLE,
            ],
            rows,
        ))
    }

    async fn primary_keys(
        &self,
        _: Option<&str>,
        _: Option<&str>,
        table: &str,
    ) -> DbResult<ResultSet> {
        let rows = self
            .primary_keys
            .iter()
            .filter(|(t, _)| *t == table)
            .map(|(_, c)| vec![text(c)])
            .collect();
        Ok(result(&[labels::COLUMN_NAME], rows))
    }

    async fn index_info(
        &self,
        _: Option<&str>,
        _: Option<&str>,
        table: &str,
    ) -> DbResult<ResultSet> {
        let rows = self
            .indexes
            .iter()
            .filter(|(t, _)| *t == table)
            .map(|(_, c)| vec![c.map_or(SqlValue::Null, text)])
            .collect();
        Ok(result(&[labels::COLUMN_NAME], rows))
    }
}

/// Uppercase names, the way H2 reports them.
fn uppercase_catalog() -> FakeCatalog {
    FakeCatalog {
        tables: vec![
            ("BOOK", "TABLE"),
            ("PUBLISHER", "TABLE"),
            ("BOOK_VIEW", "VIEW"),
            ("AUDIT", "table"),
        ],
        columns: vec![
            ("BOOK", col("ID", SqlType::BIGINT, "BIGINT", 19, false)),
            ("BOOK", col("TITLE", SqlType::VARCHAR, "VARCHAR", 120, false)),
            ("BOOK", col("PRICE", SqlType::DECIMAL, "DECIMAL", 10, true)),
            ("BOOK", col("PUBLISHED", SqlType::DATE, "DATE", 10, true)),
            ("BOOK", col("PUBLISHER_ID", SqlType::BIGINT, "BIGINT", 19, true)),
        ],
        primary_keys: vec![("BOOK", "ID")],
        indexes: vec![("BOOK", Some("ID")), ("BOOK", Some("TITLE")), ("BOOK", None)],
    }
}

/// Lowercase names, the way PostgreSQL reports them.
fn lowercase_catalog() -> FakeCatalog {
    FakeCatalog {
        tables: vec![("book", "TABLE"), ("publisher", "TABLE"), ("author", "VIEW")],
        columns: vec![
            ("book", col("id", SqlType::INTEGER, "int4", 10, false)),
            ("book", col("publisher_id", SqlType::INTEGER, "int4", 10, true)),
            ("book", col("author_id", SqlType::INTEGER, "int4", 10, true)),
            ("book", col("tags", SqlType::ARRAY, "_text", 0, true)),
            ("book", col("active", SqlType::OTHER, "bit", 1, true)),
        ],
        primary_keys: vec![("book", "id")],
        indexes: vec![("book", Some("id")), ("book", Some("publisher_id"))],
    }
}

#[tokio::test]
async fn lists_catalogs_and_schemas() {
    let catalog = uppercase_catalog();
    let meta = MetadataIntrospector::new(&catalog);
    assert_eq!(meta.list_catalogs().await.unwrap(), vec!["TESTDB"]);
    assert_eq!(
        meta.list_schemas().await.unwrap(),
        vec!["INFORMATION_SCHEMA", "PUBLIC"]
    );
}

#[tokio::test]
async fn lists_only_base_tables() {
    let catalog = uppercase_catalog();
    let meta = MetadataIntrospector::new(&catalog);
    let tables = meta.list_tables(Some("TESTDB"), Some("PUBLIC")).await.unwrap();
    assert_eq!(tables, vec!["BOOK", "PUBLISHER", "AUDIT"]);
}

#[tokio::test]
async fn key_and_index_lists() {
    let catalog = uppercase_catalog();
    let meta = MetadataIntrospector::new(&catalog);
    assert_eq!(meta.primary_keys(None, None, "BOOK").await.unwrap(), vec!["ID"]);
    assert_eq!(
        meta.indexed_columns(None, None, "BOOK").await.unwrap(),
        vec!["ID", "TITLE"]
    );
}

#[tokio::test]
async fn describes_uppercase_table() {
    let catalog = uppercase_catalog();
    let mut meta = MetadataIntrospector::new(&catalog);
    let table = meta
        .describe_table(Some("TESTDB"), Some("PUBLIC"), "BOOK")
        .await
        .unwrap();

    assert_eq!(table.catalog, "TESTDB");
    assert_eq!(table.schema, "PUBLIC");
    assert_eq!(table.table_name, "BOOK");
    assert_eq!(table.table_type, "TABLE");
    let names: Vec<&str> = table.columns.iter().map(|c| c.column_name.as_str()).collect();
    assert_eq!(names, vec!["ID", "TITLE", "PRICE", "PUBLISHED", "PUBLISHER_ID"]);

    let id = table.column("ID").unwrap();
    assert_eq!(id.column_type, SemanticType::Long);
    assert!(id.primary_key);
    // only a lowercase `id` is excluded from the index flags
    assert!(id.indexed);
    assert!(!id.nullable);
    assert_eq!(id.column_size, 19);

    let title = table.column("TITLE").unwrap();
    assert_eq!(title.column_type, SemanticType::String);
    assert!(title.indexed);
    assert!(!title.primary_key);

    assert_eq!(table.column("PRICE").unwrap().column_type, SemanticType::BigDecimal);
    assert_eq!(table.column("PUBLISHED").unwrap().column_type, SemanticType::Date);
    // the convention is a lowercase `_id` suffix
    assert_eq!(table.column("PUBLISHER_ID").unwrap().fk_table_name, None);
}

#[tokio::test]
async fn infers_foreign_keys_from_real_tables() {
    let catalog = lowercase_catalog();
    let mut meta = MetadataIntrospector::new(&catalog);
    let table = meta.describe_table(None, None, "book").await.unwrap();

    let id = table.column("id").unwrap();
    assert!(id.primary_key);
    assert!(!id.indexed);
    assert_eq!(id.column_type, SemanticType::Integer);

    let publisher = table.column("publisher_id").unwrap();
    assert!(publisher.indexed);
    assert_eq!(publisher.fk_table_name.as_deref(), Some("publisher"));
    assert_eq!(publisher.nested_id().as_deref(), Some("publ"));

    // `author` is a view, not a table
    assert_eq!(table.column("author_id").unwrap().fk_table_name, None);
    assert_eq!(table.column("tags").unwrap().column_type, SemanticType::List);
    assert_eq!(table.column("active").unwrap().column_type, SemanticType::Boolean);
    assert_eq!(table.schema, "");
}

#[tokio::test]
async fn unknown_table_has_no_columns() {
    let catalog = lowercase_catalog();
    let mut meta = MetadataIntrospector::new(&catalog);
    let table = meta.describe_table(None, None, "missing").await.unwrap();
    assert_eq!(table.table_name, "missing");
    assert!(table.columns.is_empty());
}
