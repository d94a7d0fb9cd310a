use super::PgConnection;
use super::decode::RowExt;
use crate::driver::labels::*;
use crate::driver::{MetadataSource, ResultSet, SqlType};
use crate::error::DbResult;
use crate::value::SqlValue;
use async_trait::async_trait;
use tokio_postgres::Row;

fn filter(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| (*n).to_string()).collect()
}

fn reshape<F>(rows: &[Row], columns: &[&str], map: F) -> DbResult<ResultSet>
where
    F: Fn(&Row) -> DbResult<Vec<SqlValue>>,
{
    let rows = rows.iter().map(map).collect::<DbResult<Vec<_>>>()?;
    Ok(ResultSet::new(labels(columns), rows))
}

/// Driver type code for a `pg_type.typname`.
pub(crate) fn sql_type_for(type_name: &str) -> SqlType {
    if type_name.starts_with('_') {
        return SqlType::ARRAY;
    }
    match type_name {
        "int8" => SqlType::BIGINT,
        "int4" | "oid" => SqlType::INTEGER,
        "int2" => SqlType::SMALLINT,
        "numeric" => SqlType::NUMERIC,
        "float4" => SqlType::REAL,
        "float8" => SqlType::DOUBLE,
        "bpchar" | "char" => SqlType::CHAR,
        "varchar" | "text" | "name" | "citext" => SqlType::VARCHAR,
        "bool" | "bit" => SqlType::BIT,
        "bytea" => SqlType::BINARY,
        "date" => SqlType::DATE,
        "time" => SqlType::TIME,
        "timetz" => SqlType::TIME_WITH_TIMEZONE,
        "timestamp" => SqlType::TIMESTAMP,
        "timestamptz" => SqlType::TIMESTAMP_WITH_TIMEZONE,
        _ => SqlType::OTHER,
    }
}

/// Declared size for a column of `type_name` with modifier `typmod`.
pub(crate) fn column_size(type_name: &str, typmod: i32) -> Option<i64> {
    match type_name {
        "int2" => Some(5),
        "int4" | "oid" => Some(10),
        "int8" => Some(19),
        "float4" => Some(8),
        "float8" => Some(17),
        "bool" => Some(1),
        "date" => Some(13),
        "time" => Some(15),
        "timestamp" | "timestamptz" => Some(29),
        "uuid" => Some(36),
        "varchar" | "bpchar" if typmod > 4 => Some(i64::from(typmod - 4)),
        "numeric" if typmod > 4 => Some(i64::from(((typmod - 4) >> 16) & 0xffff)),
        "numeric" => Some(1000),
        "varchar" | "bpchar" | "text" | "bytea" | "json" | "jsonb" => Some(i64::from(i32::MAX)),
        _ => None,
    }
}

#[async_trait]
impl MetadataSource for PgConnection {
    async fn catalogs(&self) -> DbResult<ResultSet> {
        let rows = self
            .client
            .query(
                "SELECT datname::text AS datname FROM pg_catalog.pg_database \
                 WHERE NOT datistemplate ORDER BY datname",
                &[],
            )
            .await?;
        reshape(&rows, &[TABLE_CAT], |row| {
            Ok(vec![SqlValue::Text(row.try_get_column("datname")?)])
        })
    }

    async fn schemas(&self) -> DbResult<ResultSet> {
        let rows = self
            .client
            .query(
                "SELECT nspname::text AS nspname, current_database()::text AS catalog \
                 FROM pg_catalog.pg_namespace ORDER BY nspname",
                &[],
            )
            .await?;
        reshape(&rows, &[TABLE_SCHEM, "TABLE_CATALOG"], |row| {
            Ok(vec![
                SqlValue::Text(row.try_get_column("nspname")?),
                SqlValue::Text(row.try_get_column("catalog")?),
            ])
        })
    }

    async fn tables(&self, catalog: Option<&str>, schema: Option<&str>) -> DbResult<ResultSet> {
        let (catalog, schema) = (filter(catalog), filter(schema));
        let rows = self
            .client
            .query(
                r#"
SELECT
  current_database()::text AS table_cat,
  n.nspname::text AS table_schem,
  c.relname::text AS table_name,
  CASE
    WHEN n.nspname IN ('pg_catalog', 'information_schema') OR n.nspname LIKE 'pg_toast%'
      THEN 'SYSTEM TABLE'
    WHEN c.relkind IN ('r', 'p') THEN 'TABLE'
    WHEN c.relkind = 'v' THEN 'VIEW'
    WHEN c.relkind = 'm' THEN 'MATERIALIZED VIEW'
    WHEN c.relkind = 'f' THEN 'FOREIGN TABLE'
    ELSE 'OTHER'
  END AS table_type
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE c.relkind IN ('r', 'p', 'v', 'm', 'f')
  AND ($1::text IS NULL OR current_database() = $1)
  AND ($2::text IS NULL OR n.nspname = $2)
ORDER BY table_type, table_schem, table_name
"#,
                &[&catalog, &schema],
            )
            .await?;
        reshape(&rows, &[TABLE_CAT, TABLE_SCHEM, TABLE_NAME, TABLE_TYPE], |row| {
            Ok(vec![
                SqlValue::Text(row.try_get_column("table_cat")?),
                SqlValue::Text(row.try_get_column("table_schem")?),
                SqlValue::Text(row.try_get_column("table_name")?),
                SqlValue::Text(row.try_get_column("table_type")?),
            ])
        })
    }

    async fn columns(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> DbResult<ResultSet> {
        let (catalog, schema) = (filter(catalog), filter(schema));
        let rows = self
            .client
            .query(
                r#"
SELECT
  current_database()::text AS table_cat,
  n.nspname::text AS table_schem,
  c.relname::text AS table_name,
  a.attname::text AS column_name,
  t.typname::text AS type_name,
  a.atttypmod AS typmod,
  a.attnotnull AS not_null,
  a.attnum AS ordinal
FROM pg_catalog.pg_attribute a
JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
JOIN pg_catalog.pg_type t ON t.oid = a.atttypid
WHERE c.relname = $3
  AND ($1::text IS NULL OR current_database() = $1)
  AND ($2::text IS NULL OR n.nspname = $2)
  AND a.attnum > 0
  AND NOT a.attisdropped
ORDER BY n.nspname, a.attnum
"#,
                &[&catalog, &schema, &table],
            )
            .await?;
        reshape(
            &rows,
            &[
                TABLE_CAT,
                TABLE_SCHEM,
                TABLE_NAME,
                COLUMN_NAME,
                DATA_TYPE,
                TYPE_NAME,
                COLUMN_SIZE,
                IS_NULLABLE,
                ORDINAL_POSITION,
            ],
            |row| {
                let type_name: String = row.try_get_column("type_name")?;
                let typmod: i32 = row.try_get_column("typmod")?;
                let not_null: bool = row.try_get_column("not_null")?;
                let ordinal: i16 = row.try_get_column("ordinal")?;
                let data_type = sql_type_for(&type_name).code();
                let size = column_size(&type_name, typmod);
                Ok(vec![
                    SqlValue::Text(row.try_get_column("table_cat")?),
                    SqlValue::Text(row.try_get_column("table_schem")?),
                    SqlValue::Text(row.try_get_column("table_name")?),
                    SqlValue::Text(row.try_get_column("column_name")?),
                    SqlValue::Int(data_type.into()),
                    SqlValue::Text(type_name),
                    SqlValue::from(size),
                    SqlValue::from(if not_null { "NO" } else { "YES" }),
                    SqlValue::Int(ordinal.into()),
                ])
            },
        )
    }

    async fn primary_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> DbResult<ResultSet> {
        let (catalog, schema) = (filter(catalog), filter(schema));
        let rows = self
            .client
            .query(
                r#"
SELECT a.attname::text AS column_name, k.ord AS key_seq
FROM pg_catalog.pg_index i
JOIN pg_catalog.pg_class c ON c.oid = i.indrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
CROSS JOIN LATERAL unnest(i.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
JOIN pg_catalog.pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
WHERE i.indisprimary
  AND c.relname = $3
  AND ($1::text IS NULL OR current_database() = $1)
  AND ($2::text IS NULL OR n.nspname = $2)
ORDER BY k.ord
"#,
                &[&catalog, &schema, &table],
            )
            .await?;
        reshape(&rows, &[COLUMN_NAME, KEY_SEQ], |row| {
            Ok(vec![
                SqlValue::Text(row.try_get_column("column_name")?),
                SqlValue::Int(row.try_get_column("key_seq")?),
            ])
        })
    }

    async fn index_info(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> DbResult<ResultSet> {
        let (catalog, schema) = (filter(catalog), filter(schema));
        let rows = self
            .client
            .query(
                r#"
SELECT
  ic.relname::text AS index_name,
  NOT i.indisunique AS non_unique,
  a.attname::text AS column_name,
  k.ord AS ordinal
FROM pg_catalog.pg_index i
JOIN pg_catalog.pg_class c ON c.oid = i.indrelid
JOIN pg_catalog.pg_class ic ON ic.oid = i.indexrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
CROSS JOIN LATERAL unnest(i.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
JOIN pg_catalog.pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
WHERE c.relname = $3
  AND ($1::text IS NULL OR current_database() = $1)
  AND ($2::text IS NULL OR n.nspname = $2)
ORDER BY non_unique, index_name, k.ord
"#,
                &[&catalog, &schema, &table],
            )
            .await?;
        reshape(
            &rows,
            &[INDEX_NAME, NON_UNIQUE, COLUMN_NAME, ORDINAL_POSITION],
            |row| {
                Ok(vec![
                    SqlValue::Text(row.try_get_column("index_name")?),
                    SqlValue::Bool(row.try_get_column("non_unique")?),
                    SqlValue::Text(row.try_get_column("column_name")?),
                    SqlValue::Int(row.try_get_column("ordinal")?),
                ])
            },
        )
    }
}
