//! Catalog reflection over a connection's [`MetadataSource`].

use crate::error::{MetaError, MetaResult};
use crate::table::{Column, Table};
use crate::type_map::semantic_type;
use fluentdb::ResultSet;
use fluentdb::driver::{MetadataSource, labels};
use std::collections::HashSet;

/// Reads catalogs, tables and column descriptions from one connection.
///
/// The set of table names used for foreign-key inference is read once, on
/// the first [`describe_table`](Self::describe_table), and reused for the
/// introspector's lifetime.
pub struct MetadataIntrospector<'a> {
    source: &'a dyn MetadataSource,
    table_names: Option<HashSet<String>>,
}

impl<'a> MetadataIntrospector<'a> {
    pub fn new(source: &'a dyn MetadataSource) -> Self {
        Self {
            source,
            table_names: None,
        }
    }

    pub async fn list_catalogs(&self) -> MetaResult<Vec<String>> {
        let rs = self.source.catalogs().await?;
        column_values(rs, labels::TABLE_CAT)
    }

    pub async fn list_schemas(&self) -> MetaResult<Vec<String>> {
        let rs = self.source.schemas().await?;
        column_values(rs, labels::TABLE_SCHEM)
    }

    /// Names of the base tables (type `TABLE`, any case) in `catalog`/`schema`.
    pub async fn list_tables(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
    ) -> MetaResult<Vec<String>> {
        let mut rs = self.source.tables(catalog, schema).await?;
        let mut tables = Vec::new();
        while rs.next() {
            let table_type = rs.get_string(labels::TABLE_TYPE)?.unwrap_or_default();
            if table_type.eq_ignore_ascii_case("TABLE") {
                tables.push(required(&rs, labels::TABLE_NAME)?);
            }
        }
        Ok(tables)
    }

    pub async fn primary_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> MetaResult<Vec<String>> {
        let rs = self.source.primary_keys(catalog, schema, table).await?;
        column_values(rs, labels::COLUMN_NAME)
    }

    /// Every column that takes part in an index, one entry per index member.
    pub async fn indexed_columns(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> MetaResult<Vec<String>> {
        let rs = self.source.index_info(catalog, schema, table).await?;
        column_values(rs, labels::COLUMN_NAME)
    }

    /// Describe `table`: columns in ordinal order with semantic types, size,
    /// nullability, key and index flags and inferred foreign keys.
    ///
    /// A column literally named `id` is never flagged as indexed; it is
    /// covered by the primary-key flag.
    pub async fn describe_table(
        &mut self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> MetaResult<Table> {
        if self.table_names.is_none() {
            let names = self.list_tables(catalog, schema).await?;
            tracing::debug!(target: "fluentdb.meta", table_count = names.len(), "cached table names");
            self.table_names = Some(names.into_iter().collect());
        }

        let primary_keys: HashSet<String> = self
            .primary_keys(catalog, schema, table)
            .await?
            .into_iter()
            .collect();
        let indexed: HashSet<String> = self
            .indexed_columns(catalog, schema, table)
            .await?
            .into_iter()
            .filter(|name| name != "id")
            .collect();

        let mut described = Table::new(
            catalog.unwrap_or_default(),
            schema.unwrap_or_default(),
            table,
        );
        let mut rs = self.source.columns(catalog, schema, table).await?;
        while rs.next() {
            let name = required(&rs, labels::COLUMN_NAME)?;
            let code = rs.get_i64(labels::DATA_TYPE)?.unwrap_or_default();
            let type_name = rs.get_string(labels::TYPE_NAME)?.unwrap_or_default();
            let code = i32::try_from(code).map_err(|_| {
                MetaError::decode(labels::DATA_TYPE, format!("type code out of range: {code}"))
            })?;

            let mut column = Column::new(name, semantic_type(code, &type_name));
            column.column_size = rs.get_i64(labels::COLUMN_SIZE)?.unwrap_or_default();
            column.nullable = rs
                .get_string(labels::IS_NULLABLE)?
                .is_some_and(|v| v.eq_ignore_ascii_case("yes"));
            column.primary_key = primary_keys.contains(&column.column_name);
            column.indexed = indexed.contains(&column.column_name);
            column.fk_table_name = self.referenced_table(&column.column_name);
            described.add_column(column);
        }

        tracing::debug!(
            target: "fluentdb.meta",
            table = %table,
            columns = described.columns.len(),
            primary_keys = primary_keys.len(),
            "described table"
        );
        Ok(described)
    }

    /// `<name>_id` references `<name>` when such a table exists.
    fn referenced_table(&self, column: &str) -> Option<String> {
        let base = column.strip_suffix("_id").filter(|b| !b.is_empty())?;
        self.table_names
            .as_ref()
            .filter(|names| names.contains(base))
            .map(|_| base.to_string())
    }
}

fn required(rs: &ResultSet, label: &str) -> MetaResult<String> {
    rs.get_string(label)?
        .ok_or_else(|| MetaError::decode(label, "unexpected NULL"))
}

/// Non-NULL values of one column, in cursor order.
fn column_values(mut rs: ResultSet, label: &str) -> MetaResult<Vec<String>> {
    let mut values = Vec::new();
    while rs.next() {
        if let Some(value) = rs.get_string(label)? {
            values.push(value);
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests;
